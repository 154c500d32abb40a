//! File placement into the library: hardlink with copy fallback.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::ImportError;

const BUFFER_SIZE: usize = 64 * 1024;

/// Place a payload file at its library destination.
///
/// Hardlinking is attempted first so the seeding copy and the library copy
/// share storage; when the link fails (cross-filesystem, unsupported fs)
/// the file is copied instead, silently from the caller's point of view.
/// An existing destination is replaced. With `verify` set, a copied file's
/// checksum is compared against the source.
pub async fn place_file(source: &Path, dest: &Path, verify: bool) -> Result<(), ImportError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    if fs::try_exists(dest).await? {
        fs::remove_file(dest).await?;
    }

    match fs::hard_link(source, dest).await {
        Ok(()) => {
            debug!(source = %source.display(), dest = %dest.display(), "Hardlinked");
            return Ok(());
        }
        Err(e) => {
            debug!(
                source = %source.display(),
                dest = %dest.display(),
                error = %e,
                "Hardlink failed, copying instead"
            );
        }
    }

    fs::copy(source, dest).await?;

    if verify {
        let source_sum = sha256_of(source).await?;
        let dest_sum = sha256_of(dest).await?;
        if source_sum != dest_sum {
            fs::remove_file(dest).await?;
            return Err(ImportError::NoFilesMatched(format!(
                "Checksum mismatch copying {}",
                source.display()
            )));
        }
    }

    Ok(())
}

async fn sha256_of(path: &Path) -> Result<String, std::io::Error> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_place_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.mkv");
        fs::write(&source, b"content").await.unwrap();

        let dest = dir.path().join("Season 01/ep.mkv");
        place_file(&source, &dest, false).await.unwrap();

        assert_eq!(fs::read(&dest).await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_place_hardlinks_on_same_fs() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.mkv");
        fs::write(&source, b"content").await.unwrap();

        let dest = dir.path().join("dest.mkv");
        place_file(&source, &dest, false).await.unwrap();

        // Same inode means the link succeeded.
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let source_ino = std::fs::metadata(&source).unwrap().ino();
            let dest_ino = std::fs::metadata(&dest).unwrap().ino();
            assert_eq!(source_ino, dest_ino);
        }
    }

    #[tokio::test]
    async fn test_place_replaces_existing_dest() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.mkv");
        fs::write(&source, b"new").await.unwrap();

        let dest = dir.path().join("dest.mkv");
        fs::write(&dest, b"old").await.unwrap();

        place_file(&source, &dest, false).await.unwrap();
        assert_eq!(fs::read(&dest).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_verify_passes_for_identical_copy() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.mkv");
        fs::write(&source, b"content").await.unwrap();

        let dest = dir.path().join("dest.mkv");
        place_file(&source, &dest, true).await.unwrap();
        assert!(dest.exists());
    }
}
