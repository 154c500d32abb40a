//! Content-hash derivation for torrent candidates.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
use reqwest::Client;

use super::DownloadError;

/// Extract the info hash from a magnet URI's `xt=urn:btih:` parameter.
pub fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    let (_, query) = magnet.split_once('?')?;

    for param in query.split('&') {
        if let Some(value) = param.strip_prefix("xt=urn:btih:") {
            return Some(value.to_lowercase());
        }
    }
    None
}

/// Compute the info hash of a .torrent file's bytes.
pub fn hash_from_torrent_bytes(bytes: &[u8]) -> Result<String, DownloadError> {
    let torrent: TorrentMetaV1Owned = torrent_from_bytes(bytes)
        .map_err(|e| DownloadError::Rejected(format!("Invalid torrent file: {e}")))?;
    Ok(torrent.info_hash.as_string())
}

/// Resolve the stable content hash for a torrent download URL.
///
/// Magnets are parsed in place; .torrent URLs are fetched and their
/// metainfo hashed. The hash identifies the content across resubmissions
/// and backend restarts.
pub async fn content_hash(client: &Client, download_url: &str) -> Result<String, DownloadError> {
    if download_url.starts_with("magnet:") {
        return extract_hash_from_magnet(download_url).ok_or_else(|| {
            DownloadError::Rejected(format!("Magnet without btih hash: {download_url}"))
        });
    }

    let response = client
        .get(download_url)
        .send()
        .await
        .map_err(DownloadError::from_reqwest)?;

    if !response.status().is_success() {
        return Err(DownloadError::Api(format!(
            "HTTP {} fetching torrent file",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(DownloadError::from_reqwest)?;

    hash_from_torrent_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_hash_from_magnet() {
        let magnet = "magnet:?xt=urn:btih:ABC123def456&dn=Test&tr=udp://t";
        assert_eq!(
            extract_hash_from_magnet(magnet),
            Some("abc123def456".to_string())
        );
    }

    #[test]
    fn test_extract_hash_missing() {
        assert_eq!(extract_hash_from_magnet("magnet:?dn=Test"), None);
        assert_eq!(extract_hash_from_magnet("not a magnet"), None);
    }

    #[test]
    fn test_hash_from_invalid_torrent_bytes() {
        let result = hash_from_torrent_bytes(b"definitely not bencode");
        assert!(matches!(result, Err(DownloadError::Rejected(_))));
    }
}
