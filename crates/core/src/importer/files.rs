//! Download payload inspection: listing, archive extraction, and file
//! classification.

use std::fs;
use std::path::{Path, PathBuf};

use regex_lite::Regex;
use tracing::{debug, warn};

const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "webm"];
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "sub", "ass", "ssa", "vtt"];
const AUDIO_EXTENSIONS: &[&str] = &["flac", "mp3", "ogg", "m4a", "opus", "wav", "aac", "wma", "alac"];
const BOOK_EXTENSIONS: &[&str] = &["epub", "mobi", "pdf", "azw3", "fb2", "cbz", "cbr", "m4b"];
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz"];

/// Coarse classification of a payload file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Subtitle,
    Audio,
    Book,
    Other,
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Classify a file by extension. The extension tables are disjoint.
pub fn classify(path: &Path) -> FileKind {
    let ext = match extension_of(path) {
        Some(ext) => ext,
        None => return FileKind::Other,
    };
    let ext = ext.as_str();

    if VIDEO_EXTENSIONS.contains(&ext) {
        FileKind::Video
    } else if SUBTITLE_EXTENSIONS.contains(&ext) {
        FileKind::Subtitle
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        FileKind::Audio
    } else if BOOK_EXTENSIONS.contains(&ext) {
        FileKind::Book
    } else {
        FileKind::Other
    }
}

/// Whether a path looks like a video file.
pub fn is_video_path(path: &Path) -> bool {
    classify(path) == FileKind::Video
}

/// Recursively list regular files under a directory.
///
/// Directories are descended into; symlinks are excluded outright, both as
/// files and as directories.
pub fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            debug!(path = %path.display(), "Skipping symlink");
            continue;
        }
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Extract known archives found under the directory, in place.
///
/// Only zip archives are extracted; other archive extensions are logged and
/// skipped. An extraction failure is logged and never fails the import, so
/// a corrupt archive costs at most its own content.
pub fn extract_archives(dir: &Path) {
    let files = match list_files(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot list files for extraction");
            return;
        }
    };

    for path in files {
        let ext = match extension_of(&path) {
            Some(ext) => ext,
            None => continue,
        };
        if !ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        if ext == "zip" {
            if let Err(e) = extract_zip(&path, dir) {
                warn!(archive = %path.display(), error = %e, "Archive extraction failed");
            }
        } else {
            warn!(archive = %path.display(), "Unsupported archive format, skipping");
        }
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> std::io::Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    debug!(archive = %archive_path.display(), entries = archive.len(), "Extracting zip");
    archive
        .extract(dest)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(())
}

/// Pattern matching a season/episode marker in a file name, with optional
/// zero padding (`S1E2`, `S01E02`).
pub fn episode_pattern(season: u32, episode: u32) -> Regex {
    let pattern = format!(r"(?i).*[. ]s0?{season}e0?{episode}[. ].*");
    Regex::new(&pattern).expect("episode pattern is valid")
}

/// Pattern matching a subtitle for the given episode, capturing the
/// two-letter language code (`Show.S01E02.en.srt`).
pub fn subtitle_pattern(season: u32, episode: u32) -> Regex {
    let pattern = format!(r"(?i).*[. ]s0?{season}e0?{episode}.*[. ]([a-z]{{2}})[. ]?srt$");
    Regex::new(&pattern).expect("subtitle pattern is valid")
}

/// Find the video file for an episode among the payload files.
pub fn find_episode_video<'a>(files: &'a [PathBuf], season: u32, episode: u32) -> Option<&'a PathBuf> {
    let pattern = episode_pattern(season, episode);
    files.iter().find(|path| {
        is_video_path(path)
            && path
                .file_name()
                .map(|n| pattern.is_match(&format!(" {} ", n.to_string_lossy())))
                .unwrap_or(false)
    })
}

/// Find subtitle files for an episode, with their language codes.
pub fn find_episode_subtitles(files: &[PathBuf], season: u32, episode: u32) -> Vec<(PathBuf, String)> {
    let pattern = subtitle_pattern(season, episode);
    files
        .iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy();
            let padded = format!(" {name}");
            let caps = pattern.captures(&padded)?;
            Some((path.clone(), caps.get(1)?.as_str().to_lowercase()))
        })
        .collect()
}
