//! Import reconciler: moves finished downloads into library layouts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::jobs::JobStore;
use crate::download::{Download, DownloadStatus};
use crate::metrics;
use crate::notify::{ImportEvent, NotifyHandle};

use super::files::{
    classify, extract_archives, find_episode_subtitles, find_episode_video, is_video_path,
    list_files, FileKind,
};
use super::place::place_file;
use super::types::{ImportError, ImportTarget, ImportTargetResolver};

/// Periodically sweeps finished, unimported jobs and places their files
/// into the library.
///
/// Each tick is idempotent: a job only flips to imported once every file
/// the resolved target expects has been placed, so a partially seeded
/// download is retried on the next tick without duplicating work.
pub struct ImportReconciler {
    store: Arc<dyn JobStore>,
    resolver: Arc<dyn ImportTargetResolver>,
    notify: NotifyHandle,
    /// Where backends deposit finished payloads.
    download_dir: PathBuf,
    /// Compare checksums after falling back to copy.
    verify_copies: bool,
}

impl ImportReconciler {
    pub fn new(
        store: Arc<dyn JobStore>,
        resolver: Arc<dyn ImportTargetResolver>,
        notify: NotifyHandle,
        download_dir: PathBuf,
        verify_copies: bool,
    ) -> Self {
        Self {
            store,
            resolver,
            notify,
            download_dir,
            verify_copies,
        }
    }

    /// Run one reconciliation pass over all finished, unimported jobs.
    ///
    /// Per-job failures are contained: a job that cannot be imported yet is
    /// logged and left for the next tick, never blocking its siblings.
    pub async fn tick(&self) {
        let pending = match self
            .store
            .list_by_status(DownloadStatus::Finished, false)
        {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Failed to list finished jobs: {}", e);
                return;
            }
        };

        for download in pending {
            match self.import_one(&download).await {
                Ok(media_ref) => {
                    if let Err(e) = self.store.set_imported(&download.id, true) {
                        warn!("Failed to mark '{}' imported: {}", download.title, e);
                        continue;
                    }
                    metrics::IMPORTS.with_label_values(&["complete"]).inc();
                    info!("Imported '{}' into {}", download.title, media_ref);
                    self.notify
                        .emit(ImportEvent {
                            title: download.title.clone(),
                            media_ref,
                            success: true,
                            detail: None,
                        })
                        .await;
                }
                Err(ImportError::Partial { missing }) => {
                    metrics::IMPORTS.with_label_values(&["partial"]).inc();
                    warn!(
                        "Partial import of '{}', missing episodes {:?}",
                        download.title, missing
                    );
                    self.notify
                        .emit(ImportEvent {
                            title: download.title.clone(),
                            media_ref: String::new(),
                            success: false,
                            detail: Some(format!("missing episodes {missing:?}")),
                        })
                        .await;
                }
                Err(ImportError::Pending(reason)) => {
                    debug!("'{}' not ready to import: {}", download.title, reason);
                }
                Err(e) => {
                    metrics::IMPORTS.with_label_values(&["failed"]).inc();
                    warn!("Import of '{}' failed: {}", download.title, e);
                    self.notify
                        .emit(ImportEvent {
                            title: download.title.clone(),
                            media_ref: String::new(),
                            success: false,
                            detail: Some(e.to_string()),
                        })
                        .await;
                }
            }
        }
    }

    /// Import one finished job. Returns a library-relative description of
    /// where the files landed.
    async fn import_one(&self, download: &Download) -> Result<String, ImportError> {
        let target = match self.resolver.resolve(download).await? {
            Some(target) => target,
            None => {
                debug!(
                    "'{}' does not belong to any library item, skipping",
                    download.title
                );
                return Err(ImportError::Pending("no library item matched".to_string()));
            }
        };

        let source_dir = self.locate_source_dir(download)?;
        extract_archives(&source_dir);
        let files = list_files(&source_dir)?;
        if files.is_empty() {
            return Err(ImportError::NoFilesMatched(format!(
                "{} is empty",
                source_dir.display()
            )));
        }

        match target {
            ImportTarget::Season {
                root,
                season,
                episodes,
            } => self.import_season(&files, &root, season, &episodes).await,
            ImportTarget::Movie { root, file_stem } => {
                self.import_movie(&files, &root, &file_stem).await
            }
            ImportTarget::Audio { root } => {
                self.import_by_kind(&files, &root, FileKind::Audio).await
            }
            ImportTarget::Book { root } => self.import_by_kind(&files, &root, FileKind::Book).await,
        }
    }

    /// Find where the backend deposited this job's payload.
    ///
    /// Torrent backends name the payload directory after the content, so the
    /// info hash is tried first and the release title second. A payload that
    /// is a single file at the top level is handled by the caller listing it.
    fn locate_source_dir(&self, download: &Download) -> Result<PathBuf, ImportError> {
        let by_hash = self.download_dir.join(&download.hash);
        if by_hash.is_dir() {
            return Ok(by_hash);
        }
        let by_title = self.download_dir.join(&download.title);
        if by_title.is_dir() {
            return Ok(by_title);
        }
        Err(ImportError::Pending(format!(
            "no payload directory for '{}' under {}",
            download.title,
            self.download_dir.display()
        )))
    }

    async fn import_season(
        &self,
        files: &[PathBuf],
        root: &Path,
        season: u32,
        episodes: &[u32],
    ) -> Result<String, ImportError> {
        let season_dir = root.join(format!("Season {season:02}"));
        let mut missing = Vec::new();
        let mut placed = 0usize;

        for &episode in episodes {
            let video = match find_episode_video(files, season, episode) {
                Some(video) => video,
                None => {
                    missing.push(episode);
                    continue;
                }
            };

            let dest = season_dir.join(file_name_of(video)?);
            place_file(video, &dest, self.verify_copies).await?;
            metrics::FILES_PLACED.inc();
            placed += 1;

            for (subtitle, lang) in find_episode_subtitles(files, season, episode) {
                let stem = dest
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                let sub_dest = season_dir.join(format!("{stem}.{lang}.srt"));
                place_file(&subtitle, &sub_dest, self.verify_copies).await?;
                metrics::FILES_PLACED.inc();
            }
        }

        if !missing.is_empty() {
            if placed == 0 {
                return Err(ImportError::NoFilesMatched(format!(
                    "no episode files matched season {season}"
                )));
            }
            return Err(ImportError::Partial { missing });
        }

        Ok(season_dir.display().to_string())
    }

    async fn import_movie(
        &self,
        files: &[PathBuf],
        root: &Path,
        file_stem: &str,
    ) -> Result<String, ImportError> {
        // Largest video is the feature; smaller ones are samples or extras.
        let video = files
            .iter()
            .filter(|f| is_video_path(f))
            .max_by_key(|f| std::fs::metadata(f).map(|m| m.len()).unwrap_or(0))
            .ok_or_else(|| ImportError::NoFilesMatched("no video file".to_string()))?;

        let extension = video
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "mkv".to_string());
        let dest = root.join(format!("{file_stem}.{extension}"));
        place_file(video, &dest, self.verify_copies).await?;
        metrics::FILES_PLACED.inc();

        Ok(dest.display().to_string())
    }

    async fn import_by_kind(
        &self,
        files: &[PathBuf],
        root: &Path,
        kind: FileKind,
    ) -> Result<String, ImportError> {
        let mut placed = 0usize;
        for file in files.iter().filter(|f| classify(f) == kind) {
            let dest = root.join(file_name_of(file)?);
            place_file(file, &dest, self.verify_copies).await?;
            metrics::FILES_PLACED.inc();
            placed += 1;
        }

        if placed == 0 {
            return Err(ImportError::NoFilesMatched(format!(
                "no {kind:?} files in payload"
            )));
        }

        Ok(root.display().to_string())
    }
}

fn file_name_of(path: &Path) -> Result<&std::ffi::OsStr, ImportError> {
    path.file_name()
        .ok_or_else(|| ImportError::NoFilesMatched(format!("{} has no file name", path.display())))
}
