//! Acquisition lifecycle integration tests.
//!
//! These tests verify the path from a cached debrid hit through local
//! staging, and the import reconciler moving a finished payload into a
//! library layout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use mediarr_core::{
    debrid::{DebridCacheGate, DebridProvider, GateStatus, RemoteFile, RemoteState},
    download::{Download, DownloadStatus},
    importer::{ImportError, ImportReconciler, ImportTarget, ImportTargetResolver},
    indexer::Protocol,
    jobs::{JobStore, SqliteJobStore},
    notify::NotifyHandle,
    testing::MockDebridProvider,
};

const HASH: &str = "aabbccddeeff00112233aabbccddeeff00112233";
const MAGNET: &str = "magnet:?xt=urn:btih:aabbccddeeff00112233aabbccddeeff00112233";

/// Poll the gate until the hash is staged locally or the deadline passes.
async fn wait_for_local_ready(gate: &Arc<DebridCacheGate>, hash: &str) -> bool {
    for _ in 0..100 {
        if gate.status(hash).await == GateStatus::LocalReady {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_cached_hit_is_staged_locally() {
    let staging = TempDir::new().unwrap();
    let provider = Arc::new(MockDebridProvider::new("mock"));
    provider.set_cached(true).await;
    provider
        .set_remote(
            HASH,
            RemoteState::Ready,
            vec![RemoteFile {
                id: "1".to_string(),
                path: "Show.S01E01.1080p.mkv".to_string(),
                size_bytes: 4096,
            }],
        )
        .await;

    let gate = Arc::new(DebridCacheGate::new(
        vec![provider as Arc<dyn DebridProvider>],
        staging.path().to_path_buf(),
    ));

    gate.submit(HASH, MAGNET).await.unwrap();
    assert!(wait_for_local_ready(&gate, HASH).await);
    assert!(gate
        .staging_path(HASH)
        .join("Show.S01E01.1080p.mkv")
        .is_file());
}

#[tokio::test]
async fn test_rate_limited_provider_fails_over_end_to_end() {
    let staging = TempDir::new().unwrap();

    let limited = Arc::new(MockDebridProvider::new("limited"));
    limited
        .set_next_error(mediarr_core::debrid::DebridError::RateLimited)
        .await;

    let backup = Arc::new(MockDebridProvider::new("backup"));
    backup.set_cached(true).await;
    backup
        .set_remote(
            HASH,
            RemoteState::Ready,
            vec![RemoteFile {
                id: "1".to_string(),
                path: "Show.S01E01.1080p.mkv".to_string(),
                size_bytes: 4096,
            }],
        )
        .await;

    let gate = Arc::new(DebridCacheGate::new(
        vec![
            limited.clone() as Arc<dyn DebridProvider>,
            backup.clone() as Arc<dyn DebridProvider>,
        ],
        staging.path().to_path_buf(),
    ));

    gate.submit(HASH, MAGNET).await.unwrap();

    assert!(limited.added_magnets().await.is_empty());
    assert_eq!(backup.added_magnets().await.len(), 1);
    assert!(wait_for_local_ready(&gate, HASH).await);
}

struct SeasonResolver {
    root: PathBuf,
}

#[async_trait]
impl ImportTargetResolver for SeasonResolver {
    async fn resolve(&self, _: &Download) -> Result<Option<ImportTarget>, ImportError> {
        Ok(Some(ImportTarget::Season {
            root: self.root.clone(),
            season: 1,
            episodes: vec![1, 2],
        }))
    }
}

#[tokio::test]
async fn test_finished_download_is_imported_and_notified() {
    let downloads = TempDir::new().unwrap();
    let library = TempDir::new().unwrap();

    // Simulate a backend having deposited the payload.
    let payload = downloads.path().join(HASH);
    std::fs::create_dir_all(&payload).unwrap();
    std::fs::write(payload.join("Show.S01E01.1080p.mkv"), b"ep1").unwrap();
    std::fs::write(payload.join("Show.S01E02.1080p.mkv"), b"ep2").unwrap();
    std::fs::write(payload.join("sample.txt"), b"junk").unwrap();

    let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::in_memory().unwrap());
    let mut download = Download::new(
        "qbittorrent",
        &mediarr_core::testing::fixtures::tv_candidate("Show", 1, 1, HASH),
        HASH.to_string(),
    );
    download.status = DownloadStatus::Finished;
    store.save(&download).unwrap();

    let (tx, mut rx) = mpsc::channel(10);
    let reconciler = ImportReconciler::new(
        store.clone(),
        Arc::new(SeasonResolver {
            root: library.path().join("Show"),
        }),
        NotifyHandle::new(tx),
        downloads.path().to_path_buf(),
        false,
    );

    reconciler.tick().await;

    assert!(store.get(&download.id).unwrap().unwrap().imported);
    assert!(library
        .path()
        .join("Show/Season 01/Show.S01E01.1080p.mkv")
        .is_file());
    assert!(library
        .path()
        .join("Show/Season 01/Show.S01E02.1080p.mkv")
        .is_file());

    let envelope = rx.try_recv().unwrap();
    assert!(envelope.event.success);

    // A second tick has nothing left to do.
    reconciler.tick().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_downloading_jobs_are_not_imported() {
    let downloads = TempDir::new().unwrap();
    let library = TempDir::new().unwrap();

    let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::in_memory().unwrap());
    let download = Download {
        id: Download::job_id("qbittorrent", "ee01"),
        title: "Show.S01E01.1080p".to_string(),
        protocol: Protocol::Torrent,
        quality: mediarr_core::classifier::Quality::FullHd,
        hash: "ee01".to_string(),
        status: DownloadStatus::Downloading,
        imported: false,
        created_at: chrono::Utc::now(),
    };
    store.save(&download).unwrap();

    let (tx, mut rx) = mpsc::channel(10);
    let reconciler = ImportReconciler::new(
        store.clone(),
        Arc::new(SeasonResolver {
            root: library.path().join("Show"),
        }),
        NotifyHandle::new(tx),
        downloads.path().to_path_buf(),
        false,
    );

    reconciler.tick().await;

    assert!(!store.get(&download.id).unwrap().unwrap().imported);
    assert!(rx.try_recv().is_err());
}
