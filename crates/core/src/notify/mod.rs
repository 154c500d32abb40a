//! Import event notification channel.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Outcome of an import attempt for one job.
#[derive(Debug, Clone)]
pub struct ImportEvent {
    /// Release title of the imported job.
    pub title: String,
    /// Library-relative destination the files were placed under.
    pub media_ref: String,
    /// Whether every expected file was placed.
    pub success: bool,
    /// Human-readable detail, set on partial or failed imports.
    pub detail: Option<String>,
}

/// Envelope wrapping an import event with metadata
#[derive(Debug, Clone)]
pub struct ImportEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: ImportEvent,
}

/// Handle for emitting import notifications
///
/// This is cheaply cloneable and can be shared across tasks.
/// Events are sent through an async channel to whatever consumer the
/// application wires up (webhook forwarder, log sink, test receiver).
#[derive(Clone)]
pub struct NotifyHandle {
    tx: mpsc::Sender<ImportEventEnvelope>,
}

impl NotifyHandle {
    /// Create a new notify handle from a channel sender
    pub fn new(tx: mpsc::Sender<ImportEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an import event asynchronously
    ///
    /// This is non-blocking. If the channel is full or closed, the error is
    /// logged but the caller is not blocked or failed.
    pub async fn emit(&self, event: ImportEvent) {
        let envelope = ImportEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit import event: {}", e);
        }
    }

    /// Try to emit an import event without blocking
    ///
    /// Returns true if the event was sent successfully, false otherwise.
    pub fn try_emit(&self, event: ImportEvent) -> bool {
        let envelope = ImportEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit import event: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(success: bool) -> ImportEvent {
        ImportEvent {
            title: "Show.S01E01.1080p".to_string(),
            media_ref: "tv/Show/Season 01".to_string(),
            success,
            detail: None,
        }
    }

    #[tokio::test]
    async fn test_emit_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = NotifyHandle::new(tx);

        handle.emit(event(true)).await;

        let envelope = rx.recv().await.expect("Should receive event");
        assert!(envelope.event.success);
        assert_eq!(envelope.event.title, "Show.S01E01.1080p");
    }

    #[tokio::test]
    async fn test_multiple_handles_same_channel() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle1 = NotifyHandle::new(tx.clone());
        let handle2 = NotifyHandle::new(tx);

        handle1.emit(event(true)).await;
        handle2.emit(event(false)).await;

        let e1 = rx.recv().await.expect("Should receive first event");
        let e2 = rx.recv().await.expect("Should receive second event");

        assert!(e1.event.success);
        assert!(!e2.event.success);
    }

    #[test]
    fn test_try_emit_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = NotifyHandle::new(tx);

        assert!(handle.try_emit(event(true)));
        assert!(!handle.try_emit(event(false)));
    }

    #[tokio::test]
    async fn test_emit_closed_channel() {
        let (tx, rx) = mpsc::channel::<ImportEventEnvelope>(10);
        let handle = NotifyHandle::new(tx);

        drop(rx);

        // Should not panic, just log an error
        handle.emit(event(true)).await;
    }

    #[test]
    fn test_envelope_has_timestamp() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = NotifyHandle::new(tx);

        let before = Utc::now();
        handle.try_emit(event(true));
        let after = Utc::now();

        let envelope = rx.try_recv().expect("Should receive event");
        assert!(envelope.timestamp >= before);
        assert!(envelope.timestamp <= after);
    }
}
