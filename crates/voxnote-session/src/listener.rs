//! Listener handles: ownership of one live recognition session.
//!
//! A handle is the unit the handle-identity invariant counts: the
//! controller never constructs one while another is recorded live. Each
//! handle carries a generation number; events from a stopped generation
//! that are still in flight are discarded by the controller.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use voxnote_core::error::Result;
use voxnote_core::types::SessionKind;
use voxnote_engine::{EngineEvent, RecognitionEngine, RecognitionSession};

/// An engine event tagged with the identity of the handle that produced it.
#[derive(Debug)]
pub struct ListenerEvent {
    pub generation: u64,
    pub kind: SessionKind,
    pub event: EngineEvent,
}

/// One live listener: an engine session plus the forwarder task that tags
/// its events and funnels them into the controller's queue.
pub struct ListenerHandle {
    generation: u64,
    kind: SessionKind,
    session: Box<dyn RecognitionSession>,
    forwarder: JoinHandle<()>,
}

impl ListenerHandle {
    /// Create a session of the given kind and start listening.
    ///
    /// If the session is created but listening fails to start, the session
    /// is shut down before the error is returned, so the capture resource
    /// is never leaked.
    pub async fn start(
        engine: &dyn RecognitionEngine,
        kind: SessionKind,
        phrase_filter: Option<&str>,
        generation: u64,
        sink: mpsc::Sender<ListenerEvent>,
    ) -> Result<Self> {
        let mut session = engine.create_session(kind, phrase_filter).await?;

        let (events_tx, mut events_rx) = mpsc::channel(16);
        if let Err(e) = session.start_listening(events_tx).await {
            if let Err(shutdown_err) = session.shutdown().await {
                warn!(error = %shutdown_err, "Failed to release session after start failure");
            }
            return Err(e);
        }

        let forwarder = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let tagged = ListenerEvent {
                    generation,
                    kind,
                    event,
                };
                if sink.send(tagged).await.is_err() {
                    break;
                }
            }
        });

        debug!(generation, %kind, "Listener started");
        Ok(Self {
            generation,
            kind,
            session,
            forwarder,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Stop and drain the listener.
    ///
    /// Consumes the handle: both the engine's stop acknowledgement and the
    /// capture release are awaited before this returns, so a caller that
    /// awaits `stop` never observes a half-released session. The release is
    /// attempted even if the stop itself failed.
    pub async fn stop(mut self) -> Result<()> {
        let stopped = self.session.stop().await;
        let released = self.session.shutdown().await;
        self.forwarder.abort();
        debug!(generation = self.generation, kind = %self.kind, "Listener stopped");
        stopped?;
        released?;
        Ok(())
    }
}

// ===== Tests =====

#[cfg(test)]
mod tests {
    use super::*;
    use voxnote_core::VoxnoteError;
    use voxnote_engine::hypothesis::final_payload;
    use voxnote_engine::MockEngine;

    #[tokio::test]
    async fn test_events_are_tagged_with_generation_and_kind() {
        let engine = MockEngine::new();
        let (sink, mut rx) = mpsc::channel(8);

        let handle = ListenerHandle::start(
            &engine,
            SessionKind::KeywordSpotting,
            Some("dakota"),
            7,
            sink,
        )
        .await
        .unwrap();

        engine.emit(EngineEvent::Final(final_payload("dakota")));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.generation, 7);
        assert_eq!(event.kind, SessionKind::KeywordSpotting);
        assert_eq!(event.event, EngineEvent::Final(final_payload("dakota")));

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_drains_the_session() {
        let engine = MockEngine::new();
        let (sink, _rx) = mpsc::channel(8);

        let handle = ListenerHandle::start(&engine, SessionKind::Dictation, None, 1, sink)
            .await
            .unwrap();
        assert_eq!(engine.live_sessions(), 1);

        handle.stop().await.unwrap();
        assert_eq!(engine.live_sessions(), 0);
        assert!(!engine.emit(EngineEvent::Timeout));
    }

    #[tokio::test]
    async fn test_start_without_model_fails() {
        let engine = MockEngine::without_model();
        let (sink, _rx) = mpsc::channel(8);

        let result = ListenerHandle::start(&engine, SessionKind::Dictation, None, 1, sink).await;
        assert!(matches!(result, Err(VoxnoteError::ModelUnavailable(_))));
        assert_eq!(engine.live_sessions(), 0);
    }
}
