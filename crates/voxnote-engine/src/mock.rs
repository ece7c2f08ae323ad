//! Mock recognition engine for tests and the demo binary.
//!
//! Simulates the engine collaborator without audio hardware or a model.
//! Tests script it by calling [`MockEngine::emit`], which delivers an event
//! to the most recently created session; events emitted after that session
//! stopped are dropped. The engine counts live sessions and their high-water
//! mark so tests can assert the single-capturing-handle invariant.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use voxnote_core::error::{Result, VoxnoteError};
use voxnote_core::types::SessionKind;

use crate::{EngineEvent, RecognitionEngine, RecognitionSession};

#[derive(Debug, Default)]
struct MockState {
    live: AtomicUsize,
    max_live: AtomicUsize,
    created: Mutex<Vec<(SessionKind, Option<String>)>>,
    feed: Mutex<Option<mpsc::UnboundedSender<EngineEvent>>>,
}

/// Scriptable in-memory recognition engine.
///
/// Cheaply cloneable; clones share counters and the event feed, so a test
/// can keep one clone while the session controller owns another.
#[derive(Clone)]
pub struct MockEngine {
    model_loaded: bool,
    drain_delay: Duration,
    state: Arc<MockState>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a mock engine with a loaded model and no drain latency.
    pub fn new() -> Self {
        Self {
            model_loaded: true,
            drain_delay: Duration::ZERO,
            state: Arc::new(MockState::default()),
        }
    }

    /// Create a mock engine whose model never loaded: every
    /// `create_session` fails with `ModelUnavailable`.
    pub fn without_model() -> Self {
        Self {
            model_loaded: false,
            ..Self::new()
        }
    }

    /// Simulate asynchronous capture-release latency during `shutdown`.
    pub fn with_drain_delay(mut self, delay: Duration) -> Self {
        self.drain_delay = delay;
        self
    }

    /// Deliver an event to the currently live session.
    ///
    /// Returns `false` if no session is live (or the live session already
    /// stopped), in which case the event is dropped.
    pub fn emit(&self, event: EngineEvent) -> bool {
        let feed = self.state.feed.lock().expect("feed mutex poisoned");
        match feed.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Kinds and phrase filters of every session created, in order.
    pub fn created(&self) -> Vec<(SessionKind, Option<String>)> {
        self.state
            .created
            .lock()
            .expect("created mutex poisoned")
            .clone()
    }

    /// Kinds of every session created, in order.
    pub fn created_kinds(&self) -> Vec<SessionKind> {
        self.created().into_iter().map(|(k, _)| k).collect()
    }

    /// Number of sessions currently holding the capture resource.
    pub fn live_sessions(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live sessions ever observed.
    pub fn max_live_sessions(&self) -> usize {
        self.state.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionEngine for MockEngine {
    async fn create_session(
        &self,
        kind: SessionKind,
        phrase_filter: Option<&str>,
    ) -> Result<Box<dyn RecognitionSession>> {
        if !self.model_loaded {
            return Err(VoxnoteError::ModelUnavailable(
                "mock engine created without a model".to_string(),
            ));
        }

        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live.fetch_max(live, Ordering::SeqCst);
        self.state
            .created
            .lock()
            .expect("created mutex poisoned")
            .push((kind, phrase_filter.map(str::to_string)));

        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.feed.lock().expect("feed mutex poisoned") = Some(tx.clone());

        debug!(%kind, phrase_filter, live, "Mock session created");

        Ok(Box::new(MockSession {
            kind,
            drain_delay: self.drain_delay,
            state: Arc::clone(&self.state),
            injector: Some(rx),
            injector_tx: tx,
            forwarder: None,
            released: false,
        }))
    }
}

struct MockSession {
    kind: SessionKind,
    drain_delay: Duration,
    state: Arc<MockState>,
    injector: Option<mpsc::UnboundedReceiver<EngineEvent>>,
    injector_tx: mpsc::UnboundedSender<EngineEvent>,
    forwarder: Option<JoinHandle<()>>,
    released: bool,
}

#[async_trait]
impl RecognitionSession for MockSession {
    fn kind(&self) -> SessionKind {
        self.kind
    }

    async fn start_listening(&mut self, events: mpsc::Sender<EngineEvent>) -> Result<()> {
        let mut rx = self
            .injector
            .take()
            .ok_or_else(|| VoxnoteError::Engine("mock session already started".to_string()))?;

        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        // Detach the feed so later emits are dropped, but only if the slot
        // still belongs to this session.
        let mut feed = self.state.feed.lock().expect("feed mutex poisoned");
        if let Some(tx) = feed.as_ref() {
            if tx.same_channel(&self.injector_tx) {
                *feed = None;
            }
        }
        drop(feed);

        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        debug!(kind = %self.kind, "Mock session stopped");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        if !self.released {
            if !self.drain_delay.is_zero() {
                tokio::time::sleep(self.drain_delay).await;
            }
            self.state.live.fetch_sub(1, Ordering::SeqCst);
            self.released = true;
            debug!(kind = %self.kind, "Mock session released");
        }
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if !self.released {
            self.state.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
