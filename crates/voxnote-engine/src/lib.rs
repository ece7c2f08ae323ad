//! Voxnote engine crate - recognition-engine collaborator abstraction.
//!
//! The recognition engine is an external collaborator: an opaque capability
//! that accepts audio and asynchronously emits hypothesis payloads. This
//! crate defines the trait seam the session core talks through, the raw
//! event type, the payload-to-[`Hypothesis`] projection, and a fully
//! scriptable mock for tests and the demo binary.

use async_trait::async_trait;
use tokio::sync::mpsc;

use voxnote_core::error::Result;
use voxnote_core::types::SessionKind;

pub mod hypothesis;
pub mod mock;

pub use mock::MockEngine;

/// A raw event from a recognition session.
///
/// `Partial` and `Final` carry engine-defined payload blobs (Vosk-style
/// engines emit JSON like `{"partial": "..."}` / `{"text": "..."}`); use
/// [`hypothesis::project`] for the `{text, is_final}` view. Per recognition
/// turn a session delivers zero or more partials followed by exactly one
/// final, one error, or one timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Partial(String),
    Final(String),
    Error(String),
    Timeout,
}

/// Factory for recognition sessions.
///
/// Fails with `VoxnoteError::ModelUnavailable` when no acoustic model is
/// loaded; that is the one engine failure surfaced to the UI.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Create a new recognition session of the given kind.
    ///
    /// Keyword-spotting sessions receive `phrase_filter = Some(trigger)` and
    /// restrict recognition to that grammar. Creating a session claims the
    /// capture resource; callers must not hold two sessions at once.
    async fn create_session(
        &self,
        kind: SessionKind,
        phrase_filter: Option<&str>,
    ) -> Result<Box<dyn RecognitionSession>>;
}

/// One live recognition session.
///
/// `stop` initiates shutdown and returns once the engine acknowledged it;
/// `shutdown` releases the capture resource. Release latency is asynchronous
/// and not instantly observable, which is why the session controller treats
/// the wait as an explicit drain.
#[async_trait]
pub trait RecognitionSession: Send {
    fn kind(&self) -> SessionKind;

    /// Begin streaming events into the given channel.
    async fn start_listening(&mut self, events: mpsc::Sender<EngineEvent>) -> Result<()>;

    /// Stop recognition. No events are delivered after this returns.
    async fn stop(&mut self) -> Result<()>;

    /// Release the underlying capture resource.
    async fn shutdown(&mut self) -> Result<()>;
}
