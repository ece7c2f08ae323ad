//! Session state machine with validated transitions.

use std::fmt;

use tokio::sync::watch;
use tracing::debug;

use voxnote_core::error::{Result, VoxnoteError};

/// The session lifecycle states.
///
/// `HandingOffToDictation` and `CoolingDown` are explicit waiting states:
/// capture release is asynchronous and not instantly observable, so the
/// machine waits there with bounded retries instead of transitioning
/// directly between listener kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SpottingKeyword,
    HandingOffToDictation,
    Dictating,
    StoppingDictation,
    CoolingDown,
}

impl SessionState {
    /// Whether a transition from this state to `target` is valid.
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Idle, SpottingKeyword | HandingOffToDictation)
                | (SpottingKeyword, HandingOffToDictation | Idle)
                | (HandingOffToDictation, Dictating | SpottingKeyword | Idle)
                | (Dictating, StoppingDictation | Idle)
                | (StoppingDictation, CoolingDown | Idle)
                | (CoolingDown, SpottingKeyword | Idle)
        )
    }

    /// Stable states: queued reconfiguration is applied only here, never
    /// mid-handoff.
    pub fn is_stable(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::SpottingKeyword | SessionState::Dictating
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::SpottingKeyword => "spotting-keyword",
            SessionState::HandingOffToDictation => "handing-off-to-dictation",
            SessionState::Dictating => "dictating",
            SessionState::StoppingDictation => "stopping-dictation",
            SessionState::CoolingDown => "cooling-down",
        };
        write!(f, "{name}")
    }
}

/// Observable state holder over a watch channel.
pub struct StateMachine {
    tx: watch::Sender<SessionState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Idle);
        Self { tx }
    }

    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Receiver for state-change notifications (the UI recording indicator).
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Move to `target`, rejecting transitions outside the table.
    pub fn transition(&self, target: SessionState) -> Result<()> {
        let current = self.current();
        if !current.can_transition_to(target) {
            return Err(VoxnoteError::Session(format!(
                "invalid transition: {current} -> {target}"
            )));
        }
        debug!(from = %current, to = %target, "Session state transition");
        self.tx.send_replace(target);
        Ok(())
    }

    pub fn reset(&self) {
        self.tx.send_replace(SessionState::Idle);
    }
}

// ===== Tests =====
