//! Voxnote mic crate - advisory microphone availability checks.
//!
//! The platform only exposes a best-effort signal for whether the capture
//! device is held by another client. The probe here is advisory: a `false`
//! does not guarantee the next capture attempt succeeds, and the session
//! core never relies on it for correctness. It exists to pace handoffs, so
//! a new listener is not created while the previous one is still draining.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use voxnote_core::error::Result;

/// Best-effort view of the capture device.
pub trait MicrophoneProbe: Send + Sync {
    /// Whether another client currently holds the capture device.
    fn is_in_use(&self) -> Result<bool>;
}

/// Paces microphone handoffs using an advisory probe.
pub struct MicrophoneArbiter {
    probe: Arc<dyn MicrophoneProbe>,
}

impl MicrophoneArbiter {
    pub fn new(probe: Arc<dyn MicrophoneProbe>) -> Self {
        Self { probe }
    }

    /// Whether the microphone currently looks free.
    ///
    /// A probe failure is treated as busy: when the platform cannot answer,
    /// assuming the device is held is the conservative reading.
    pub fn is_free(&self) -> bool {
        match self.probe.is_in_use() {
            Ok(in_use) => !in_use,
            Err(e) => {
                warn!(error = %e, "Microphone probe failed, treating as busy");
                false
            }
        }
    }

    /// Poll until the microphone looks free.
    ///
    /// Checks immediately, then up to `max_attempts - 1` more times spaced
    /// by `poll_interval`. Returns `false` if the device still looked busy
    /// after the last attempt.
    pub async fn await_free(&self, poll_interval: Duration, max_attempts: u32) -> bool {
        for attempt in 1..=max_attempts {
            if self.is_free() {
                debug!(attempt, "Microphone free");
                return true;
            }
            if attempt < max_attempts {
                tokio::time::sleep(poll_interval).await;
            }
        }
        warn!(max_attempts, "Microphone still busy after polling");
        false
    }
}

/// Probe for platforms without a capture-status API; always reports free.
#[derive(Debug, Default)]
pub struct StubMicrophoneProbe;

impl MicrophoneProbe for StubMicrophoneProbe {
    fn is_in_use(&self) -> Result<bool> {
        Ok(false)
    }
}

/// Test probe that reports busy for a configured number of polls.
#[derive(Debug, Default)]
pub struct MockMicrophoneProbe {
    busy_polls: AtomicUsize,
    failing: bool,
    polls: AtomicUsize,
}

impl MockMicrophoneProbe {
    /// A probe that always reports free.
    pub fn free() -> Self {
        Self::default()
    }

    /// A probe that reports busy for the first `polls` checks, then free.
    pub fn busy_for(polls: usize) -> Self {
        Self {
            busy_polls: AtomicUsize::new(polls),
            ..Self::default()
        }
    }

    /// A probe whose every check fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Number of checks made so far.
    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl MicrophoneProbe for MockMicrophoneProbe {
    fn is_in_use(&self) -> Result<bool> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(voxnote_core::VoxnoteError::Mic(
                "capture status unavailable".to_string(),
            ));
        }
        let remaining = self
            .busy_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(remaining)
    }
}

// ===== Tests =====
