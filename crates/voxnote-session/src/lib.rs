//! Voxnote session crate - the session-arbitration core.
//!
//! The microphone is a single exclusive resource shared by two listener
//! kinds (keyword spotting and dictation), and the platform's capture
//! release is asynchronous. This crate models the handoff explicitly: a
//! validated state machine with named waiting states, a single-writer
//! controller task that processes requests strictly in arrival order, and a
//! handle-identity invariant that forbids constructing a second listener
//! while one is recorded live.

pub mod controller;
pub mod listener;
pub mod processor;
pub mod state;

pub use controller::{SessionController, SessionControllerHandle};
pub use listener::{ListenerEvent, ListenerHandle};
pub use processor::UtteranceProcessor;
pub use state::{SessionState, StateMachine};
