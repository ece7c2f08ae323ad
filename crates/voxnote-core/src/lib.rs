//! Voxnote core crate - shared error type, configuration, and domain types.

pub mod config;
pub mod error;
pub mod types;

pub use config::VoxnoteConfig;
pub use error::{Result, VoxnoteError};
pub use types::{Hypothesis, SessionKind, Utterance};
