//! Projection of engine-defined hypothesis payloads to `{text, is_final}`.
//!
//! Vosk-style engines wrap recognized text in small JSON objects: final
//! results carry a `text` field, partials a `partial` field. The session
//! core only ever needs the text projection; malformed payloads project to
//! empty text (an empty final drives the normal end-of-turn path).

use tracing::warn;

use voxnote_core::types::Hypothesis;

use crate::EngineEvent;

/// Extract the recognized text from a hypothesis payload blob.
///
/// Accepts `{"text": "..."}` and `{"partial": "..."}` objects. Anything
/// else (malformed JSON, missing fields, non-object values) yields an empty
/// string.
pub fn extract_text(payload: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => value
            .get("text")
            .or_else(|| value.get("partial"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        Err(e) => {
            warn!(error = %e, payload, "Unparseable hypothesis payload");
            String::new()
        }
    }
}

/// Project an engine event to a [`Hypothesis`].
///
/// Errors and timeouts carry no hypothesis and project to `None`.
pub fn project(event: &EngineEvent) -> Option<Hypothesis> {
    match event {
        EngineEvent::Partial(payload) => Some(Hypothesis::partial(extract_text(payload))),
        EngineEvent::Final(payload) => Some(Hypothesis::final_result(extract_text(payload))),
        EngineEvent::Error(_) | EngineEvent::Timeout => None,
    }
}

/// Wrap plain text as a final-result payload (the mock engine and demo
/// driver speak the same payload dialect the projection reads).
pub fn final_payload(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

/// Wrap plain text as a partial-hypothesis payload.
pub fn partial_payload(text: &str) -> String {
    serde_json::json!({ "partial": text }).to_string()
}
