//! Utterance processing: trigger stripping, filtering, persistence.

use std::sync::Mutex;

use regex::Regex;
use tracing::{info, warn};

use voxnote_core::types::Utterance;
use voxnote_store::TranscriptStore;

/// Notification fired once per persisted utterance (the UI-refresh hook).
pub type PersistedCallback = Box<dyn Fn(&Utterance) + Send + Sync>;

/// Turns final dictation hypotheses into persisted utterances.
pub struct UtteranceProcessor {
    store: TranscriptStore,
    active_folder: Mutex<String>,
    on_persisted: Mutex<Option<PersistedCallback>>,
}

/// Remove every whole-word occurrence of `phrase` from `text`,
/// case-insensitively, normalizing whitespace across the removal points.
pub fn strip_trigger(text: &str, phrase: &str) -> String {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return text.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    let pattern = format!(r"(?i)\b{}\b", regex::escape(phrase));
    match Regex::new(&pattern) {
        Ok(re) => re
            .replace_all(text, " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "),
        Err(e) => {
            warn!(error = %e, phrase, "Unusable trigger pattern, keeping text as-is");
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        }
    }
}

/// Whether `text` contains `phrase` as a substring, case-insensitively.
/// Used as the early-stop signal on partial hypotheses.
pub fn contains_trigger(text: &str, phrase: &str) -> bool {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return false;
    }
    text.to_lowercase().contains(&phrase.to_lowercase())
}

impl UtteranceProcessor {
    pub fn new(store: TranscriptStore, active_folder: impl Into<String>) -> Self {
        Self {
            store,
            active_folder: Mutex::new(active_folder.into()),
            on_persisted: Mutex::new(None),
        }
    }

    /// Register the notification fired exactly once per persisted utterance.
    pub fn set_on_persisted(&self, callback: PersistedCallback) {
        *self
            .on_persisted
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    pub fn set_active_folder(&self, folder: impl Into<String>) {
        *self
            .active_folder
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = folder.into();
    }

    pub fn active_folder(&self) -> String {
        self.active_folder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    /// Process one final dictation hypothesis.
    ///
    /// Discards silently when the raw text equals the trigger phrase or the
    /// stripped remainder is empty. Otherwise stamps the utterance with the
    /// local wall clock, appends it to the active folder, and fires the
    /// persisted notification. Storage failures are logged, never fatal.
    pub fn process_final(&self, raw: &str, trigger: &str) -> Option<Utterance> {
        let raw = raw.trim();
        if raw.is_empty() || raw.to_lowercase() == trigger.trim().to_lowercase() {
            return None;
        }
        let text = strip_trigger(raw, trigger);
        if text.is_empty() {
            return None;
        }

        let utterance = Utterance::new(text);
        let folder = self.active_folder();
        if let Err(e) = self.store.append(&folder, &utterance) {
            warn!(error = %e, folder, "Failed to persist utterance");
            return None;
        }
        info!(folder, text = %utterance.text, "Utterance persisted");

        if let Some(callback) = self
            .on_persisted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            callback(&utterance);
        }
        Some(utterance)
    }
}

// ===== Tests =====

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_processor() -> (tempfile::TempDir, UtteranceProcessor) {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path().join("data")).unwrap();
        (dir, UtteranceProcessor::new(store, "General"))
    }

    #[test]
    fn test_strip_trigger_whole_word() {
        assert_eq!(strip_trigger("dakota compra leche", "dakota"), "compra leche");
        assert_eq!(strip_trigger("compra dakota leche", "dakota"), "compra leche");
        assert_eq!(strip_trigger("compra leche dakota", "dakota"), "compra leche");
    }

    #[test]
    fn test_strip_trigger_case_insensitive() {
        assert_eq!(strip_trigger("Dakota compra leche", "dakota"), "compra leche");
        assert_eq!(strip_trigger("DAKOTA compra", "dakota"), "compra");
    }

    #[test]
    fn test_strip_trigger_respects_word_boundaries() {
        assert_eq!(strip_trigger("dakotas compra", "dakota"), "dakotas compra");
        assert_eq!(strip_trigger("norddakota", "dakota"), "norddakota");
    }

    #[test]
    fn test_strip_trigger_escapes_regex_metacharacters() {
        assert_eq!(strip_trigger("a.b compra", "a.b"), "compra");
        assert_eq!(strip_trigger("axb compra", "a.b"), "axb compra");
    }

    #[test]
    fn test_strip_trigger_normalizes_whitespace() {
        assert_eq!(
            strip_trigger("compra   dakota   leche", "dakota"),
            "compra leche"
        );
    }

    #[test]
    fn test_contains_trigger() {
        assert!(contains_trigger("blah dakota blah", "dakota"));
        assert!(contains_trigger("blah Dakota", "dakota"));
        assert!(contains_trigger("norddakota", "dakota"));
        assert!(!contains_trigger("compra leche", "dakota"));
        assert!(!contains_trigger("anything", ""));
    }

    #[test]
    fn test_process_final_persists_and_notifies_once() {
        let (_dir, processor) = test_processor();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_cb = Arc::clone(&fired);
        processor.set_on_persisted(Box::new(move |_| {
            fired_in_cb.fetch_add(1, Ordering::SeqCst);
        }));

        let utterance = processor
            .process_final("dakota compra leche", "dakota")
            .unwrap();
        assert_eq!(utterance.text, "compra leche");
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let lines = processor.store().list("General", None).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("compra leche"));
    }

    #[test]
    fn test_process_final_discards_trigger_only() {
        let (_dir, processor) = test_processor();
        assert!(processor.process_final("dakota", "dakota").is_none());
        assert!(processor.process_final("Dakota", "dakota").is_none());
        assert!(processor.process_final("  dakota  ", "dakota").is_none());
        assert!(processor.store().list("General", None).unwrap().is_empty());
    }

    #[test]
    fn test_process_final_discards_empty_remainder() {
        let (_dir, processor) = test_processor();
        assert!(processor.process_final("", "dakota").is_none());
        assert!(processor.process_final("   ", "dakota").is_none());
        assert!(processor
            .process_final("dakota dakota", "dakota")
            .is_none());
    }

    #[test]
    fn test_process_final_uses_active_folder() {
        let (_dir, processor) = test_processor();
        processor.set_active_folder("Trabajo");
        processor.process_final("enviar informe", "dakota").unwrap();

        assert!(processor.store().list("General", None).unwrap().is_empty());
        let lines = processor.store().list("Trabajo", None).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("enviar informe"));
    }

    #[test]
    fn test_round_trip_preserves_stripped_text() {
        let (_dir, processor) = test_processor();
        processor
            .process_final("Dakota recuerda llamar a Ana", "dakota")
            .unwrap();

        let read = processor.store().read_utterances("General").unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].text, "recuerda llamar a Ana");
    }
}
