//! Core domain types shared across the Voxnote crates.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Wall-clock timestamp format used for persisted utterances.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Separator between the timestamp and the text in a persisted entry line.
pub const ENTRY_SEPARATOR: &str = " → ";

/// The two kinds of recognition session. Never more than one of either kind
/// holds the microphone at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Continuous low-footprint listening restricted to the trigger phrase.
    KeywordSpotting,
    /// Full continuous speech-to-text capture after trigger detection.
    Dictation,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::KeywordSpotting => write!(f, "keyword-spotting"),
            SessionKind::Dictation => write!(f, "dictation"),
        }
    }
}

/// The `{text, is_final}` projection of an engine-defined hypothesis payload.
///
/// Transient: hypotheses are never stored. Only final dictation hypotheses
/// with non-trigger-only content become [`Utterance`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypothesis {
    pub text: String,
    pub is_final: bool,
}

impl Hypothesis {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// A persisted, trigger-stripped, non-empty recognized text with timestamp.
///
/// Immutable once persisted; owned by the transcript store under the
/// currently-selected folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Local wall-clock time the utterance was recognized.
    pub timestamp: DateTime<Local>,
    /// Trigger-stripped, trimmed recognized text.
    pub text: String,
}

impl Utterance {
    /// Create an utterance stamped with the current local time.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            text: text.into(),
        }
    }

    /// Render the persisted entry line: `<dd-mm-YYYY HH:MM:SS> → <text>`.
    pub fn render_line(&self) -> String {
        format!(
            "{}{}{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            ENTRY_SEPARATOR,
            self.text
        )
    }

    /// Parse a persisted entry line back into an utterance.
    ///
    /// Returns `None` for lines that don't carry the separator or a valid
    /// timestamp. Sub-second precision is not preserved by the line format.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (stamp, text) = line.split_once(ENTRY_SEPARATOR)?;
        let naive = NaiveDateTime::parse_from_str(stamp.trim(), TIMESTAMP_FORMAT).ok()?;
        let timestamp = Local.from_local_datetime(&naive).earliest()?;
        Some(Self {
            timestamp,
            text: text.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_kind_display() {
        assert_eq!(SessionKind::KeywordSpotting.to_string(), "keyword-spotting");
        assert_eq!(SessionKind::Dictation.to_string(), "dictation");
    }

    #[test]
    fn test_hypothesis_constructors() {
        let p = Hypothesis::partial("hola");
        assert_eq!(p.text, "hola");
        assert!(!p.is_final);

        let f = Hypothesis::final_result("hola mundo");
        assert_eq!(f.text, "hola mundo");
        assert!(f.is_final);
    }

    #[test]
    fn test_utterance_render_line() {
        let u = Utterance::new("compra leche");
        let line = u.render_line();
        assert!(line.ends_with(" → compra leche"));
        assert!(line.contains(&u.timestamp.format("%d-%m-%Y").to_string()));
    }

    #[test]
    fn test_utterance_round_trip() {
        let u = Utterance::new("compra leche");
        let parsed = Utterance::parse_line(&u.render_line()).unwrap();
        assert_eq!(parsed.text, "compra leche");
        // The line format has second precision; compare at that granularity.
        assert_eq!(
            parsed.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            u.timestamp.format(TIMESTAMP_FORMAT).to_string()
        );
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(Utterance::parse_line("no separator here").is_none());
        assert!(Utterance::parse_line("not-a-date → text").is_none());
        assert!(Utterance::parse_line("").is_none());
    }

    #[test]
    fn test_parse_line_trims_text() {
        let parsed = Utterance::parse_line("01-02-2026 10:20:30 →   spaced out  ").unwrap();
        assert_eq!(parsed.text, "spaced out");
    }
}
