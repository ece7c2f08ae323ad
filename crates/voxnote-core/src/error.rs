use thiserror::Error;

/// Top-level error type for the Voxnote system.
///
/// Subsystem crates return this type directly so the `?` operator works
/// across crate boundaries. Transient session conditions (busy microphone,
/// empty results, engine turn errors) are resolved inside the session state
/// machine and never reach callers; only `ModelUnavailable` and
/// `InvariantViolation` are reported outward.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VoxnoteError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Acoustic model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Microphone error: {0}")]
    Mic(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Handoff timed out after {attempts} mic polls")]
    HandoffTimeout { attempts: u32 },

    #[error("Listener invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for VoxnoteError {
    fn from(err: toml::de::Error) -> Self {
        VoxnoteError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VoxnoteError {
    fn from(err: toml::ser::Error) -> Self {
        VoxnoteError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VoxnoteError {
    fn from(err: serde_json::Error) -> Self {
        VoxnoteError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Voxnote operations.
pub type Result<T> = std::result::Result<T, VoxnoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VoxnoteError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_handoff_timeout_display() {
        let err = VoxnoteError::HandoffTimeout { attempts: 10 };
        assert_eq!(err.to_string(), "Handoff timed out after 10 mic polls");
    }

    #[test]
    fn test_model_unavailable_display() {
        let err = VoxnoteError::ModelUnavailable("no model loaded".to_string());
        assert!(err.to_string().contains("no model loaded"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VoxnoteError = io_err.into();
        assert!(matches!(err, VoxnoteError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let parsed: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        assert!(parsed.is_err());
        let err: VoxnoteError = parsed.unwrap_err().into();
        assert!(matches!(err, VoxnoteError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        assert!(parsed.is_err());
        let err: VoxnoteError = parsed.unwrap_err().into();
        assert!(matches!(err, VoxnoteError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }

    #[test]
    fn test_error_debug_impl() {
        let err = VoxnoteError::InvariantViolation("second handle".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("InvariantViolation"));
        assert!(debug_str.contains("second handle"));
    }
}
