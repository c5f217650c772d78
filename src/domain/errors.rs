//! Domain error types
//!
//! This module defines the error hierarchy for Pseudonym. Errors are
//! domain-specific and don't expose third-party types.
//!
//! Detection problems are modelled separately in [`DetectionError`]: they
//! never reach the caller of an analysis, they are downgraded to
//! diagnostics by the detector chain.

use thiserror::Error;

/// Main Pseudonym error type
#[derive(Debug, Error)]
pub enum PseudonymError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A record or user input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A detector failed (only surfaced when a detector is called directly)
    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),

    /// The accepted replacement plan overlaps or points outside the text.
    ///
    /// Fatal for the rewrite step of one document: no partial text is produced.
    #[error("Rewrite integrity failure: {0}")]
    RewriteIntegrity(String),

    /// Unknown entity, group or token
    #[error("Not found: {0}")]
    NotFound(String),

    /// Session store errors
    #[error("Session error: {0}")]
    Session(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Detector-specific errors
///
/// Errors that occur while a single detector runs. None of them are fatal
/// for an analysis.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// The external service did not answer within the configured timeout
    #[error("Request timeout after {0}s")]
    Timeout(u64),

    /// The external service is not reachable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server answered with an error status
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// The answer could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Internal failure of a local detector
    #[error("Internal detector failure: {0}")]
    Internal(String),
}

impl PseudonymError {
    /// Whether the error means the rewritten text must not be trusted
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, PseudonymError::RewriteIntegrity(_))
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for PseudonymError {
    fn from(err: std::io::Error) -> Self {
        PseudonymError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for PseudonymError {
    fn from(err: serde_json::Error) -> Self {
        PseudonymError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for PseudonymError {
    fn from(err: toml::de::Error) -> Self {
        PseudonymError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<regex::Error> for PseudonymError {
    fn from(err: regex::Error) -> Self {
        PseudonymError::Configuration(format!("Invalid pattern: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudonym_error_display() {
        let err = PseudonymError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_detection_error_conversion() {
        let detection_err = DetectionError::Timeout(30);
        let err: PseudonymError = detection_err.into();
        assert!(matches!(err, PseudonymError::Detection(_)));
        assert_eq!(err.to_string(), "Detection error: Request timeout after 30s");
    }

    #[test]
    fn test_integrity_failure_flag() {
        assert!(PseudonymError::RewriteIntegrity("overlap".into()).is_integrity_failure());
        assert!(!PseudonymError::Validation("x".into()).is_integrity_failure());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: PseudonymError = io_err.into();
        assert!(matches!(err, PseudonymError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: PseudonymError = json_err.into();
        assert!(matches!(err, PseudonymError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: PseudonymError = toml_err.into();
        assert!(matches!(err, PseudonymError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_regex_error_conversion() {
        let regex_err = regex::Regex::new("(unclosed").unwrap_err();
        let err: PseudonymError = regex_err.into();
        assert!(err.to_string().starts_with("Configuration error: Invalid pattern"));
    }

    #[test]
    fn test_errors_implement_std_error() {
        let err = PseudonymError::Validation("Test error".to_string());
        let _: &dyn std::error::Error = &err;
        let err = DetectionError::Internal("Test error".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
