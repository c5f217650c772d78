//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Human-readable or JSON console output
//! - Configurable log levels
//! - Local JSON file logging with rotation
//!
//! Log events carry identifiers, counts and types. Entity texts are never
//! logged.
//!
//! # Example
//!
//! ```no_run
//! use pseudonym::logging::init_logging;
//! use pseudonym::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(entities = 12, "Analysis completed");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log a session lifecycle event
///
/// # Example
///
/// ```no_run
/// use pseudonym::log_session_event;
/// use pseudonym::domain::SessionId;
///
/// let session_id = SessionId::generate();
/// log_session_event!(&session_id, "created");
/// ```
#[macro_export]
macro_rules! log_session_event {
    ($session_id:expr, $event:expr) => {
        tracing::info!(
            session_id = %$session_id,
            event = $event,
            "Session event"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use pseudonym::log_error_with_context;
/// use pseudonym::domain::PseudonymError;
///
/// let error = PseudonymError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
