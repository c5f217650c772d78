//! Result type alias for Pseudonym

use super::errors::PseudonymError;

/// Result type alias for Pseudonym operations
///
/// # Examples
///
/// ```
/// use pseudonym::domain::result::Result;
/// use pseudonym::domain::errors::PseudonymError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(PseudonymError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, PseudonymError>;
