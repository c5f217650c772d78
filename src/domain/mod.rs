//! Domain types shared by every layer of Pseudonym.
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`EntityId`], [`GroupId`], [`SessionId`])
//! - **Error types** ([`PseudonymError`], [`DetectionError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, PseudonymError>`]:
//!
//! ```rust
//! use pseudonym::domain::{PseudonymError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = pseudonym::config::PseudonymConfig::from_file("pseudonym.toml")?;
//!     config.validate().map_err(PseudonymError::Configuration)?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod result;

pub use errors::{DetectionError, PseudonymError};
pub use ids::{EntityId, GroupId, SessionId};
pub use result::Result;
