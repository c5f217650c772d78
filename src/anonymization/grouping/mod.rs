//! Entity grouping
//!
//! Two grouping models live side by side:
//! - explicit [`EntityGroup`](crate::anonymization::models::EntityGroup)
//!   records, owned by the manager, with exclusive membership;
//! - token groups, derived on demand from entities sharing a replacement.
//!
//! Token edits update the explicit groups holding the same token.

pub mod integrity;
pub mod manager;
pub mod token_groups;

pub use integrity::{ConfidenceStats, EntityStatistics, IntegrityIssue};
pub use manager::{EntityManager, EntitySnapshot};
