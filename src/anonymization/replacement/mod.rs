//! Text replacement
//!
//! Turns selected entities into rules and rewrites a text with them so that
//! no two substitutions ever touch the same character.

pub mod engine;
pub mod report;
pub mod rule;

pub use engine::ReplacementEngine;
pub use report::{
    AppliedReplacement, RemovalReason, RemovedRule, ReplacementReport, RewriteResult, RuleReport,
};
pub use rule::ReplacementRule;
