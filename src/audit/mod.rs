//! Accessibility rule engine.
//!
//! Pure document → report evaluation:
//! 1. `rules`: the fixed, ordered rule set and per-rule checks
//! 2. `engine`: folds the rules over a document
//! 3. `model`: findings and the four-way `ScanReport`

pub mod engine;
pub mod model;
pub mod rules;

pub use engine::RuleEngine;
pub use model::{Finding, NodeResult, Outcome, ScanReport, Severity};
