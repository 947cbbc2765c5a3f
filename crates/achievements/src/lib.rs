//! # Tradesim Achievements
//!
//! Threshold achievements checked after every committed order.
//!
//! ## Architectural Principles
//!
//! - **Post-Commit Only:** `AchievementEvaluator` implements `executor::PostCommitHook`. It
//!   runs after the order is durable and its failures never reach the order's caller.
//! - **External Catalog:** Which thresholds exist and where unlocks are stored sit behind the
//!   `AchievementCatalog` and `AchievementSink` traits. `StaticCatalog` serves both from the
//!   `[[achievements]]` configuration with unlocks kept in memory.
//! - **Category Dispatch:** Each `AchievementCategory` maps to one pure rule function; the
//!   evaluator looks up the rule once per category present in the pending set.
//!
//! ## Public API
//!
//! - `AchievementEvaluator`: The hook.
//! - `AchievementCatalog`, `AchievementSink`, `StaticCatalog`: Definition source and unlock sink.
//! - `default_rules`, `RuleFn`: The category-to-rule map.
//! - `AchievementError`: The specific error types that can be returned from this crate.

pub mod catalog;
pub mod error;
pub mod evaluator;
pub mod rules;

pub use catalog::{AchievementCatalog, AchievementSink, StaticCatalog};
pub use error::AchievementError;
pub use evaluator::AchievementEvaluator;
pub use rules::{default_rules, RuleFn};
