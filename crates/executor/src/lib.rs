//! # Tradesim Executor Crate
//!
//! This crate turns a user's intent to buy or sell into committed state: a cash
//! movement, a position change and one immutable transaction record, all in one
//! unit of work.
//!
//! ## Architectural Principles
//!
//! - **State vs. Orchestration:** `PositionLedger` owns the position arithmetic
//!   (open, re-average, reduce, close). `OrderExecutor` owns validation, the cash
//!   movement and the transaction record, and routes into the ledger.
//! - **All or nothing:** Every step of an order runs through one `StoreTx`. A failed
//!   precondition or guard simply drops the unit uncommitted.
//! - **Post-commit only:** `PostCommitHook` is the outbound seam for side work such as
//!   achievement checks. It runs detached, after commit, and cannot fail the order.
//!
//! ## Public API
//!
//! - `OrderExecutor` / `OrderReceipt`: order entry point and its result.
//! - `PositionLedger` / `LedgerOutcome`: position mutations inside a unit of work.
//! - `PostCommitHook`: the trait post-commit consumers implement.
//! - `OrderError`, `LedgerError`, `HookError`: the error types of this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod ledger;
pub mod order;

// Re-export the key components to provide a clean, public-facing API.
pub use error::{HookError, LedgerError, OrderError};
pub use ledger::{LedgerOutcome, PositionLedger, weighted_average};
pub use order::{OrderExecutor, OrderReceipt, PostCommitHook};
