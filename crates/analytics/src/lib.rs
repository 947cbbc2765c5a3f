//! # Tradesim Analytics
//!
//! This crate reconstructs derived figures from an account's immutable history:
//! realized profit per sell and the end-of-day value of its holdings.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of storage.
//!   It depends only on `core-types` (Layer 0); callers fetch the records and pass them in.
//! - **Stateless Calculation:** Both reconstructors replay the full history on every call
//!   and keep no state between calls, so they can run concurrently and repeatedly.
//! - **Different Cost Models:** Realized P&L uses FIFO lot matching, which is deliberately
//!   not the weighted-average cost carried on live positions.
//!
//! ## Public API
//!
//! - `RealizedPnlReconstructor`: FIFO attribution of realized gains to sells in a window.
//! - `PortfolioValuationReconstructor`: Daily holdings value with carry-forward pricing.
//! - `RealizedPnlReport`, `RealizedTrade`, `ValuationPoint`: The result structs.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

pub mod error;
pub mod realized;
pub mod report;
pub mod valuation;

pub use error::AnalyticsError;
pub use realized::RealizedPnlReconstructor;
pub use report::{RealizedPnlReport, RealizedTrade, ValuationPoint};
pub use valuation::{end_of_day, holdings_as_of, PortfolioValuationReconstructor};
