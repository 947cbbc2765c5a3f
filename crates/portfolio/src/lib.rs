//! # Tradesim Portfolio
//!
//! Account-level read models. This crate fetches an account's history through the
//! `database::Store` contract and runs the pure `analytics` reconstructors over it.
//!
//! ## Public API
//!
//! - `PortfolioService`: Realized P&L, daily valuation, holdings, cached value refresh
//!   and the aggregate metrics used by achievements.
//! - `HoldingSnapshot`, `AccountMetrics`: The read models.
//! - `PortfolioError`: The specific error types that can be returned from this crate.

pub mod error;
pub mod service;
pub mod snapshot;

pub use error::PortfolioError;
pub use service::PortfolioService;
pub use snapshot::{AccountMetrics, HoldingSnapshot};
