//! # Tradesim Price Simulator
//!
//! Synthetic daily price history for instruments: a Gaussian random walk driven by each
//! instrument's volatility, with occasional bounded jumps.
//!
//! ## Architectural Principles
//!
//! - **Injected Randomness:** Every entry point takes the `rand::Rng` to draw from. Nothing
//!   in this crate owns an RNG, so a seeded `StdRng` makes a run reproducible.
//! - **Decimal at the Edges:** The walk runs in `f64`; prices leave the crate as `Decimal`
//!   rounded to cents, floored at `MIN_PRICE` and capped when the instrument has a cap.
//!
//! ## Public API
//!
//! - `PriceSimulator`: Generates a path of `SimulatedDay`s.
//! - `seed_history`: Generates and persists a path through a `database::Store`.
//! - `SimulatorError`: The specific error types that can be returned from this crate.

pub mod error;
pub mod price;
pub mod seed;

pub use error::SimulatorError;
pub use price::{standard_normal, PriceSimulator, SimulatedDay};
pub use seed::seed_history;
