pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AchievementCategory, OrderSide, TransactionStatus};
pub use error::CoreError;
pub use structs::{
    Account, Instrument, MIN_PRICE, Position, PriceObservation, SimulationParams, Transaction,
};
