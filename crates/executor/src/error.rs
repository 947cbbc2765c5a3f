use database::DbError;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Failures raised by the position ledger. All of them mean the stored state no
/// longer matches what the caller validated against; none is a user error.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Position not found: {0}")]
    PositionNotFound(Uuid),

    #[error("Position {position_id} holds {available} shares, cannot remove {requested}")]
    InsufficientQuantity {
        position_id: Uuid,
        requested: i64,
        available: i64,
    },

    #[error("Guarded write on position {0} matched no row")]
    StaleWrite(Uuid),

    #[error("Invalid ledger input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

#[derive(Error, Debug)]
pub enum OrderError {
    // --- Validation failures: expected, user-facing ---
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(Uuid),

    #[error("Instrument {symbol} is not tradable (active: {active}, frozen: {frozen})")]
    InstrumentNotTradable {
        symbol: String,
        active: bool,
        frozen: bool,
    },

    #[error("Order quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),

    #[error("Order value of {quantity} x {price} exceeds the decimal range")]
    AmountOverflow { price: Decimal, quantity: i64 },

    #[error("Not enough cash available to execute trade. Required: {required}, Available: {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Not enough shares to sell. Requested: {requested}, Available: {available}")]
    InsufficientShares { requested: i64, available: i64 },

    // --- Consistency failures: programming or data-integrity bugs ---
    #[error("Consistency failure: {0}")]
    Consistency(String),

    #[error("Ledger consistency failure: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

impl OrderError {
    /// True for the expected, user-facing outcomes; false for integrity and I/O failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::InstrumentNotFound(_)
                | OrderError::InstrumentNotTradable { .. }
                | OrderError::InvalidQuantity(_)
                | OrderError::AmountOverflow { .. }
                | OrderError::InsufficientBalance { .. }
                | OrderError::InsufficientShares { .. }
        )
    }
}

/// Returned by post-commit hooks. Only ever logged.
#[derive(Error, Debug)]
#[error("Post-commit hook failed: {0}")]
pub struct HookError(pub String);
