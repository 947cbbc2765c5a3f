use core_types::CoreError;
use database::DbError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Invalid simulation parameters: {0}")]
    InvalidParams(#[from] CoreError),

    #[error("Instrument not found: {0}")]
    InstrumentNotFound(Uuid),

    #[error("Numeric conversion failed: {0}")]
    Conversion(String),

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}
