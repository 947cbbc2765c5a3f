use analytics::AnalyticsError;
use database::DbError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Position {position_id} references unknown instrument {instrument_id}")]
    MissingInstrument { position_id: Uuid, instrument_id: Uuid },

    #[error("Portfolio value of account {0} exceeds the decimal range")]
    ValueOverflow(Uuid),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}
