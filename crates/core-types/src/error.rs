use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Invalid simulation parameters: {0}")]
    InvalidSimulationParams(String),

    #[error("Amount overflow: {0}")]
    AmountOverflow(String),
}
