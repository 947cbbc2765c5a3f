use portfolio::PortfolioError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AchievementError {
    #[error("Failed to read account metrics: {0}")]
    Metrics(#[from] PortfolioError),

    #[error("Achievement catalog unavailable: {0}")]
    Catalog(String),

    #[error("Failed to record unlock: {0}")]
    Sink(String),
}
