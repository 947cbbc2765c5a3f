use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The canonical upper-case label, as stored in the `transactions.side` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            other => Err(CoreError::InvalidInput("side".to_string(), other.to_string())),
        }
    }
}

/// Final state of a transaction record. Nothing is persisted in a pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(CoreError::InvalidInput("status".to_string(), other.to_string())),
        }
    }
}

/// The metric an achievement threshold is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    /// Total FIFO-realized profit over the account's whole history.
    RealizedProfit,
    /// Sum of share quantities across all open positions.
    SharesHeld,
    /// Number of completed transactions.
    TradeCount,
}

impl AchievementCategory {
    /// The snake_case label used in `config.toml` achievement definitions.
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementCategory::RealizedProfit => "realized_profit",
            AchievementCategory::SharesHeld => "shares_held",
            AchievementCategory::TradeCount => "trade_count",
        }
    }
}

impl fmt::Display for AchievementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "realized_profit" => Ok(AchievementCategory::RealizedProfit),
            "shares_held" => Ok(AchievementCategory::SharesHeld),
            "trade_count" => Ok(AchievementCategory::TradeCount),
            other => Err(CoreError::InvalidInput("category".to_string(), other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn achievement_category_labels_match_serde() {
        for category in [
            AchievementCategory::RealizedProfit,
            AchievementCategory::SharesHeld,
            AchievementCategory::TradeCount,
        ] {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{category}\""));
            assert_eq!(category.as_str().parse::<AchievementCategory>().unwrap(), category);
        }
        assert_eq!("Trade_Count".parse::<AchievementCategory>().unwrap(), AchievementCategory::TradeCount);
        assert!(matches!("volume".parse::<AchievementCategory>(), Err(CoreError::InvalidInput(..))));
    }
}
