use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// FIFO attribution of one sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedTrade {
    pub transaction_id: Uuid,
    pub instrument_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub quantity: i64,
    pub sell_price: Decimal,
    /// Shares matched against open lots.
    pub matched_quantity: i64,
    /// Shares left over once the lot queue ran dry. Non-zero means the history is inconsistent.
    pub unmatched_quantity: i64,
    /// Mean price of the consumed lot fragments. Zero when nothing was matched.
    pub cost_basis: Decimal,
    pub realized_pnl: Decimal,
}

impl RealizedTrade {
    pub fn is_anomalous(&self) -> bool {
        self.unmatched_quantity > 0
    }
}

/// Realized profit and loss of the sells inside a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedPnlReport {
    pub total_realized_pnl: Decimal,
    pub profitable_count: usize,
    pub unprofitable_count: usize,
    /// profitable / (profitable + unprofitable) * 100, or zero with no closed trades.
    pub win_rate_pct: Decimal,
    pub trades: Vec<RealizedTrade>,
}

impl RealizedPnlReport {
    /// Creates a new, zeroed-out report.
    pub fn new() -> Self {
        Self {
            total_realized_pnl: Decimal::ZERO,
            profitable_count: 0,
            unprofitable_count: 0,
            win_rate_pct: Decimal::ZERO,
            trades: Vec::new(),
        }
    }
}

impl Default for RealizedPnlReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Total value of an account's holdings at the close of one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationPoint {
    pub date: NaiveDate,
    pub total_value: Decimal,
}
