use core_types::{Instrument, Position};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One open position marked to the instrument's current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingSnapshot {
    pub position_id: Uuid,
    pub instrument_id: Uuid,
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: Decimal,
    pub current_price: Decimal,
    pub market_value: Decimal,
    /// Against the weighted-average cost, not FIFO lots.
    pub unrealized_pnl: Decimal,
}

impl HoldingSnapshot {
    /// `None` when the market value or cost basis leaves the decimal range.
    pub fn mark(position: &Position, instrument: &Instrument) -> Option<Self> {
        let quantity = Decimal::from(position.quantity);
        let market_value = instrument.current_price.checked_mul(quantity)?;
        let cost_basis = position.cost_basis()?;
        Some(Self {
            position_id: position.position_id,
            instrument_id: position.instrument_id,
            symbol: instrument.symbol.clone(),
            quantity: position.quantity,
            average_cost: position.average_cost,
            current_price: instrument.current_price,
            market_value,
            unrealized_pnl: market_value.checked_sub(cost_basis)?,
        })
    }
}

/// Aggregates over an account's full history, as consumed by achievement rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountMetrics {
    pub total_realized_profit: Decimal,
    pub shares_held: i64,
    /// Completed transactions of either side.
    pub trade_count: usize,
}
