use crate::enums::{OrderSide, TransactionStatus};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The lowest price any instrument may trade or be simulated at.
pub const MIN_PRICE: Decimal = dec!(0.01);

/// A simulated brokerage account holding cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: Uuid,
    pub balance: Decimal,
    /// The balance the account was opened with. Never changes afterwards.
    pub initial_balance: Decimal,
    /// Denormalized cache of the market value of all open positions.
    pub portfolio_value: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            balance: initial_balance,
            initial_balance,
            portfolio_value: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }
}

/// Parameters driving the synthetic daily price path of an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Daily volatility sigma, strictly between 0 and 1.
    pub volatility: Decimal,
    /// Probability of a jump day, strictly between 0 and 1.
    pub jump_probability: Decimal,
    /// Largest jump multiplier, in (1, 2]. A value of 1.3 allows moves of up to 30%.
    pub max_jump_multiplier: Decimal,
    pub price_cap: Option<Decimal>,
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.volatility <= Decimal::ZERO || self.volatility >= Decimal::ONE {
            return Err(CoreError::InvalidSimulationParams(format!(
                "volatility must be in (0, 1), got {}",
                self.volatility
            )));
        }
        if self.jump_probability <= Decimal::ZERO || self.jump_probability >= Decimal::ONE {
            return Err(CoreError::InvalidSimulationParams(format!(
                "jump_probability must be in (0, 1), got {}",
                self.jump_probability
            )));
        }
        if self.max_jump_multiplier <= Decimal::ONE || self.max_jump_multiplier > dec!(2) {
            return Err(CoreError::InvalidSimulationParams(format!(
                "max_jump_multiplier must be in (1, 2], got {}",
                self.max_jump_multiplier
            )));
        }
        if let Some(cap) = self.price_cap {
            if cap < MIN_PRICE {
                return Err(CoreError::InvalidSimulationParams(format!(
                    "price_cap must be at least {}, got {}",
                    MIN_PRICE, cap
                )));
            }
        }
        Ok(())
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            volatility: dec!(0.02),
            jump_probability: dec!(0.05),
            max_jump_multiplier: dec!(1.3),
            price_cap: None,
        }
    }
}

/// A tradable instrument together with its simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_id: Uuid,
    pub symbol: String,
    pub current_price: Decimal,
    pub active: bool,
    pub frozen: bool,
    pub simulation: SimulationParams,
}

impl Instrument {
    pub fn new(symbol: &str, current_price: Decimal, simulation: SimulationParams) -> Result<Self, CoreError> {
        if current_price < MIN_PRICE {
            return Err(CoreError::InvalidInput(
                "current_price".to_string(),
                current_price.to_string(),
            ));
        }
        simulation.validate()?;
        Ok(Self {
            instrument_id: Uuid::new_v4(),
            symbol: symbol.to_uppercase(),
            current_price,
            active: true,
            frozen: false,
            simulation,
        })
    }

    /// Both flags must allow trading for an order to go through.
    pub fn is_tradable(&self) -> bool {
        self.active && !self.frozen
    }
}

/// An open holding of one instrument by one account. Rows with zero quantity do not exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: Uuid,
    pub account_id: Uuid,
    pub instrument_id: Uuid,
    pub quantity: i64,
    /// Quantity-weighted mean of the acquisition prices.
    pub average_cost: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Quantity times average cost, `None` outside the decimal range.
    pub fn cost_basis(&self) -> Option<Decimal> {
        self.average_cost.checked_mul(Decimal::from(self.quantity))
    }
}

/// An immutable record of one executed (or failed) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub instrument_id: Uuid,
    pub side: OrderSide,
    pub quantity: i64,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
}

impl Transaction {
    /// Builds a completed transaction record, deriving the total from price and quantity.
    pub fn completed(
        account_id: Uuid,
        instrument_id: Uuid,
        side: OrderSide,
        quantity: i64,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let total_amount = price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| CoreError::AmountOverflow(format!("{quantity} x {price}")))?;
        Ok(Self {
            transaction_id: Uuid::new_v4(),
            account_id,
            instrument_id,
            side,
            quantity,
            price,
            total_amount,
            timestamp,
            status: TransactionStatus::Completed,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Signed effect on the account's cash: negative for buys, positive for sells.
    pub fn cash_delta(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => -self.total_amount,
            OrderSide::Sell => self.total_amount,
        }
    }
}

/// One simulated (or manually seeded) daily close for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub observation_id: Uuid,
    pub instrument_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub volume: i64,
    pub was_jump: bool,
    /// Signed jump size in percent, present only on jump days.
    pub jump_percent: Option<Decimal>,
}

impl PriceObservation {
    pub fn new(instrument_id: Uuid, timestamp: DateTime<Utc>, price: Decimal, volume: i64) -> Self {
        Self {
            observation_id: Uuid::new_v4(),
            instrument_id,
            timestamp,
            price,
            volume,
            was_jump: false,
            jump_percent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_total_and_cash_delta_follow_side() {
        let buy = Transaction::completed(Uuid::new_v4(), Uuid::new_v4(), OrderSide::Buy, 4, dec!(12.50), Utc::now()).unwrap();
        assert_eq!(buy.total_amount, dec!(50.00));
        assert_eq!(buy.cash_delta(), dec!(-50.00));

        let sell = Transaction { side: OrderSide::Sell, ..buy };
        assert_eq!(sell.cash_delta(), dec!(50.00));
    }

    #[test]
    fn transaction_total_overflow_is_an_error() {
        let result = Transaction::completed(
            Uuid::new_v4(),
            Uuid::new_v4(),
            OrderSide::Buy,
            i64::MAX,
            dec!(10000000000),
            Utc::now(),
        );
        assert!(matches!(result, Err(CoreError::AmountOverflow(_))));
    }

    #[test]
    fn simulation_params_reject_out_of_range_values() {
        let mut params = SimulationParams::default();
        assert!(params.validate().is_ok());

        params.max_jump_multiplier = dec!(2.5);
        assert!(params.validate().is_err());

        params = SimulationParams { volatility: Decimal::ONE, ..SimulationParams::default() };
        assert!(params.validate().is_err());

        params = SimulationParams { price_cap: Some(dec!(0.001)), ..SimulationParams::default() };
        assert!(params.validate().is_err());
    }

    #[test]
    fn instrument_tradability_requires_active_and_not_frozen() {
        let mut instrument = Instrument::new("acme", dec!(10), SimulationParams::default()).unwrap();
        assert_eq!(instrument.symbol, "ACME");
        assert!(instrument.is_tradable());

        instrument.frozen = true;
        assert!(!instrument.is_tradable());

        instrument.frozen = false;
        instrument.active = false;
        assert!(!instrument.is_tradable());
    }
}
