use crate::error::LedgerError;
use chrono::Utc;
use core_types::Position;
use database::StoreTx;
use rust_decimal::Decimal;
use uuid::Uuid;

/// What a ledger operation did to the position row.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOutcome {
    Opened(Position),
    Increased(Position),
    Reduced(Position),
    Closed { position_id: Uuid },
}

impl LedgerOutcome {
    /// The id of the position that still exists after the operation, if any.
    pub fn open_position_id(&self) -> Option<Uuid> {
        match self {
            LedgerOutcome::Opened(p) | LedgerOutcome::Increased(p) | LedgerOutcome::Reduced(p) => {
                Some(p.position_id)
            }
            LedgerOutcome::Closed { .. } => None,
        }
    }
}

/// Quantity-weighted mean of an existing holding and a new lot.
/// `None` when an intermediate product leaves the decimal range.
pub fn weighted_average(old_average: Decimal, old_quantity: i64, price: Decimal, quantity: i64) -> Option<Decimal> {
    let total_quantity = Decimal::from(old_quantity).checked_add(Decimal::from(quantity))?;
    if total_quantity.is_zero() {
        return Some(Decimal::ZERO);
    }
    let held = old_average.checked_mul(Decimal::from(old_quantity))?;
    let added = price.checked_mul(Decimal::from(quantity))?;
    held.checked_add(added)?.checked_div(total_quantity)
}

/// Owns the position invariants for one (account, instrument) pair: quantity stays
/// positive while the row exists and the average cost is the weighted mean of buys.
///
/// Selling never touches the average cost. Realized gains are attributed separately,
/// by FIFO replay in the analytics crate; the two methods disagree on purpose.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger;

impl PositionLedger {
    pub fn new() -> Self {
        Self
    }

    /// Opens a position or merges a new lot into the existing one.
    /// This is the only place the average cost is recomputed.
    pub async fn apply_buy(
        &self,
        tx: &mut dyn StoreTx,
        account_id: Uuid,
        instrument_id: Uuid,
        quantity: i64,
        price: Decimal,
    ) -> Result<LedgerOutcome, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidInput(format!("buy quantity {quantity}")));
        }
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidInput(format!("buy price {price}")));
        }

        let Some(existing) = tx.lock_position(account_id, instrument_id).await? else {
            let position = Position {
                position_id: Uuid::new_v4(),
                account_id,
                instrument_id,
                quantity,
                average_cost: price,
                updated_at: Utc::now(),
            };
            tx.insert_position(&position).await?;
            tracing::debug!(position_id = %position.position_id, quantity, %price, "Opened position.");
            return Ok(LedgerOutcome::Opened(position));
        };

        let new_quantity = existing
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| LedgerError::InvalidInput("position quantity overflow".to_string()))?;
        let new_average = weighted_average(existing.average_cost, existing.quantity, price, quantity)
            .ok_or_else(|| LedgerError::InvalidInput("average cost overflow".to_string()))?;

        let matched = tx
            .update_position(existing.position_id, existing.quantity, new_quantity, new_average)
            .await?;
        if matched == 0 {
            return Err(LedgerError::StaleWrite(existing.position_id));
        }

        tracing::debug!(
            position_id = %existing.position_id,
            old_quantity = existing.quantity,
            new_quantity,
            old_average = %existing.average_cost,
            %new_average,
            "Merged lot into position."
        );

        Ok(LedgerOutcome::Increased(Position {
            quantity: new_quantity,
            average_cost: new_average,
            updated_at: Utc::now(),
            ..existing
        }))
    }

    /// Removes `quantity` shares. Deletes the row when it reaches zero; the average
    /// cost of any remaining shares is left untouched.
    pub async fn apply_sell(
        &self,
        tx: &mut dyn StoreTx,
        position_id: Uuid,
        quantity: i64,
    ) -> Result<LedgerOutcome, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidInput(format!("sell quantity {quantity}")));
        }

        let position = tx
            .lock_position_by_id(position_id)
            .await?
            .ok_or(LedgerError::PositionNotFound(position_id))?;

        // Re-asserted here even though the executor checked it: this is the commit-time guard.
        if position.quantity < quantity {
            return Err(LedgerError::InsufficientQuantity {
                position_id,
                requested: quantity,
                available: position.quantity,
            });
        }

        if position.quantity == quantity {
            let matched = tx.delete_position(position_id, position.quantity).await?;
            if matched == 0 {
                return Err(LedgerError::StaleWrite(position_id));
            }
            tracing::debug!(%position_id, quantity, "Closed position.");
            return Ok(LedgerOutcome::Closed { position_id });
        }

        let remaining = position.quantity - quantity;
        let matched = tx
            .update_position(position_id, position.quantity, remaining, position.average_cost)
            .await?;
        if matched == 0 {
            return Err(LedgerError::StaleWrite(position_id));
        }

        tracing::debug!(%position_id, sold = quantity, remaining, "Reduced position.");
        Ok(LedgerOutcome::Reduced(Position {
            quantity: remaining,
            updated_at: Utc::now(),
            ..position
        }))
    }
}
