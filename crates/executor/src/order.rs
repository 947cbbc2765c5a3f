use crate::error::{HookError, OrderError};
use crate::ledger::PositionLedger;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{OrderSide, Transaction};
use database::Store;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Called once after an order has committed.
///
/// The executor runs the hook on a detached task, so an implementation may be slow
/// or fail; neither affects the order that triggered it.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    async fn order_committed(&self, account_id: Uuid) -> Result<(), HookError>;
}

/// The result of a committed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub transaction_id: Uuid,
    /// The position that remains open after the order. `None` when a sell closed it.
    pub position_id: Option<Uuid>,
    pub side: OrderSide,
    pub quantity: i64,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Validates and atomically applies single buy or sell orders.
pub struct OrderExecutor {
    store: Arc<dyn Store>,
    ledger: PositionLedger,
    hook: Option<Arc<dyn PostCommitHook>>,
}

impl OrderExecutor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            ledger: PositionLedger::new(),
            hook: None,
        }
    }

    /// Registers the hook fired after every committed order.
    pub fn with_hook(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Executes one market order at the instrument's current price.
    ///
    /// Validation happens inside the same unit of work that applies the effect, with the
    /// account row locked, so the balance and position checked are the ones mutated. Any
    /// error drops the unit uncommitted and leaves no trace.
    pub async fn execute_order(
        &self,
        account_id: Uuid,
        instrument_id: Uuid,
        side: OrderSide,
        quantity: i64,
    ) -> Result<OrderReceipt, OrderError> {
        let mut tx = self.store.begin().await?;

        // 1. + 2. Instrument exists and may be traded.
        let instrument = tx
            .get_instrument(instrument_id)
            .await?
            .ok_or(OrderError::InstrumentNotFound(instrument_id))?;
        if !instrument.is_tradable() {
            return Err(OrderError::InstrumentNotTradable {
                symbol: instrument.symbol,
                active: instrument.active,
                frozen: instrument.frozen,
            });
        }

        // 3. Positive whole-share quantity.
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }

        let account = tx.lock_account(account_id).await?.ok_or_else(|| {
            OrderError::Consistency(format!("account {account_id} does not exist"))
        })?;

        // The execution price is the price seen at validation time.
        let price = instrument.current_price;
        let total_amount = price
            .checked_mul(Decimal::from(quantity))
            .ok_or(OrderError::AmountOverflow { price, quantity })?;

        let outcome = match side {
            OrderSide::Buy => {
                // 4. Enough cash.
                if account.balance < total_amount {
                    return Err(OrderError::InsufficientBalance {
                        required: total_amount,
                        available: account.balance,
                    });
                }
                if tx.adjust_balance(account_id, -total_amount).await? == 0 {
                    return Err(OrderError::Consistency(format!(
                        "balance debit of {total_amount} on account {account_id} matched no row"
                    )));
                }
                self.ledger
                    .apply_buy(tx.as_mut(), account_id, instrument_id, quantity, price)
                    .await?
            }
            OrderSide::Sell => {
                // 5. Enough shares.
                let position = tx.lock_position(account_id, instrument_id).await?;
                let available = position.as_ref().map_or(0, |p| p.quantity);
                let Some(position) = position.filter(|p| p.quantity >= quantity) else {
                    return Err(OrderError::InsufficientShares {
                        requested: quantity,
                        available,
                    });
                };
                if tx.adjust_balance(account_id, total_amount).await? == 0 {
                    return Err(OrderError::Consistency(format!(
                        "balance credit of {total_amount} on account {account_id} matched no row"
                    )));
                }
                self.ledger
                    .apply_sell(tx.as_mut(), position.position_id, quantity)
                    .await?
            }
        };

        let transaction = Transaction::completed(account_id, instrument_id, side, quantity, price, Utc::now())
            .map_err(|e| OrderError::Consistency(e.to_string()))?;
        tx.append_transaction(&transaction).await?;
        tx.commit().await?;

        tracing::info!(
            %account_id,
            symbol = %instrument.symbol,
            %side,
            quantity,
            %price,
            %total_amount,
            transaction_id = %transaction.transaction_id,
            "Order committed."
        );

        self.fire_hook(account_id);

        Ok(OrderReceipt {
            transaction_id: transaction.transaction_id,
            position_id: outcome.open_position_id(),
            side,
            quantity,
            price,
            total_amount,
            timestamp: transaction.timestamp,
        })
    }

    /// Runs the post-commit hook on its own task. Errors and panics stay in that task.
    fn fire_hook(&self, account_id: Uuid) {
        let Some(hook) = self.hook.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = hook.order_committed(account_id).await {
                tracing::error!(error = %e, %account_id, "Post-commit hook failed.");
            }
        });
    }
}
