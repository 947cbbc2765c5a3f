use crate::DbError;
use crate::store::{Store, StoreTx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Account, Instrument, Position, PriceObservation, Transaction};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    instruments: HashMap<Uuid, Instrument>,
    positions: HashMap<Uuid, Position>,
    transactions: Vec<Transaction>,
    observations: Vec<PriceObservation>,
}

/// An in-process [`Store`] for tests and demos.
///
/// Every unit of work holds the single state mutex from `begin` until commit or drop,
/// so units are fully serialized. Writes go to a staged copy that replaces the shared
/// state only on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transaction with whatever timestamp it carries, bypassing order
    /// validation. Used to replay historical fixtures.
    pub async fn seed_transaction(&self, transaction: Transaction) {
        self.state.lock().await.transactions.push(transaction);
    }

    /// Inserts or replaces a position directly.
    pub async fn seed_position(&self, position: Position) {
        self.state.lock().await.positions.insert(position.position_id, position);
    }

    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }
}

fn sorted_by_time<T: Clone>(items: impl Iterator<Item = T>, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    // Stable sort keeps insertion order for equal timestamps.
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, DbError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryStoreTx { guard, staged }))
    }

    async fn create_account(&self, account: &Account) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&account.account_id) {
            return Err(DbError::Conflict(format!("account {}", account.account_id)));
        }
        state.accounts.insert(account.account_id, account.clone());
        Ok(())
    }

    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, DbError> {
        Ok(self.state.lock().await.accounts.get(&account_id).cloned())
    }

    async fn update_portfolio_value(&self, account_id: Uuid, value: Decimal) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let account = state.accounts.get_mut(&account_id).ok_or(DbError::NotFound)?;
        account.portfolio_value = value;
        Ok(())
    }

    async fn create_instrument(&self, instrument: &Instrument) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let duplicate = state.instruments.values().any(|i| {
            i.instrument_id == instrument.instrument_id || i.symbol == instrument.symbol
        });
        if duplicate {
            return Err(DbError::Conflict(format!("instrument {}", instrument.symbol)));
        }
        state.instruments.insert(instrument.instrument_id, instrument.clone());
        Ok(())
    }

    async fn get_instrument(&self, instrument_id: Uuid) -> Result<Option<Instrument>, DbError> {
        Ok(self.state.lock().await.instruments.get(&instrument_id).cloned())
    }

    async fn find_instrument_by_symbol(&self, symbol: &str) -> Result<Option<Instrument>, DbError> {
        let symbol = symbol.to_uppercase();
        Ok(self
            .state
            .lock()
            .await
            .instruments
            .values()
            .find(|i| i.symbol == symbol)
            .cloned())
    }

    async fn get_instruments(&self, instrument_ids: &[Uuid]) -> Result<Vec<Instrument>, DbError> {
        let state = self.state.lock().await;
        let mut instruments: Vec<Instrument> = instrument_ids
            .iter()
            .filter_map(|id| state.instruments.get(id).cloned())
            .collect();
        instruments.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(instruments)
    }

    async fn set_instrument_price(&self, instrument_id: Uuid, price: Decimal) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let instrument = state.instruments.get_mut(&instrument_id).ok_or(DbError::NotFound)?;
        instrument.current_price = price;
        Ok(())
    }

    async fn set_instrument_flags(&self, instrument_id: Uuid, active: bool, frozen: bool) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let instrument = state.instruments.get_mut(&instrument_id).ok_or(DbError::NotFound)?;
        instrument.active = active;
        instrument.frozen = frozen;
        Ok(())
    }

    async fn get_positions(&self, account_id: Uuid) -> Result<Vec<Position>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .positions
            .values()
            .filter(|p| p.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_transactions(&self, account_id: Uuid) -> Result<Vec<Transaction>, DbError> {
        let state = self.state.lock().await;
        Ok(sorted_by_time(
            state.transactions.iter().filter(|t| t.account_id == account_id).cloned(),
            |t| t.timestamp,
        ))
    }

    async fn get_price_observations(
        &self,
        instrument_ids: &[Uuid],
        until: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>, DbError> {
        let state = self.state.lock().await;
        Ok(sorted_by_time(
            state
                .observations
                .iter()
                .filter(|o| instrument_ids.contains(&o.instrument_id) && o.timestamp <= until)
                .cloned(),
            |o| o.timestamp,
        ))
    }

    async fn append_price_history(
        &self,
        instrument_id: Uuid,
        observations: &[PriceObservation],
        latest_price: Option<Decimal>,
    ) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        if !state.instruments.contains_key(&instrument_id) {
            return Err(DbError::NotFound);
        }
        state.observations.extend(observations.iter().map(|o| PriceObservation {
            instrument_id,
            ..o.clone()
        }));
        if let Some(price) = latest_price {
            if let Some(instrument) = state.instruments.get_mut(&instrument_id) {
                instrument.current_price = price;
            }
        }
        Ok(())
    }
}

/// A unit of work against [`MemoryStore`].
pub struct MemoryStoreTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryStoreTx {
    async fn lock_account(&mut self, account_id: Uuid) -> Result<Option<Account>, DbError> {
        Ok(self.staged.accounts.get(&account_id).cloned())
    }

    async fn get_instrument(&mut self, instrument_id: Uuid) -> Result<Option<Instrument>, DbError> {
        Ok(self.staged.instruments.get(&instrument_id).cloned())
    }

    async fn lock_position(&mut self, account_id: Uuid, instrument_id: Uuid) -> Result<Option<Position>, DbError> {
        Ok(self
            .staged
            .positions
            .values()
            .find(|p| p.account_id == account_id && p.instrument_id == instrument_id)
            .cloned())
    }

    async fn lock_position_by_id(&mut self, position_id: Uuid) -> Result<Option<Position>, DbError> {
        Ok(self.staged.positions.get(&position_id).cloned())
    }

    async fn adjust_balance(&mut self, account_id: Uuid, delta: Decimal) -> Result<u64, DbError> {
        let Some(account) = self.staged.accounts.get_mut(&account_id) else {
            return Ok(0);
        };
        match account.balance.checked_add(delta) {
            Some(balance) if balance >= Decimal::ZERO => {
                account.balance = balance;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn insert_position(&mut self, position: &Position) -> Result<(), DbError> {
        let clash = self.staged.positions.values().any(|p| {
            p.position_id == position.position_id
                || (p.account_id == position.account_id && p.instrument_id == position.instrument_id)
        });
        if clash {
            return Err(DbError::Conflict(format!("position {}", position.position_id)));
        }
        self.staged.positions.insert(position.position_id, position.clone());
        Ok(())
    }

    async fn update_position(
        &mut self,
        position_id: Uuid,
        expected_quantity: i64,
        quantity: i64,
        average_cost: Decimal,
    ) -> Result<u64, DbError> {
        match self.staged.positions.get_mut(&position_id) {
            Some(position) if position.quantity == expected_quantity => {
                position.quantity = quantity;
                position.average_cost = average_cost;
                position.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete_position(&mut self, position_id: Uuid, expected_quantity: i64) -> Result<u64, DbError> {
        let matches = self
            .staged
            .positions
            .get(&position_id)
            .is_some_and(|p| p.quantity == expected_quantity);
        if !matches {
            return Ok(0);
        }
        self.staged.positions.remove(&position_id);
        Ok(1)
    }

    async fn append_transaction(&mut self, transaction: &Transaction) -> Result<(), DbError> {
        self.staged.transactions.push(transaction.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        let MemoryStoreTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
