use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Account, Instrument, Position, PriceObservation, Transaction};
use rust_decimal::Decimal;
use uuid::Uuid;

/// The persistence contract the trading core is written against.
///
/// Implementations must give `begin` transactions serializable-equivalent isolation
/// for the rows they lock: two concurrent orders against the same account may not
/// both observe the same balance or position and commit on top of it.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens an atomic unit of work. Dropping the returned handle without calling
    /// `commit` discards every write made through it.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, DbError>;

    async fn create_account(&self, account: &Account) -> Result<(), DbError>;
    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, DbError>;
    async fn update_portfolio_value(&self, account_id: Uuid, value: Decimal) -> Result<(), DbError>;

    async fn create_instrument(&self, instrument: &Instrument) -> Result<(), DbError>;
    async fn get_instrument(&self, instrument_id: Uuid) -> Result<Option<Instrument>, DbError>;
    async fn find_instrument_by_symbol(&self, symbol: &str) -> Result<Option<Instrument>, DbError>;
    async fn get_instruments(&self, instrument_ids: &[Uuid]) -> Result<Vec<Instrument>, DbError>;
    /// Manual price override.
    async fn set_instrument_price(&self, instrument_id: Uuid, price: Decimal) -> Result<(), DbError>;
    async fn set_instrument_flags(&self, instrument_id: Uuid, active: bool, frozen: bool) -> Result<(), DbError>;

    async fn get_positions(&self, account_id: Uuid) -> Result<Vec<Position>, DbError>;

    /// Every transaction of the account, oldest first.
    async fn get_transactions(&self, account_id: Uuid) -> Result<Vec<Transaction>, DbError>;

    /// Observations for the given instruments up to and including `until`, oldest first.
    async fn get_price_observations(
        &self,
        instrument_ids: &[Uuid],
        until: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>, DbError>;

    /// Appends a batch of observations as one unit and, when `latest_price` is given,
    /// moves the instrument's current price in the same unit.
    async fn append_price_history(
        &self,
        instrument_id: Uuid,
        observations: &[PriceObservation],
        latest_price: Option<Decimal>,
    ) -> Result<(), DbError>;
}

/// Operations available inside one atomic unit of work.
///
/// Methods returning `u64` report the number of rows the guarded write matched;
/// zero means the guard rejected it and the caller must abandon the unit.
#[async_trait]
pub trait StoreTx: Send {
    /// Reads the account and holds an exclusive lock on it until commit or drop.
    async fn lock_account(&mut self, account_id: Uuid) -> Result<Option<Account>, DbError>;
    /// Reads the instrument and blocks concurrent writes to it (price, flags) until commit or drop.
    async fn get_instrument(&mut self, instrument_id: Uuid) -> Result<Option<Instrument>, DbError>;
    async fn lock_position(&mut self, account_id: Uuid, instrument_id: Uuid) -> Result<Option<Position>, DbError>;
    async fn lock_position_by_id(&mut self, position_id: Uuid) -> Result<Option<Position>, DbError>;

    /// Adds `delta` to the balance, refusing to leave it negative.
    async fn adjust_balance(&mut self, account_id: Uuid, delta: Decimal) -> Result<u64, DbError>;

    async fn insert_position(&mut self, position: &Position) -> Result<(), DbError>;
    /// Compare-and-swap on quantity: only applies if the row still holds `expected_quantity`.
    async fn update_position(
        &mut self,
        position_id: Uuid,
        expected_quantity: i64,
        quantity: i64,
        average_cost: Decimal,
    ) -> Result<u64, DbError>;
    async fn delete_position(&mut self, position_id: Uuid, expected_quantity: i64) -> Result<u64, DbError>;

    async fn append_transaction(&mut self, transaction: &Transaction) -> Result<(), DbError>;

    async fn commit(self: Box<Self>) -> Result<(), DbError>;
}
