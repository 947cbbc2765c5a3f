use crate::DbError;
use crate::store::{Store, StoreTx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    Account, Instrument, OrderSide, Position, PriceObservation, SimulationParams, Transaction,
    TransactionStatus,
};
use rust_decimal::Decimal;
use sqlx::FromRow;
use sqlx::postgres::{PgPool, Postgres};
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "account_id, balance, initial_balance, portfolio_value, created_at";
const INSTRUMENT_COLUMNS: &str = "instrument_id, symbol, current_price, active, frozen, volatility, jump_probability, max_jump_multiplier, price_cap";
const POSITION_COLUMNS: &str = "position_id, account_id, instrument_id, quantity, average_cost, updated_at";
const TRANSACTION_COLUMNS: &str = "transaction_id, account_id, instrument_id, side, quantity, price, total_amount, timestamp, status";
const OBSERVATION_COLUMNS: &str = "observation_id, instrument_id, timestamp, price, volume, was_jump, jump_percent";

/// The `DbRepository` is the PostgreSQL implementation of [`Store`].
/// It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

// Row structs mirror the table layout; conversion into the core types happens below.

#[derive(Debug, Clone, FromRow)]
pub struct DbAccount {
    pub account_id: Uuid,
    pub balance: Decimal,
    pub initial_balance: Decimal,
    pub portfolio_value: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbInstrument {
    pub instrument_id: Uuid,
    pub symbol: String,
    pub current_price: Decimal,
    pub active: bool,
    pub frozen: bool,
    pub volatility: Decimal,
    pub jump_probability: Decimal,
    pub max_jump_multiplier: Decimal,
    pub price_cap: Option<Decimal>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPosition {
    pub position_id: Uuid,
    pub account_id: Uuid,
    pub instrument_id: Uuid,
    pub quantity: i64,
    pub average_cost: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Database-specific transaction struct; `side` and `status` are stored as text.
#[derive(Debug, Clone, FromRow)]
pub struct DbTransaction {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub instrument_id: Uuid,
    pub side: String,
    pub quantity: i64,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPriceObservation {
    pub observation_id: Uuid,
    pub instrument_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub volume: i64,
    pub was_jump: bool,
    pub jump_percent: Option<Decimal>,
}

impl From<DbAccount> for Account {
    fn from(row: DbAccount) -> Self {
        Account {
            account_id: row.account_id,
            balance: row.balance,
            initial_balance: row.initial_balance,
            portfolio_value: row.portfolio_value,
            created_at: row.created_at,
        }
    }
}

impl From<DbInstrument> for Instrument {
    fn from(row: DbInstrument) -> Self {
        Instrument {
            instrument_id: row.instrument_id,
            symbol: row.symbol,
            current_price: row.current_price,
            active: row.active,
            frozen: row.frozen,
            simulation: SimulationParams {
                volatility: row.volatility,
                jump_probability: row.jump_probability,
                max_jump_multiplier: row.max_jump_multiplier,
                price_cap: row.price_cap,
            },
        }
    }
}

impl From<DbPosition> for Position {
    fn from(row: DbPosition) -> Self {
        Position {
            position_id: row.position_id,
            account_id: row.account_id,
            instrument_id: row.instrument_id,
            quantity: row.quantity,
            average_cost: row.average_cost,
            updated_at: row.updated_at,
        }
    }
}

impl TryFrom<DbTransaction> for Transaction {
    type Error = DbError;

    fn try_from(row: DbTransaction) -> Result<Self, Self::Error> {
        Ok(Transaction {
            transaction_id: row.transaction_id,
            account_id: row.account_id,
            instrument_id: row.instrument_id,
            side: row.side.parse::<OrderSide>()?,
            quantity: row.quantity,
            price: row.price,
            total_amount: row.total_amount,
            timestamp: row.timestamp,
            status: row.status.parse::<TransactionStatus>()?,
        })
    }
}

impl From<DbPriceObservation> for PriceObservation {
    fn from(row: DbPriceObservation) -> Self {
        PriceObservation {
            observation_id: row.observation_id,
            instrument_id: row.instrument_id,
            timestamp: row.timestamp,
            price: row.price,
            volume: row.volume,
            was_jump: row.was_jump,
            jump_percent: row.jump_percent,
        }
    }
}

/// Maps a unique-constraint violation to `DbError::Conflict`, everything else passes through.
fn map_insert_error(e: sqlx::Error, what: &str) -> DbError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Conflict(what.to_string())
        }
        _ => e.into(),
    }
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Closes the pool; call once on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Store for DbRepository {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, DbError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn create_account(&self, account: &Account) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO accounts (account_id, balance, initial_balance, portfolio_value, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(account.account_id)
        .bind(account.balance)
        .bind(account.initial_balance)
        .bind(account.portfolio_value)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("account {}", account.account_id)))?;
        Ok(())
    }

    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, DbError> {
        let row = sqlx::query_as::<_, DbAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn update_portfolio_value(&self, account_id: Uuid, value: Decimal) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE accounts SET portfolio_value = $1 WHERE account_id = $2")
            .bind(value)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn create_instrument(&self, instrument: &Instrument) -> Result<(), DbError> {
        sqlx::query(&format!(
            "INSERT INTO instruments ({INSTRUMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(instrument.instrument_id)
        .bind(&instrument.symbol)
        .bind(instrument.current_price)
        .bind(instrument.active)
        .bind(instrument.frozen)
        .bind(instrument.simulation.volatility)
        .bind(instrument.simulation.jump_probability)
        .bind(instrument.simulation.max_jump_multiplier)
        .bind(instrument.simulation.price_cap)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("instrument {}", instrument.symbol)))?;
        Ok(())
    }

    async fn get_instrument(&self, instrument_id: Uuid) -> Result<Option<Instrument>, DbError> {
        let row = sqlx::query_as::<_, DbInstrument>(&format!(
            "SELECT {INSTRUMENT_COLUMNS} FROM instruments WHERE instrument_id = $1"
        ))
        .bind(instrument_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Instrument::from))
    }

    async fn find_instrument_by_symbol(&self, symbol: &str) -> Result<Option<Instrument>, DbError> {
        let row = sqlx::query_as::<_, DbInstrument>(&format!(
            "SELECT {INSTRUMENT_COLUMNS} FROM instruments WHERE symbol = $1"
        ))
        .bind(symbol.to_uppercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Instrument::from))
    }

    async fn get_instruments(&self, instrument_ids: &[Uuid]) -> Result<Vec<Instrument>, DbError> {
        let rows = sqlx::query_as::<_, DbInstrument>(&format!(
            "SELECT {INSTRUMENT_COLUMNS} FROM instruments WHERE instrument_id = ANY($1) ORDER BY symbol ASC"
        ))
        .bind(instrument_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Instrument::from).collect())
    }

    async fn set_instrument_price(&self, instrument_id: Uuid, price: Decimal) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE instruments SET current_price = $1 WHERE instrument_id = $2")
            .bind(price)
            .bind(instrument_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn set_instrument_flags(&self, instrument_id: Uuid, active: bool, frozen: bool) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE instruments SET active = $1, frozen = $2 WHERE instrument_id = $3")
            .bind(active)
            .bind(frozen)
            .bind(instrument_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn get_positions(&self, account_id: Uuid) -> Result<Vec<Position>, DbError> {
        let rows = sqlx::query_as::<_, DbPosition>(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions WHERE account_id = $1"
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Position::from).collect())
    }

    async fn get_transactions(&self, account_id: Uuid) -> Result<Vec<Transaction>, DbError> {
        let rows = sqlx::query_as::<_, DbTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE account_id = $1 ORDER BY timestamp ASC, seq ASC"
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn get_price_observations(
        &self,
        instrument_ids: &[Uuid],
        until: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>, DbError> {
        let rows = sqlx::query_as::<_, DbPriceObservation>(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM price_observations WHERE instrument_id = ANY($1) AND timestamp <= $2 ORDER BY timestamp ASC, seq ASC"
        ))
        .bind(instrument_ids)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PriceObservation::from).collect())
    }

    /// Saves the whole batch within a single transaction for atomicity.
    async fn append_price_history(
        &self,
        instrument_id: Uuid,
        observations: &[PriceObservation],
        latest_price: Option<Decimal>,
    ) -> Result<(), DbError> {
        let mut tx: sqlx::Transaction<'_, Postgres> = self.pool.begin().await?;

        for observation in observations {
            sqlx::query(&format!(
                "INSERT INTO price_observations ({OBSERVATION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
            ))
            .bind(observation.observation_id)
            .bind(instrument_id)
            .bind(observation.timestamp)
            .bind(observation.price)
            .bind(observation.volume)
            .bind(observation.was_jump)
            .bind(observation.jump_percent)
            .execute(&mut *tx) // Note: must use the transaction object `tx` here
            .await?;
        }

        if let Some(price) = latest_price {
            let result = sqlx::query("UPDATE instruments SET current_price = $1 WHERE instrument_id = $2")
                .bind(price)
                .bind(instrument_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::NotFound);
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

/// A live PostgreSQL transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgStoreTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lock_account(&mut self, account_id: Uuid) -> Result<Option<Account>, DbError> {
        let row = sqlx::query_as::<_, DbAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1 FOR UPDATE"
        ))
        .bind(account_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn get_instrument(&mut self, instrument_id: Uuid) -> Result<Option<Instrument>, DbError> {
        let row = sqlx::query_as::<_, DbInstrument>(&format!(
            "SELECT {INSTRUMENT_COLUMNS} FROM instruments WHERE instrument_id = $1 FOR SHARE"
        ))
        .bind(instrument_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Instrument::from))
    }

    async fn lock_position(&mut self, account_id: Uuid, instrument_id: Uuid) -> Result<Option<Position>, DbError> {
        let row = sqlx::query_as::<_, DbPosition>(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions WHERE account_id = $1 AND instrument_id = $2 FOR UPDATE"
        ))
        .bind(account_id)
        .bind(instrument_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Position::from))
    }

    async fn lock_position_by_id(&mut self, position_id: Uuid) -> Result<Option<Position>, DbError> {
        let row = sqlx::query_as::<_, DbPosition>(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions WHERE position_id = $1 FOR UPDATE"
        ))
        .bind(position_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Position::from))
    }

    async fn adjust_balance(&mut self, account_id: Uuid, delta: Decimal) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE accounts SET balance = balance + $1 WHERE account_id = $2 AND balance + $1 >= 0",
        )
        .bind(delta)
        .bind(account_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_position(&mut self, position: &Position) -> Result<(), DbError> {
        sqlx::query(&format!(
            "INSERT INTO positions ({POSITION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(position.position_id)
        .bind(position.account_id)
        .bind(position.instrument_id)
        .bind(position.quantity)
        .bind(position.average_cost)
        .bind(position.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, &format!("position {}", position.position_id)))?;
        Ok(())
    }

    async fn update_position(
        &mut self,
        position_id: Uuid,
        expected_quantity: i64,
        quantity: i64,
        average_cost: Decimal,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE positions SET quantity = $1, average_cost = $2, updated_at = NOW() WHERE position_id = $3 AND quantity = $4",
        )
        .bind(quantity)
        .bind(average_cost)
        .bind(position_id)
        .bind(expected_quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_position(&mut self, position_id: Uuid, expected_quantity: i64) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM positions WHERE position_id = $1 AND quantity = $2")
            .bind(position_id)
            .bind(expected_quantity)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn append_transaction(&mut self, transaction: &Transaction) -> Result<(), DbError> {
        sqlx::query(&format!(
            "INSERT INTO transactions ({TRANSACTION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(transaction.transaction_id)
        .bind(transaction.account_id)
        .bind(transaction.instrument_id)
        .bind(transaction.side.as_str())
        .bind(transaction.quantity)
        .bind(transaction.price)
        .bind(transaction.total_amount)
        .bind(transaction.timestamp)
        .bind(transaction.status.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }
}
