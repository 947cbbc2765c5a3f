use crate::error::PortfolioError;
use crate::snapshot::{AccountMetrics, HoldingSnapshot};
use analytics::{end_of_day, PortfolioValuationReconstructor, RealizedPnlReconstructor, RealizedPnlReport, ValuationPoint};
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{Account, Instrument, Transaction};
use database::Store;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Store-backed entry points for the reconstructors and account read models.
pub struct PortfolioService {
    store: Arc<dyn Store>,
    realized: RealizedPnlReconstructor,
    valuation: PortfolioValuationReconstructor,
}

impl PortfolioService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            realized: RealizedPnlReconstructor::new(),
            valuation: PortfolioValuationReconstructor::new(),
        }
    }

    async fn account(&self, account_id: Uuid) -> Result<Account, PortfolioError> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or(PortfolioError::AccountNotFound(account_id))
    }

    async fn history(&self, account_id: Uuid) -> Result<Vec<Transaction>, PortfolioError> {
        self.account(account_id).await?;
        Ok(self.store.get_transactions(account_id).await?)
    }

    /// Realized P&L of the account's sells within `[window_start, window_end]`.
    pub async fn realized_pnl(
        &self,
        account_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<RealizedPnlReport, PortfolioError> {
        let transactions = self.history(account_id).await?;
        let report = self.realized.reconstruct(&transactions, window_start, window_end)?;

        let anomalies = report.trades.iter().filter(|t| t.is_anomalous()).count();
        if anomalies > 0 {
            tracing::warn!(%account_id, anomalies, "Realized P&L replay found sells without matching lots.");
        }
        Ok(report)
    }

    /// End-of-day holdings value for every day in `[start_date, end_date]`.
    pub async fn daily_series(
        &self,
        account_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<ValuationPoint>, PortfolioError> {
        let transactions = self.history(account_id).await?;
        let instrument_ids: Vec<Uuid> = transactions
            .iter()
            .map(|t| t.instrument_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let observations = if instrument_ids.is_empty() {
            Vec::new()
        } else {
            self.store
                .get_price_observations(&instrument_ids, end_of_day(end_date))
                .await?
        };

        Ok(self
            .valuation
            .daily_series(&transactions, &observations, start_date, end_date)?)
    }

    /// Open positions marked to current instrument prices.
    pub async fn holdings(&self, account_id: Uuid) -> Result<Vec<HoldingSnapshot>, PortfolioError> {
        self.account(account_id).await?;
        let positions = self.store.get_positions(account_id).await?;
        if positions.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = positions.iter().map(|p| p.instrument_id).collect();
        let instruments: HashMap<Uuid, Instrument> = self
            .store
            .get_instruments(&ids)
            .await?
            .into_iter()
            .map(|i| (i.instrument_id, i))
            .collect();

        positions
            .iter()
            .map(|position| {
                let instrument = instruments
                    .get(&position.instrument_id)
                    .ok_or(PortfolioError::MissingInstrument {
                        position_id: position.position_id,
                        instrument_id: position.instrument_id,
                    })?;
                HoldingSnapshot::mark(position, instrument).ok_or(PortfolioError::ValueOverflow(account_id))
            })
            .collect()
    }

    /// Recomputes the cached `portfolio_value` from current positions and prices and stores it.
    pub async fn refresh_portfolio_value(&self, account_id: Uuid) -> Result<Decimal, PortfolioError> {
        let value = self
            .holdings(account_id)
            .await?
            .iter()
            .try_fold(Decimal::ZERO, |total, h| total.checked_add(h.market_value))
            .ok_or(PortfolioError::ValueOverflow(account_id))?;
        self.store.update_portfolio_value(account_id, value).await?;
        tracing::info!(%account_id, %value, "Refreshed portfolio value.");
        Ok(value)
    }

    pub async fn account_metrics(&self, account_id: Uuid) -> Result<AccountMetrics, PortfolioError> {
        let transactions = self.history(account_id).await?;
        let positions = self.store.get_positions(account_id).await?;

        Ok(AccountMetrics {
            total_realized_profit: self.realized.reconstruct_all(&transactions).total_realized_pnl,
            shares_held: positions.iter().map(|p| p.quantity).sum(),
            trade_count: transactions.iter().filter(|t| t.is_completed()).count(),
        })
    }
}
