use crate::error::AnalyticsError;
use crate::report::{RealizedPnlReport, RealizedTrade};
use chrono::{DateTime, Utc};
use core_types::{OrderSide, Transaction};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// An open FIFO lot: shares still unsold from one buy.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Lot {
    remaining: i64,
    price: Decimal,
}

/// A stateless calculator that attributes realized gains to sells by FIFO replay.
///
/// The whole history is replayed on every call: sells before the window still
/// consume lots so that in-window sells are matched against the right buys.
#[derive(Debug, Default)]
pub struct RealizedPnlReconstructor {}

impl RealizedPnlReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Realized P&L of every sell with `window_start <= timestamp <= window_end`.
    pub fn reconstruct(
        &self,
        transactions: &[Transaction],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<RealizedPnlReport, AnalyticsError> {
        if window_start > window_end {
            return Err(AnalyticsError::InvalidRange {
                start: window_start.to_rfc3339(),
                end: window_end.to_rfc3339(),
            });
        }

        let mut ordered: Vec<&Transaction> = transactions.iter().filter(|t| t.is_completed()).collect();
        ordered.sort_by_key(|t| t.timestamp);

        let mut queues: HashMap<Uuid, VecDeque<Lot>> = HashMap::new();
        let mut report = RealizedPnlReport::new();

        for transaction in ordered {
            let queue = queues.entry(transaction.instrument_id).or_default();
            match transaction.side {
                OrderSide::Buy => queue.push_back(Lot {
                    remaining: transaction.quantity,
                    price: transaction.price,
                }),
                OrderSide::Sell => {
                    let in_window = transaction.timestamp >= window_start && transaction.timestamp <= window_end;
                    let trade = consume_lots(queue, transaction);
                    if in_window {
                        record(&mut report, trade);
                    }
                }
            }
        }

        let closed = report.profitable_count + report.unprofitable_count;
        if closed > 0 {
            report.win_rate_pct =
                Decimal::from(report.profitable_count) / Decimal::from(closed) * Decimal::ONE_HUNDRED;
        }

        Ok(report)
    }

    /// Realized P&L over the account's entire history.
    pub fn reconstruct_all(&self, transactions: &[Transaction]) -> RealizedPnlReport {
        // An unbounded window can never be inverted.
        self.reconstruct(transactions, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
            .unwrap_or_default()
    }
}

/// Matches one sell against the front of the lot queue.
fn consume_lots(queue: &mut VecDeque<Lot>, sell: &Transaction) -> RealizedTrade {
    let mut outstanding = sell.quantity;
    let mut cost_consumed = Decimal::ZERO;

    while outstanding > 0 {
        let Some(lot) = queue.front_mut() else {
            tracing::warn!(
                transaction_id = %sell.transaction_id,
                instrument_id = %sell.instrument_id,
                unmatched = outstanding,
                "Sell has no open lot to match against; history is inconsistent."
            );
            break;
        };

        let take = outstanding.min(lot.remaining);
        cost_consumed += lot.price * Decimal::from(take);
        lot.remaining -= take;
        outstanding -= take;

        if lot.remaining == 0 {
            queue.pop_front();
        }
    }

    let matched = sell.quantity - outstanding;
    let (cost_basis, realized_pnl) = if matched > 0 {
        let matched_dec = Decimal::from(matched);
        // Same as (sell_price - cost_consumed / matched) * matched, without the rounding.
        (cost_consumed / matched_dec, sell.price * matched_dec - cost_consumed)
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    RealizedTrade {
        transaction_id: sell.transaction_id,
        instrument_id: sell.instrument_id,
        timestamp: sell.timestamp,
        quantity: sell.quantity,
        sell_price: sell.price,
        matched_quantity: matched,
        unmatched_quantity: outstanding,
        cost_basis,
        realized_pnl,
    }
}

fn record(report: &mut RealizedPnlReport, trade: RealizedTrade) {
    // A sell with nothing matched is flagged but not attributed.
    if trade.matched_quantity > 0 {
        report.total_realized_pnl += trade.realized_pnl;
        if trade.realized_pnl > Decimal::ZERO {
            report.profitable_count += 1;
        } else if trade.realized_pnl < Decimal::ZERO {
            report.unprofitable_count += 1;
        }
    }
    report.trades.push(trade);
}
