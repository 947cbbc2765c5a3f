use crate::error::AnalyticsError;
use crate::report::ValuationPoint;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use core_types::{OrderSide, PriceObservation, Transaction};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// The last representable instant of `day` in UTC.
pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.succ_opt()
        .map(|next| next.and_time(NaiveTime::MIN).and_utc() - Duration::nanoseconds(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Net share count per instrument from every completed transaction at or before `cutoff`.
///
/// Quantities are floored at zero; instruments with nothing held are omitted.
pub fn holdings_as_of(transactions: &[Transaction], cutoff: DateTime<Utc>) -> BTreeMap<Uuid, i64> {
    let mut holdings: BTreeMap<Uuid, i64> = BTreeMap::new();
    let mut ordered: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.is_completed() && t.timestamp <= cutoff)
        .collect();
    ordered.sort_by_key(|t| t.timestamp);

    for transaction in ordered {
        let held = holdings.entry(transaction.instrument_id).or_insert(0);
        *held = match transaction.side {
            OrderSide::Buy => *held + transaction.quantity,
            OrderSide::Sell => (*held - transaction.quantity).max(0),
        };
    }

    holdings.retain(|_, quantity| *quantity > 0);
    holdings
}

/// Rebuilds an account's end-of-day holdings value from its transaction log and
/// the instruments' price history.
///
/// Days without an observation carry the most recent earlier price forward.
#[derive(Debug, Default)]
pub struct PortfolioValuationReconstructor {}

impl PortfolioValuationReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// One point per calendar day in `[start_date, end_date]`.
    pub fn daily_series(
        &self,
        transactions: &[Transaction],
        observations: &[PriceObservation],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<ValuationPoint>, AnalyticsError> {
        if end_date < start_date {
            return Err(AnalyticsError::InvalidRange {
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        }

        // Observations bucketed by day; a later observation on the same day wins.
        let mut ordered: Vec<&PriceObservation> = observations.iter().collect();
        ordered.sort_by_key(|o| o.timestamp);

        let mut last_known_price: HashMap<Uuid, Decimal> = HashMap::new();
        let mut closes_by_day: BTreeMap<NaiveDate, HashMap<Uuid, Decimal>> = BTreeMap::new();
        for observation in ordered {
            let day = observation.timestamp.date_naive();
            if day < start_date {
                last_known_price.insert(observation.instrument_id, observation.price);
            } else if day <= end_date {
                closes_by_day
                    .entry(day)
                    .or_default()
                    .insert(observation.instrument_id, observation.price);
            }
        }

        let mut series = Vec::new();
        for day in start_date.iter_days().take_while(|d| *d <= end_date) {
            if let Some(closes) = closes_by_day.get(&day) {
                last_known_price.extend(closes.iter().map(|(id, price)| (*id, *price)));
            }

            let holdings = holdings_as_of(transactions, end_of_day(day));
            let mut total_value = Decimal::ZERO;
            for (instrument_id, quantity) in &holdings {
                // Instruments never priced contribute nothing.
                let Some(price) = last_known_price.get(instrument_id) else {
                    continue;
                };
                total_value = price
                    .checked_mul(Decimal::from(*quantity))
                    .and_then(|value| total_value.checked_add(value))
                    .ok_or(AnalyticsError::ValueOverflow { date: day })?;
            }

            series.push(ValuationPoint { date: day, total_value });
        }

        tracing::debug!(
            start = %start_date,
            end = %end_date,
            points = series.len(),
            "Reconstructed daily valuation series."
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    fn buy(instrument: Uuid, quantity: i64, price: Decimal, ts: DateTime<Utc>) -> Transaction {
        Transaction::completed(Uuid::nil(), instrument, OrderSide::Buy, quantity, price, ts).unwrap()
    }

    fn sell(instrument: Uuid, quantity: i64, price: Decimal, ts: DateTime<Utc>) -> Transaction {
        Transaction::completed(Uuid::nil(), instrument, OrderSide::Sell, quantity, price, ts).unwrap()
    }

    #[test]
    fn end_of_day_is_just_before_next_midnight() {
        let eod = end_of_day(date(1));
        assert_eq!(eod.date_naive(), date(1));
        assert_eq!(eod + Duration::nanoseconds(1), at(2, 0));
    }

    #[test]
    fn holdings_floor_at_zero_and_drop_empty_instruments() {
        let (acme, globex) = (Uuid::new_v4(), Uuid::new_v4());
        let history = vec![
            buy(acme, 5, dec!(1), at(1, 9)),
            sell(acme, 8, dec!(1), at(1, 10)),
            buy(globex, 3, dec!(1), at(1, 11)),
        ];

        let holdings = holdings_as_of(&history, end_of_day(date(1)));
        assert_eq!(holdings.get(&acme), None);
        assert_eq!(holdings.get(&globex), Some(&3));
    }

    #[test]
    fn prices_carry_forward_across_missing_days() {
        let acme = Uuid::new_v4();
        let history = vec![buy(acme, 10, dec!(10), at(1, 12))];
        let observations = vec![
            PriceObservation::new(acme, at(1, 16), dec!(10), 100),
            PriceObservation::new(acme, at(3, 16), dec!(12), 100),
        ];

        let series = PortfolioValuationReconstructor::new()
            .daily_series(&history, &observations, date(1), date(3))
            .unwrap();

        let values: Vec<Decimal> = series.iter().map(|p| p.total_value).collect();
        assert_eq!(values, vec![dec!(100), dec!(100), dec!(120)]);
        assert_eq!(series[1].date, date(2));
    }

    #[test]
    fn first_day_uses_the_nearest_prior_observation() {
        let acme = Uuid::new_v4();
        let history = vec![buy(acme, 2, dec!(5), at(1, 12))];
        let observations = vec![
            PriceObservation::new(acme, at(1, 16), dec!(5), 10),
            PriceObservation::new(acme, at(2, 16), dec!(7), 10),
        ];

        let series = PortfolioValuationReconstructor::new()
            .daily_series(&history, &observations, date(4), date(5))
            .unwrap();
        assert_eq!(series[0].total_value, dec!(14));
        assert_eq!(series[1].total_value, dec!(14));
    }

    #[test]
    fn latest_observation_of_a_day_wins() {
        let acme = Uuid::new_v4();
        let history = vec![buy(acme, 1, dec!(5), at(1, 8))];
        let observations = vec![
            PriceObservation::new(acme, at(1, 20), dec!(9), 10),
            PriceObservation::new(acme, at(1, 10), dec!(6), 10),
        ];

        let series = PortfolioValuationReconstructor::new()
            .daily_series(&history, &observations, date(1), date(1))
            .unwrap();
        assert_eq!(series[0].total_value, dec!(9));
    }

    #[test]
    fn account_without_transactions_yields_zero_points() {
        let series = PortfolioValuationReconstructor::new()
            .daily_series(&[], &[], date(1), date(7))
            .unwrap();
        assert_eq!(series.len(), 7);
        assert!(series.iter().all(|p| p.total_value.is_zero()));
    }

    #[test]
    fn unpriced_instrument_contributes_nothing() {
        let (acme, globex) = (Uuid::new_v4(), Uuid::new_v4());
        let history = vec![buy(acme, 1, dec!(3), at(1, 8)), buy(globex, 4, dec!(2), at(1, 8))];
        let observations = vec![PriceObservation::new(acme, at(1, 9), dec!(3), 10)];

        let series = PortfolioValuationReconstructor::new()
            .daily_series(&history, &observations, date(1), date(2))
            .unwrap();
        assert_eq!(series[0].total_value, dec!(3));
        assert_eq!(series[1].total_value, dec!(3));
    }

    #[test]
    fn holdings_change_mid_series() {
        let acme = Uuid::new_v4();
        let history = vec![buy(acme, 10, dec!(10), at(1, 9)), sell(acme, 4, dec!(10), at(2, 23))];
        let observations = vec![PriceObservation::new(acme, at(1, 9), dec!(10), 10)];

        let series = PortfolioValuationReconstructor::new()
            .daily_series(&history, &observations, date(1), date(3))
            .unwrap();
        let values: Vec<Decimal> = series.iter().map(|p| p.total_value).collect();
        assert_eq!(values, vec![dec!(100), dec!(60), dec!(60)]);
    }

    #[test]
    fn oversized_holdings_value_is_an_error() {
        let acme = Uuid::new_v4();
        let history = vec![buy(acme, i64::MAX, dec!(0.01), at(1, 8))];
        let observations = vec![PriceObservation::new(acme, at(2, 8), dec!(10000000000), 10)];

        let result = PortfolioValuationReconstructor::new().daily_series(&history, &observations, date(1), date(2));
        assert!(matches!(result, Err(AnalyticsError::ValueOverflow { date: day }) if day == date(2)));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let result = PortfolioValuationReconstructor::new().daily_series(&[], &[], date(3), date(2));
        assert!(matches!(result, Err(AnalyticsError::InvalidRange { .. })));
    }
}
