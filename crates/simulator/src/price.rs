use crate::error::SimulatorError;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use core_types::{Instrument, MIN_PRICE, PriceObservation};
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::f64::consts::TAU;
use std::ops::Range;
use uuid::Uuid;

/// Base daily volume before the move-size component is added.
const BASE_VOLUME: Range<i64> = 100_000..1_000_000;
/// Extra shares traded per unit of absolute return.
const VOLUME_PER_UNIT_RETURN: f64 = 10_000_000.0;

/// One generated daily close.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedDay {
    pub date: NaiveDate,
    pub price: Decimal,
    pub volume: i64,
    pub was_jump: bool,
    /// Signed jump size in percent, present only on jump days.
    pub jump_percent: Option<Decimal>,
}

impl SimulatedDay {
    /// Simulated closes are stamped at 16:00 UTC of their day.
    pub fn close_timestamp(&self) -> DateTime<Utc> {
        let close = NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN);
        self.date.and_time(close).and_utc()
    }

    pub fn to_observation(&self, instrument_id: Uuid) -> PriceObservation {
        PriceObservation {
            was_jump: self.was_jump,
            jump_percent: self.jump_percent,
            ..PriceObservation::new(instrument_id, self.close_timestamp(), self.price, self.volume)
        }
    }
}

/// Generates synthetic daily price paths: a Gaussian random walk with occasional jumps.
///
/// The simulator holds no randomness of its own. Every call takes the RNG to draw from,
/// so a seeded `StdRng` reproduces the same path.
#[derive(Debug, Default)]
pub struct PriceSimulator {}

impl PriceSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `num_days` days ending today (UTC), oldest first.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        instrument: &Instrument,
        num_days: u32,
        rng: &mut R,
    ) -> Result<Vec<SimulatedDay>, SimulatorError> {
        self.generate_until(instrument, num_days, Utc::now().date_naive(), rng)
    }

    /// The `num_days` days ending on `last_day`, oldest first.
    pub fn generate_until<R: Rng + ?Sized>(
        &self,
        instrument: &Instrument,
        num_days: u32,
        last_day: NaiveDate,
        rng: &mut R,
    ) -> Result<Vec<SimulatedDay>, SimulatorError> {
        let params = &instrument.simulation;
        params.validate()?;
        if num_days == 0 {
            return Ok(Vec::new());
        }

        let sigma = to_f64(params.volatility)?;
        let jump_probability = to_f64(params.jump_probability)?;
        let max_jump = to_f64(params.max_jump_multiplier)? - 1.0;
        // Prices are whole cents, so the cap is taken down to the cent below it.
        let cap = params
            .price_cap
            .map(|cap| cap.round_dp_with_strategy(2, RoundingStrategy::ToZero));
        let clamp = |price: Decimal| {
            let floored = price.round_dp(2).max(MIN_PRICE);
            cap.map_or(floored, |cap| floored.min(cap))
        };

        // Walk back far enough that the path starts somewhere plausible.
        let drift = sigma * f64::from(num_days).sqrt() * standard_normal(rng);
        let mut price = clamp(from_f64(to_f64(instrument.current_price)? * (1.0 + drift))?);

        let first_day = last_day
            .checked_sub_days(Days::new(u64::from(num_days - 1)))
            .ok_or_else(|| SimulatorError::Conversion(format!("{num_days} days before {last_day}")))?;

        let mut days = Vec::with_capacity(num_days as usize);
        for date in first_day.iter_days().take(num_days as usize) {
            let was_jump = rng.random::<f64>() < jump_probability;
            let daily_return = if was_jump {
                let magnitude = rng.random_range(0.0..=max_jump);
                if rng.random_bool(0.5) { magnitude } else { -magnitude }
            } else {
                sigma * standard_normal(rng)
            };

            let next = from_f64(to_f64(price)? * (1.0 + daily_return))?;
            price = clamp(next);

            let volume = rng.random_range(BASE_VOLUME) + (daily_return.abs() * VOLUME_PER_UNIT_RETURN) as i64;
            let jump_percent = if was_jump {
                Some(from_f64(daily_return * 100.0)?.round_dp(2))
            } else {
                None
            };

            days.push(SimulatedDay {
                date,
                price,
                volume,
                was_jump,
                jump_percent,
            });
        }

        tracing::debug!(
            symbol = %instrument.symbol,
            days = days.len(),
            jumps = days.iter().filter(|d| d.was_jump).count(),
            "Generated simulated price path."
        );
        Ok(days)
    }
}

/// A standard normal draw by the Box–Muller transform.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // u1 in (0, 1] keeps the logarithm finite.
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

fn to_f64(value: Decimal) -> Result<f64, SimulatorError> {
    value
        .to_f64()
        .ok_or_else(|| SimulatorError::Conversion(format!("{value} does not fit in f64")))
}

fn from_f64(value: f64) -> Result<Decimal, SimulatorError> {
    Decimal::from_f64(value).ok_or_else(|| SimulatorError::Conversion(format!("{value} is not a finite decimal")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::SimulationParams;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal_macros::dec;

    fn instrument(price: Decimal, params: SimulationParams) -> Instrument {
        Instrument::new("ACME", price, params).unwrap()
    }

    fn last_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
    }

    #[test]
    fn returns_exactly_the_requested_days_in_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let days = PriceSimulator::new()
            .generate_until(&instrument(dec!(100), SimulationParams::default()), 30, last_day(), &mut rng)
            .unwrap();

        assert_eq!(days.len(), 30);
        assert_eq!(days.last().unwrap().date, last_day());
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
        assert!(days.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn zero_days_is_empty() {
        let mut rng = StdRng::seed_from_u64(7);
        let days = PriceSimulator::new()
            .generate(&instrument(dec!(100), SimulationParams::default()), 0, &mut rng)
            .unwrap();
        assert!(days.is_empty());
    }

    #[test]
    fn prices_respect_floor_cap_and_cents() {
        let params = SimulationParams {
            volatility: dec!(0.5),
            jump_probability: dec!(0.3),
            max_jump_multiplier: dec!(2),
            price_cap: Some(dec!(1.50)),
        };
        let mut rng = StdRng::seed_from_u64(99);
        let days = PriceSimulator::new()
            .generate_until(&instrument(dec!(1), params), 500, last_day(), &mut rng)
            .unwrap();

        for day in &days {
            assert!(day.price >= MIN_PRICE, "{} fell below the floor", day.price);
            assert!(day.price <= dec!(1.50), "{} broke the cap", day.price);
            assert_eq!(day.price, day.price.round_dp(2));
            assert!(day.volume >= BASE_VOLUME.start);
        }
    }

    #[test]
    fn cap_with_sub_cent_precision_is_never_exceeded() {
        let params = SimulationParams {
            price_cap: Some(dec!(1.515)),
            ..SimulationParams::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let days = PriceSimulator::new()
            .generate_until(&instrument(dec!(10), params), 100, last_day(), &mut rng)
            .unwrap();

        for day in &days {
            assert!(day.price <= dec!(1.515), "{} broke the cap", day.price);
            assert_eq!(day.price, day.price.round_dp(2));
        }
    }

    #[test]
    fn same_seed_same_path() {
        let acme = instrument(dec!(42), SimulationParams::default());
        let simulator = PriceSimulator::new();

        let first = simulator
            .generate_until(&acme, 60, last_day(), &mut StdRng::seed_from_u64(1234))
            .unwrap();
        let second = simulator
            .generate_until(&acme, 60, last_day(), &mut StdRng::seed_from_u64(1234))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn jumps_stay_within_the_multiplier() {
        let params = SimulationParams {
            jump_probability: dec!(0.99),
            max_jump_multiplier: dec!(1.3),
            ..SimulationParams::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let days = PriceSimulator::new()
            .generate_until(&instrument(dec!(100), params), 200, last_day(), &mut rng)
            .unwrap();

        let jumps: Vec<&SimulatedDay> = days.iter().filter(|d| d.was_jump).collect();
        assert!(!jumps.is_empty());
        for day in jumps {
            let percent = day.jump_percent.unwrap();
            assert!(percent.abs() <= dec!(30), "jump of {percent}%");
        }
        assert!(days.iter().filter(|d| !d.was_jump).all(|d| d.jump_percent.is_none()));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let mut acme = instrument(dec!(10), SimulationParams::default());
        acme.simulation.volatility = dec!(1.5);
        let result = PriceSimulator::new().generate(&acme, 5, &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(SimulatorError::InvalidParams(_))));
    }

    #[test]
    fn box_muller_is_roughly_standard() {
        let mut rng = StdRng::seed_from_u64(2024);
        let samples: Vec<f64> = (0..20_000).map(|_| standard_normal(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((variance - 1.0).abs() < 0.05, "variance {variance}");
    }

    #[test]
    fn observation_carries_jump_metadata() {
        let day = SimulatedDay {
            date: last_day(),
            price: dec!(12.34),
            volume: 500_000,
            was_jump: true,
            jump_percent: Some(dec!(-12.5)),
        };
        let id = Uuid::new_v4();
        let observation = day.to_observation(id);
        assert_eq!(observation.instrument_id, id);
        assert_eq!(observation.timestamp.date_naive(), last_day());
        assert!(observation.was_jump);
        assert_eq!(observation.jump_percent, Some(dec!(-12.5)));
    }
}
