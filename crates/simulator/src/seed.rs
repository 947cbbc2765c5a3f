use crate::error::SimulatorError;
use crate::price::PriceSimulator;
use core_types::PriceObservation;
use database::Store;
use rand::Rng;
use uuid::Uuid;

/// Generates `days` of history for an instrument and persists it in one store call.
///
/// The instrument's current price moves to the last generated close in the same unit.
pub async fn seed_history<R: Rng + ?Sized>(
    store: &dyn Store,
    instrument_id: Uuid,
    days: u32,
    rng: &mut R,
) -> Result<Vec<PriceObservation>, SimulatorError> {
    let instrument = store
        .get_instrument(instrument_id)
        .await?
        .ok_or(SimulatorError::InstrumentNotFound(instrument_id))?;

    let path = PriceSimulator::new().generate(&instrument, days, rng)?;
    let observations: Vec<PriceObservation> = path.iter().map(|day| day.to_observation(instrument_id)).collect();
    let latest_price = path.last().map(|day| day.price);

    if !observations.is_empty() {
        store
            .append_price_history(instrument_id, &observations, latest_price)
            .await?;
    }

    tracing::info!(
        symbol = %instrument.symbol,
        days = observations.len(),
        latest_price = ?latest_price,
        "Seeded simulated price history."
    );
    Ok(observations)
}
