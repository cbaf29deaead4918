//! Denomination calculator (spec.md \S4.3).

use coinjoin_types::ExchangeRate;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::{Config, DenominationAlgorithm};
use crate::error::{CoreError, Result};

/// Port the denomination calculator needs when `Config::denomination_algorithm`
/// is `FixedUsd`. Implemented by `coinjoin-clients` over HTTP; this
/// crate only depends on the trait.
#[async_trait::async_trait]
pub trait ExchangeRateSource: Send + Sync {
    async fn get_rates(&self, cancel: CancellationToken) -> Result<Vec<ExchangeRate>>;
}

/// The maximum rounding precision `FixedUsd` will try before giving up
/// (spec.md \S4.3, `k <= 8`).
const MAX_ROUNDING_DIGITS: u32 = 8;

/// Computes the round's denomination in satoshis.
///
/// `previous_denomination_sat` is the prior round's value (used as the
/// `FixedUsd` fallback when the provider is unavailable and a value
/// already exists).
pub async fn calculate_denomination_sat(
    config: &Config,
    source: &dyn ExchangeRateSource,
    previous_denomination_sat: Option<u64>,
    cancel: CancellationToken,
) -> Result<u64> {
    match config.denomination_algorithm {
        DenominationAlgorithm::FixedBtc => Ok(config.denomination_btc),
        DenominationAlgorithm::FixedUsd => {
            match source.get_rates(cancel).await {
                Ok(rates) => {
                    let usd = rates
                        .iter()
                        .find(|r| r.code == "USD")
                        .ok_or_else(|| CoreError::ExternalUnavailable("no USD rate in response".into()))?;
                    Ok(usd_to_sat(config.denomination_usd, usd.rate))
                }
                Err(e) => {
                    warn!("exchange rate provider unavailable: {e}; falling back");
                    Ok(previous_denomination_sat.unwrap_or(config.denomination_btc))
                }
            }
        }
    }
}

/// `round(denomination_usd / price, k)` with `k` starting at 1 and
/// increasing until the result is non-zero, capped at
/// `MAX_ROUNDING_DIGITS`.
fn usd_to_sat(denomination_usd: f64, price_usd_per_btc: f64) -> u64 {
    let btc = denomination_usd / price_usd_per_btc;
    for k in 1..=MAX_ROUNDING_DIGITS {
        let scale = 10f64.powi(k as i32);
        let rounded_btc = (btc * scale).round() / scale;
        let sat = (rounded_btc * 100_000_000.0).round();
        if sat > 0.0 {
            return sat as u64;
        }
    }
    0
}
