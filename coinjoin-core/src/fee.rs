//! Fee calculator (spec.md \S4.4).

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Config;
use crate::error::Result;

/// Port the fee calculator needs to reach the Bitcoin node's smart-fee
/// estimator. Implemented by `coinjoin-clients` over JSON-RPC.
#[async_trait::async_trait]
pub trait FeeRateSource: Send + Sync {
    /// Returns a fee rate in BTC per kilobyte, as
    /// `estimatesmartfee(1, "ECONOMICAL")` would.
    async fn estimate_btc_per_kvbyte(&self, cancel: CancellationToken) -> Result<f64>;
}

/// Non-witness size of a P2WPKH input, in vbytes.
const P2WPKH_INPUT_SIZE: f64 = 41.0;
/// Size of a legacy P2PKH input, in bytes.
const P2PKH_INPUT_SIZE: f64 = 148.0;
/// Size of a fixed-shape coin-join output, in bytes.
const FIXED_OUTPUT_SIZE: f64 = 31.0;

/// Per-round fees in satoshis, computed once at the top of
/// `InputRegistration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fees {
    pub fee_per_input_sat: u64,
    pub fee_per_output_sat: u64,
}

/// Computes \S4.4's `fee_per_input`/`fee_per_output`.
///
/// `previous` is the prior round's fees, used as the fallback when the
/// estimator fails and fees were already computed once.
pub async fn calculate_fees(
    config: &Config,
    source: &dyn FeeRateSource,
    previous: Option<Fees>,
    cancel: CancellationToken,
) -> Result<Fees> {
    match source.estimate_btc_per_kvbyte(cancel).await {
        Ok(btc_per_kvb) => {
            let sat_per_byte = (btc_per_kvb * 100_000_000.0) / 1000.0;
            let input_vsize = ((3.0 * P2WPKH_INPUT_SIZE + P2PKH_INPUT_SIZE) / 4.0).ceil();
            Ok(Fees {
                fee_per_input_sat: (sat_per_byte * input_vsize).round() as u64,
                fee_per_output_sat: (sat_per_byte * FIXED_OUTPUT_SIZE).round() as u64,
            })
        }
        Err(e) => {
            warn!("fee estimator unavailable: {e}; falling back");
            match previous {
                Some(fees) => Ok(fees),
                None => {
                    let sat_per_byte = config.fallback_sat_per_byte as f64;
                    let input_vsize = ((3.0 * P2WPKH_INPUT_SIZE + P2PKH_INPUT_SIZE) / 4.0).ceil();
                    Ok(Fees {
                        fee_per_input_sat: (sat_per_byte * input_vsize).round() as u64,
                        fee_per_output_sat: (sat_per_byte * FIXED_OUTPUT_SIZE).round() as u64,
                    })
                }
            }
        }
    }
}
