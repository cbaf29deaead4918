//! `FeeRateSource` over a bitcoind JSON-RPC endpoint's
//! `estimatesmartfee` (spec.md \S4.4).

use coinjoin_core::error::Result as CoreResult;
use coinjoin_core::fee::FeeRateSource;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ClientError;

#[derive(Deserialize)]
struct EstimateSmartFeeResult {
    feerate: Option<f64>,
    errors: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Talks to a single bitcoind node's JSON-RPC interface.
pub struct BitcoindFeeEstimator {
    http: reqwest::Client,
    rpc_url: String,
    rpc_user: String,
    rpc_password: String,
    conf_target: u32,
    estimate_mode: String,
}

impl BitcoindFeeEstimator {
    pub fn new(rpc_url: impl Into<String>, rpc_user: impl Into<String>, rpc_password: impl Into<String>) -> Self {
        BitcoindFeeEstimator {
            http: reqwest::Client::new(),
            rpc_url: rpc_url.into(),
            rpc_user: rpc_user.into(),
            rpc_password: rpc_password.into(),
            conf_target: 1,
            estimate_mode: "ECONOMICAL".to_string(),
        }
    }

    async fn estimate_smart_fee(&self, cancel: CancellationToken) -> Result<f64, ClientError> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "coinjoin-coordinator",
            "method": "estimatesmartfee",
            "params": [self.conf_target, self.estimate_mode],
        });

        let request = self
            .http
            .post(&self.rpc_url)
            .basic_auth(&self.rpc_user, Some(&self.rpc_password))
            .json(&body)
            .send();

        let response = tokio::select! {
            result = request => result?,
            _ = cancel.cancelled() => return Err(ClientError::Decode("estimatesmartfee call cancelled".into())),
        };

        let parsed: RpcResponse<EstimateSmartFeeResult> = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(ClientError::Rpc { code: error.code, message: error.message });
        }
        let result = parsed.result.ok_or_else(|| ClientError::Decode("missing result".into()))?;
        if let Some(errors) = result.errors.filter(|e| !e.is_empty()) {
            return Err(ClientError::Decode(errors.join("; ")));
        }
        result.feerate.ok_or_else(|| ClientError::Decode("no feerate in a successful estimate".into()))
    }
}

#[async_trait::async_trait]
impl FeeRateSource for BitcoindFeeEstimator {
    async fn estimate_btc_per_kvbyte(&self, cancel: CancellationToken) -> CoreResult<f64> {
        let rate = self.estimate_smart_fee(cancel).await?;
        debug!(rate, "estimatesmartfee succeeded");
        Ok(rate)
    }
}
