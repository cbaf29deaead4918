//! `ExchangeRateSource` over a generic ticker HTTP endpoint (spec.md
//! \S4.3, `FixedUsd`).

use std::collections::HashMap;

use coinjoin_core::denomination::ExchangeRateSource;
use coinjoin_core::error::Result as CoreResult;
use coinjoin_types::ExchangeRate;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ClientError;

/// Polls a ticker endpoint that responds with a flat
/// `{"USD": 43000.12, "EUR": 39500.0, ...}` object, the shape several
/// public exchange-rate providers (e.g. blockchain.info's `/ticker`)
/// use.
pub struct HttpExchangeRateProvider {
    http: reqwest::Client,
    ticker_url: String,
}

impl HttpExchangeRateProvider {
    pub fn new(ticker_url: impl Into<String>) -> Self {
        HttpExchangeRateProvider { http: reqwest::Client::new(), ticker_url: ticker_url.into() }
    }

    async fn fetch_rates(&self, cancel: CancellationToken) -> Result<Vec<ExchangeRate>, ClientError> {
        let request = self.http.get(&self.ticker_url).send();
        let response = tokio::select! {
            result = request => result?,
            _ = cancel.cancelled() => return Err(ClientError::Decode("ticker fetch cancelled".into())),
        };

        let rates: HashMap<String, f64> = response.json().await?;
        if rates.is_empty() {
            return Err(ClientError::Decode("ticker response had no currencies".into()));
        }
        Ok(rates.into_iter().map(|(code, rate)| ExchangeRate { code, rate }).collect())
    }
}

#[async_trait::async_trait]
impl ExchangeRateSource for HttpExchangeRateProvider {
    async fn get_rates(&self, cancel: CancellationToken) -> CoreResult<Vec<ExchangeRate>> {
        let rates = self.fetch_rates(cancel).await?;
        debug!(count = rates.len(), "exchange rate ticker fetched");
        Ok(rates)
    }
}
