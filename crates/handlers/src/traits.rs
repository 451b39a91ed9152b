//! External collaborator interfaces consumed by the periodic feeds.

use alloy_primitives::{B256, U256};
use std::collections::HashMap;

/// A collaborator-side failure. Feed handlers skip the cycle and retry on
/// the next period.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

/// An aggregated price source.
#[async_trait::async_trait]
pub trait PriceFetcher: Send + Sync {
    /// The current volume-weighted price for each requested ticker.
    async fn get_current_weighted_price(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, U256>, CollaboratorError>;
}

/// A Bitcoin chain source.
#[async_trait::async_trait]
pub trait BtcClient: Send + Sync {
    /// The highest block height considered confirmed.
    async fn latest_confirmed_height(&self) -> Result<u64, CollaboratorError>;

    /// The block hash at the given height.
    async fn block_hash_by_height(&self, height: u64) -> Result<B256, CollaboratorError>;
}

/// A [`BtcClient`] over an Esplora-style HTTP API.
#[derive(Debug, Clone)]
pub struct EsploraClient {
    base: String,
    confirmations: u64,
    inner: reqwest::Client,
}

impl EsploraClient {
    /// Returns a client over the given base URL, treating blocks at least
    /// `confirmations` deep as confirmed.
    pub fn new_http(mut base: String, confirmations: u64) -> Self {
        if base.ends_with('/') {
            base.remove(base.len() - 1);
        }
        Self { base, confirmations, inner: reqwest::Client::new() }
    }

    async fn get_text(&self, path: &str) -> Result<String, CollaboratorError> {
        let response = self
            .inner
            .get(format!("{}/{path}", self.base))
            .send()
            .await
            .map_err(|err| CollaboratorError(err.to_string()))?;
        response.text().await.map_err(|err| CollaboratorError(err.to_string()))
    }
}

/// A [`PriceFetcher`] over an aggregator endpoint returning a JSON object of
/// `{"SYMBOL": "price"}` pairs, prices as integer strings.
#[derive(Debug, Clone)]
pub struct HttpPriceFetcher {
    url: String,
    inner: reqwest::Client,
}

impl HttpPriceFetcher {
    /// Returns a fetcher over the given endpoint.
    pub fn new_http(url: String) -> Self {
        Self { url, inner: reqwest::Client::new() }
    }
}

#[async_trait::async_trait]
impl PriceFetcher for HttpPriceFetcher {
    async fn get_current_weighted_price(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, U256>, CollaboratorError> {
        let response = self
            .inner
            .get(&self.url)
            .query(&[("symbols", symbols.join(","))])
            .send()
            .await
            .map_err(|err| CollaboratorError(err.to_string()))?;
        let raw: HashMap<String, String> =
            response.json().await.map_err(|err| CollaboratorError(err.to_string()))?;

        let mut prices = HashMap::new();
        for (symbol, price) in raw {
            let price = price
                .parse::<U256>()
                .map_err(|err| CollaboratorError(format!("price for {symbol}: {err}")))?;
            prices.insert(symbol, price);
        }
        Ok(prices)
    }
}

#[async_trait::async_trait]
impl BtcClient for EsploraClient {
    async fn latest_confirmed_height(&self) -> Result<u64, CollaboratorError> {
        let tip = self
            .get_text("blocks/tip/height")
            .await?
            .trim()
            .parse::<u64>()
            .map_err(|err| CollaboratorError(err.to_string()))?;
        Ok(tip.saturating_sub(self.confirmations))
    }

    async fn block_hash_by_height(&self, height: u64) -> Result<B256, CollaboratorError> {
        let hash = self.get_text(&format!("block-height/{height}")).await?;
        hash.trim().parse::<B256>().map_err(|err| CollaboratorError(err.to_string()))
    }
}
