//! Asset price submission to the hub oracle.

use crate::{PriceFetcher, RelayMetrics, RoundState};
use alloy_primitives::Bytes;
use alloy_rpc_types_eth::TransactionReceipt;
use alloy_sol_types::SolCall;
use relayer_client::{ClientError, EthRpc, MultiChain};
use relayer_contracts::abi::calls::{oracle_aggregate_feedingCall, price_oracle_id};
use relayer_tasks::{CallParams, EventHandler, HandlerError, SendParams, WorkItem};
use std::sync::Arc;

/// Collects weighted prices for the configured symbols and submits them via
/// `oracle_aggregate_feeding`, but only while this relayer is selected for
/// the current round.
pub struct PriceFeedHandler<T> {
    chains: Arc<MultiChain<T>>,
    rounds: Arc<RoundState>,
    fetcher: Arc<dyn PriceFetcher>,
    symbols: Vec<String>,
    fast_relayer: bool,
    metrics: RelayMetrics,
}

impl<T: EthRpc> PriceFeedHandler<T> {
    /// Returns a new handler feeding prices for `symbols`.
    pub fn new(
        chains: Arc<MultiChain<T>>,
        rounds: Arc<RoundState>,
        fetcher: Arc<dyn PriceFetcher>,
        symbols: Vec<String>,
        fast_relayer: bool,
    ) -> Self {
        Self { chains, rounds, fetcher, symbols, fast_relayer, metrics: RelayMetrics::default() }
    }

    fn is_selected(&self) -> bool {
        self.fast_relayer || self.rounds.cached_index(self.rounds.latest_round()).is_some()
    }
}

#[async_trait::async_trait]
impl<T: EthRpc> EventHandler for PriceFeedHandler<T> {
    async fn build_call(&self, _item: &WorkItem) -> Result<Option<CallParams>, HandlerError> {
        Ok(None)
    }

    async fn on_call_result(
        &self,
        _item: &WorkItem,
        _output: Result<Bytes, ClientError>,
    ) -> Result<Vec<WorkItem>, HandlerError> {
        Ok(vec![])
    }

    async fn build_send(&self, _item: &WorkItem) -> Result<Option<SendParams>, HandlerError> {
        if !self.is_selected() {
            return Ok(None);
        }

        let prices = self
            .fetcher
            .get_current_weighted_price(&self.symbols)
            .await
            .map_err(|err| HandlerError::Collaborator(err.to_string()))?;

        let mut oids = Vec::with_capacity(self.symbols.len());
        let mut values = Vec::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            if let Some(price) = prices.get(symbol) {
                oids.push(price_oracle_id(symbol));
                values.push(*price);
            }
        }
        if oids.is_empty() {
            return Ok(None);
        }

        let hub = self.chains.hub();
        let oracle = hub
            .addresses()
            .oracle
            .ok_or_else(|| HandlerError::InvalidFlow("hub oracle address missing".into()))?;
        let data = oracle_aggregate_feedingCall { oids, prices: values }.abi_encode();

        self.metrics.price_feeds.increment(1);
        Ok(Some(SendParams::new(self.chains.network().hub(), oracle, data.into())))
    }

    async fn on_tx_success(
        &self,
        _item: &WorkItem,
        _receipt: &TransactionReceipt,
    ) -> Vec<WorkItem> {
        vec![]
    }

    async fn on_tx_fail(&self, _item: &WorkItem) -> Vec<WorkItem> {
        tracing::warn!(target: "relayer::periodic", "price feed submission failed");
        vec![]
    }

    fn successor(&self, item: &WorkItem) -> Option<WorkItem> {
        match item {
            WorkItem::Periodic(task) => Some(WorkItem::Periodic(task.clone_next())),
            _ => None,
        }
    }
}

impl<T> std::fmt::Debug for PriceFeedHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceFeedHandler").field("symbols", &self.symbols).finish()
    }
}
