//! Propagation of committed validator-set rotations to peripheral chains.

use crate::{RelayMetrics, RoundState};
use alloy_primitives::{Address, Bytes};
use alloy_rpc_types_eth::TransactionReceipt;
use alloy_sol_types::SolCall;
use relayer_client::{ClientError, EthRpc, MultiChain};
use relayer_contracts::abi::calls::{
    get_round_signaturesCall, latest_roundCall, round_control_relayCall, selected_relayersCall,
};
use relayer_primitives::ChainId;
use relayer_tasks::{
    now_ms, CallParams, EventHandler, EventQueue, HandlerError, RoundUpEvent, SendParams,
    WorkItem, CALL_DELAY_SEC,
};
use std::sync::Arc;

/// Fans a `NEXT_AUTHORITY_COMMITTED` rotation out to every peripheral chain
/// and drives each clone to an aggregated `round_control_relay` submission.
///
/// Only previous-round validators propagate; a secondary relayer backstops
/// a silent primary after the destination chain's commit window plus the
/// standard deferral.
pub struct RoundUpRelayHandler<T> {
    chains: Arc<MultiChain<T>>,
    queue: Arc<EventQueue>,
    rounds: Arc<RoundState>,
    fast_relayer: bool,
    metrics: RelayMetrics,
}

impl<T: EthRpc> RoundUpRelayHandler<T> {
    /// Returns a new handler.
    pub fn new(
        chains: Arc<MultiChain<T>>,
        queue: Arc<EventQueue>,
        rounds: Arc<RoundState>,
        fast_relayer: bool,
    ) -> Self {
        Self { chains, queue, rounds, fast_relayer, metrics: RelayMetrics::default() }
    }

    fn relayer_address(&self) -> Address {
        self.chains.hub().address()
    }

    async fn hub_view(&self, data: Vec<u8>) -> Result<Bytes, HandlerError> {
        let hub = self.chains.hub();
        Ok(hub.call(hub.addresses().authority, data.into()).await?)
    }

    /// Records this relayer's index within the sorted new validator set.
    fn update_cache(&self, event: &RoundUpEvent) {
        let mut sorted = event.new_relayers.clone();
        sorted.sort();
        if let Some(index) = sorted.iter().position(|addr| *addr == self.relayer_address()) {
            self.rounds.insert_index(event.round, index);
        }
        if event.round > self.rounds.latest_round() {
            self.rounds.set_latest_round(event.round);
        }
    }

    /// Fans the rotation out, one clone per peripheral chain.
    fn fan_out(&self, event: &RoundUpEvent) {
        let now = now_ms();
        for client in self.chains.peripherals() {
            let mut clone = event.for_chain(client.id());
            clone.header.switch_to_send(now);
            self.metrics.roundup_fanouts.increment(1);
            self.queue.push(WorkItem::RoundUp(clone));
        }
    }

    /// Whether this relayer is primary for the rotation on its destination:
    /// `block_number % |prev validators| == cached index of round - 1`.
    async fn is_primary(&self, event: &RoundUpEvent) -> Result<bool, HandlerError> {
        if self.fast_relayer {
            return Ok(true);
        }
        let previous = event.round.saturating_sub(1);
        let Some(index) = self.rounds.cached_index(previous) else {
            return Ok(false);
        };
        let returned =
            self.hub_view(selected_relayersCall { round: previous }.abi_encode()).await?;
        let prev_len = selected_relayersCall::abi_decode_returns(&returned)?.len() as u128;
        if prev_len == 0 {
            return Ok(false);
        }
        Ok(u128::from(event.block_number) % prev_len == index as u128)
    }

    async fn relay_to(
        &self,
        chain: ChainId,
        event: &RoundUpEvent,
    ) -> Result<Option<SendParams>, HandlerError> {
        let client = self
            .chains
            .get(chain)
            .ok_or_else(|| HandlerError::InvalidFlow(format!("unsupported chain {chain}")))?;

        // skip destinations that already caught up.
        let returned = client.call(client.addresses().authority, latest_roundCall {}.abi_encode().into()).await?;
        let destination_round = latest_roundCall::abi_decode_returns(&returned)?;
        if destination_round >= event.round {
            tracing::info!(
                target: "relayer::roundup",
                %chain,
                round = event.round,
                "already processed, dropping"
            );
            self.metrics.already_processed.increment(1);
            return Ok(None);
        }

        if !event.aggregated || self.is_primary(event).await? {
            let returned = self
                .hub_view(get_round_signaturesCall { round: event.round }.abi_encode())
                .await?;
            let signatures = get_round_signaturesCall::abi_decode_returns(&returned)?;

            let mut sorted = event.new_relayers.clone();
            sorted.sort();
            let data = round_control_relayCall {
                round: event.round,
                relayers: sorted,
                signatures,
            }
            .abi_encode();

            self.metrics.roundup_relays.increment(1);
            return Ok(Some(SendParams::new(chain, client.addresses().authority, data.into())));
        }

        // secondary: wake after the destination's commit window plus the
        // standard deferral, then submit unconditionally.
        let mut deferred = event.clone();
        deferred.aggregated = false;
        let delay = client.commit_time().as_millis() as u64 + CALL_DELAY_SEC * 1_000;
        deferred.header.switch_to_send(now_ms() + delay);
        self.queue.push(WorkItem::RoundUp(deferred));
        Ok(None)
    }
}

#[async_trait::async_trait]
impl<T: EthRpc> EventHandler for RoundUpRelayHandler<T> {
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

    async fn build_send(&self, item: &WorkItem) -> Result<Option<SendParams>, HandlerError> {
        let WorkItem::RoundUp(event) = item else { return Ok(None) };

        match event.selected_chain {
            None => {
                self.update_cache(event);
                // only previous-round validators may propagate.
                if !self.fast_relayer &&
                    self.rounds.cached_index(event.round.saturating_sub(1)).is_none()
                {
                    tracing::debug!(
                        target: "relayer::roundup",
                        round = event.round,
                        "not a previous-round validator, dropping"
                    );
                    return Ok(None);
                }
                self.fan_out(event);
                Ok(None)
            }
            Some(chain) => self.relay_to(chain, event).await,
        }
    }

    async fn on_tx_success(
        &self,
        item: &WorkItem,
        _receipt: &TransactionReceipt,
    ) -> Vec<WorkItem> {
        if let WorkItem::RoundUp(event) = item {
            tracing::info!(
                target: "relayer::roundup",
                round = event.round,
                chain = ?event.selected_chain,
                "round relay committed"
            );
        }
        vec![]
    }

    async fn on_tx_fail(&self, item: &WorkItem) -> Vec<WorkItem> {
        if let WorkItem::RoundUp(event) = item {
            tracing::warn!(
                target: "relayer::roundup",
                round = event.round,
                chain = ?event.selected_chain,
                "round relay failed"
            );
        }
        vec![]
    }
}

impl<T> std::fmt::Debug for RoundUpRelayHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundUpRelayHandler")
            .field("fast_relayer", &self.fast_relayer)
            .finish()
    }
}
