//! Detection of hub validator-round advances.

use crate::{RelayMetrics, RoundState};
use alloy_primitives::{keccak256, Bytes};
use alloy_rpc_types_eth::TransactionReceipt;
use alloy_sol_types::{SolCall, SolValue};
use relayer_client::{ClientError, EthRpc, MultiChain};
use relayer_contracts::abi::{
    calls::{latest_roundCall, round_control_pollCall, selected_relayersCall},
    logs::Sig,
};
use relayer_tasks::{CallParams, EventHandler, HandlerError, SendParams, WorkItem};
use std::sync::Arc;

/// Compares the hub's `latest_round` against the locally cached round; on an
/// increase it refreshes the round state and, if this relayer sat in the
/// previous round's validator set, seeds the next fan-out with a signed
/// `round_control_poll`.
pub struct RoundProbeHandler<T> {
    chains: Arc<MultiChain<T>>,
    rounds: Arc<RoundState>,
    fast_relayer: bool,
    metrics: RelayMetrics,
}

impl<T: EthRpc> RoundProbeHandler<T> {
    /// Returns a new handler.
    pub fn new(chains: Arc<MultiChain<T>>, rounds: Arc<RoundState>, fast_relayer: bool) -> Self {
        Self { chains, rounds, fast_relayer, metrics: RelayMetrics::default() }
    }
}

#[async_trait::async_trait]
impl<T: EthRpc> EventHandler for RoundProbeHandler<T> {
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
        let hub = self.chains.hub();
        let authority = hub.addresses().authority;

        let returned = hub.call(authority, latest_roundCall {}.abi_encode().into()).await?;
        let hub_round = latest_roundCall::abi_decode_returns(&returned)?;
        if hub_round <= self.rounds.latest_round() {
            return Ok(None);
        }
        tracing::info!(target: "relayer::periodic", hub_round, "validator round advanced");

        let data = selected_relayersCall { round: hub_round }.abi_encode();
        let returned = hub.call(authority, data.into()).await?;
        let mut sorted = selected_relayersCall::abi_decode_returns(&returned)?;
        sorted.sort();

        if let Some(index) = sorted.iter().position(|addr| *addr == hub.address()) {
            self.rounds.insert_index(hub_round, index);
        }
        self.rounds.set_latest_round(hub_round);

        // only previous-round validators seed the propagation.
        if !self.fast_relayer && self.rounds.cached_index(hub_round.saturating_sub(1)).is_none() {
            return Ok(None);
        }

        let payload = (hub_round, sorted.clone()).abi_encode();
        let sig = hub.sign_payload(keccak256(&payload))?;
        let data = round_control_pollCall {
            round: hub_round,
            relayers: sorted,
            signature: Sig::from(sig),
        }
        .abi_encode();

        self.metrics.round_polls.increment(1);
        Ok(Some(SendParams::new(self.chains.network().hub(), authority, data.into())))
    }

    async fn on_tx_success(
        &self,
        _item: &WorkItem,
        _receipt: &TransactionReceipt,
    ) -> Vec<WorkItem> {
        vec![]
    }

    async fn on_tx_fail(&self, _item: &WorkItem) -> Vec<WorkItem> {
        tracing::warn!(target: "relayer::periodic", "round control poll failed");
        vec![]
    }

    fn successor(&self, item: &WorkItem) -> Option<WorkItem> {
        match item {
            WorkItem::Periodic(task) => Some(WorkItem::Periodic(task.clone_next())),
            _ => None,
        }
    }
}

impl<T> std::fmt::Debug for RoundProbeHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundProbeHandler")
            .field("fast_relayer", &self.fast_relayer)
            .finish()
    }
}
