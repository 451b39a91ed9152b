//! Hub session liveness.

use crate::RelayMetrics;
use alloy_primitives::Bytes;
use alloy_rpc_types_eth::TransactionReceipt;
use alloy_sol_types::SolCall;
use relayer_client::{ClientError, EthRpc, MultiChain};
use relayer_contracts::abi::calls::{heartbeatCall, is_heartbeat_pulsedCall};
use relayer_tasks::{CallParams, EventHandler, HandlerError, SendParams, WorkItem};
use std::sync::Arc;

/// Submits `heartbeat()` whenever the hub has not yet seen a pulse from this
/// relayer in the current session.
pub struct HeartbeatHandler<T> {
    chains: Arc<MultiChain<T>>,
    metrics: RelayMetrics,
}

impl<T: EthRpc> HeartbeatHandler<T> {
    /// Returns a new handler.
    pub fn new(chains: Arc<MultiChain<T>>) -> Self {
        Self { chains, metrics: RelayMetrics::default() }
    }
}

#[async_trait::async_trait]
impl<T: EthRpc> EventHandler for HeartbeatHandler<T> {
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
        let data = is_heartbeat_pulsedCall { relayer: hub.address() }.abi_encode();
        let returned = hub.call(hub.addresses().authority, data.into()).await?;
        if is_heartbeat_pulsedCall::abi_decode_returns(&returned)? {
            return Ok(None);
        }

        self.metrics.heartbeats.increment(1);
        Ok(Some(SendParams::new(
            self.chains.network().hub(),
            hub.addresses().authority,
            heartbeatCall {}.abi_encode().into(),
        )))
    }

    async fn on_tx_success(
        &self,
        _item: &WorkItem,
        _receipt: &TransactionReceipt,
    ) -> Vec<WorkItem> {
        vec![]
    }

    async fn on_tx_fail(&self, _item: &WorkItem) -> Vec<WorkItem> {
        tracing::warn!(target: "relayer::periodic", "heartbeat submission failed");
        vec![]
    }

    fn successor(&self, item: &WorkItem) -> Option<WorkItem> {
        match item {
            WorkItem::Periodic(task) => Some(WorkItem::Periodic(task.clone_next())),
            _ => None,
        }
    }
}

impl<T> std::fmt::Debug for HeartbeatHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatHandler").finish()
    }
}
