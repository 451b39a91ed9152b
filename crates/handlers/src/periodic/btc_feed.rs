//! Bitcoin block hash submission to the hub oracle.

use crate::{BtcClient, RelayMetrics};
use alloy_primitives::{Bytes, B256, U256};
use alloy_rpc_types_eth::TransactionReceipt;
use alloy_sol_types::SolCall;
use relayer_client::{ClientError, EthRpc, MultiChain};
use relayer_contracts::abi::calls::{
    get_consensus_feedCall, latest_oracle_roundCall, oracle_consensus_feedingCall,
    BITCOIN_BLOCK_HASH_OID,
};
use relayer_tasks::{CallParams, EventHandler, HandlerError, SendParams, WorkItem};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Feeds the hash of the next Bitcoin height the oracle is missing.
///
/// When the chain runs more than one block ahead of the oracle, the handler
/// flags itself delayed and the next cycle fires at a tenth of the period
/// until the oracle catches up.
pub struct BtcHashFeedHandler<T> {
    chains: Arc<MultiChain<T>>,
    btc: Arc<dyn BtcClient>,
    delayed: AtomicBool,
    metrics: RelayMetrics,
}

impl<T: EthRpc> BtcHashFeedHandler<T> {
    /// Returns a new handler over the given Bitcoin source.
    pub fn new(chains: Arc<MultiChain<T>>, btc: Arc<dyn BtcClient>) -> Self {
        Self { chains, btc, delayed: AtomicBool::new(false), metrics: RelayMetrics::default() }
    }
}

#[async_trait::async_trait]
impl<T: EthRpc> EventHandler for BtcHashFeedHandler<T> {
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
        let oracle = hub
            .addresses()
            .oracle
            .ok_or_else(|| HandlerError::InvalidFlow("hub oracle address missing".into()))?;

        let data = latest_oracle_roundCall { oid: BITCOIN_BLOCK_HASH_OID }.abi_encode();
        let returned = hub.call(oracle, data.into()).await?;
        let oracle_height: u64 =
            latest_oracle_roundCall::abi_decode_returns(&returned)?.saturating_to();

        let chain_height = self
            .btc
            .latest_confirmed_height()
            .await
            .map_err(|err| HandlerError::Collaborator(err.to_string()))?;

        if chain_height <= oracle_height {
            self.delayed.store(false, Ordering::Relaxed);
            return Ok(None);
        }
        self.delayed.store(chain_height > oracle_height + 1, Ordering::Relaxed);

        let target = oracle_height + 1;

        // skip heights this relayer already fed.
        let data = get_consensus_feedCall {
            oid: BITCOIN_BLOCK_HASH_OID,
            relayer: hub.address(),
            round: U256::from(target),
        }
        .abi_encode();
        let returned = hub.call(oracle, data.into()).await?;
        if get_consensus_feedCall::abi_decode_returns(&returned)? != B256::ZERO {
            return Ok(None);
        }

        let hash = self
            .btc
            .block_hash_by_height(target)
            .await
            .map_err(|err| HandlerError::Collaborator(err.to_string()))?;

        let data = oracle_consensus_feedingCall {
            oids: vec![BITCOIN_BLOCK_HASH_OID],
            rounds: vec![U256::from(target)],
            values: vec![hash],
        }
        .abi_encode();

        self.metrics.btc_feeds.increment(1);
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
        tracing::warn!(target: "relayer::periodic", "btc hash feed submission failed");
        vec![]
    }

    fn successor(&self, item: &WorkItem) -> Option<WorkItem> {
        match item {
            WorkItem::Periodic(task) => {
                let period = if self.delayed.load(Ordering::Relaxed) {
                    (task.period_ms / 10).max(1)
                } else {
                    task.period_ms
                };
                Some(WorkItem::Periodic(task.clone_next_in(period)))
            }
            _ => None,
        }
    }
}

impl<T> std::fmt::Debug for BtcHashFeedHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtcHashFeedHandler")
            .field("delayed", &self.delayed.load(Ordering::Relaxed))
            .finish()
    }
}
