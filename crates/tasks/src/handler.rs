//! The seam between the task manager and the per-domain handlers.

use crate::{PeriodicKind, WorkItem};
use alloy_primitives::{Address, Bytes};
use alloy_rpc_types_eth::TransactionReceipt;
use relayer_client::ClientError;
use relayer_primitives::{ChainId, InvalidStatus};
use std::{collections::HashMap, sync::Arc};

/// A read-only contract call to perform.
#[derive(Debug, Clone)]
pub struct CallParams {
    /// The chain to call on.
    pub chain: ChainId,
    /// The contract to call.
    pub to: Address,
    /// The encoded calldata.
    pub data: Bytes,
}

/// A transaction to build and submit.
#[derive(Debug, Clone)]
pub struct SendParams {
    /// The chain to submit to.
    pub chain: ChainId,
    /// The contract to call.
    pub to: Address,
    /// The encoded calldata.
    pub data: Bytes,
    /// The gas-limit headroom over the network estimate.
    pub gas_multiplier: f64,
}

impl SendParams {
    /// Send params with the default 1.2 gas headroom.
    pub fn new(chain: ChainId, to: Address, data: Bytes) -> Self {
        Self { chain, to, data, gas_multiplier: 1.2 }
    }

    /// Overrides the gas headroom.
    pub fn with_gas_multiplier(mut self, gas_multiplier: f64) -> Self {
        self.gas_multiplier = gas_multiplier;
        self
    }
}

/// An error raised inside a handler. Handler errors never stop the task
/// manager; the offending item is logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A client-side failure.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// A contract returned bytes that do not decode.
    #[error("abi decoding failed: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    /// A payload carried an unknown status byte.
    #[error(transparent)]
    Status(#[from] InvalidStatus),
    /// The event violates a protocol expectation and is dropped.
    #[error("invalid flow: {0}")]
    InvalidFlow(String),
    /// An external collaborator (price source, Bitcoin client) failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),
}

/// Per-domain behavior behind the task manager's uniform lifecycle.
///
/// The manager owns the SendTx machinery (estimation, pricing, nonce,
/// signing, submission, receipt scheduling); handlers only build parameters
/// and react to outcomes, returning successor work items to enqueue.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// Builds the read-only call for a `CallTx` item. `None` short-circuits.
    async fn build_call(&self, item: &WorkItem) -> Result<Option<CallParams>, HandlerError>;

    /// Consumes the call outcome, returning successor items.
    async fn on_call_result(
        &self,
        item: &WorkItem,
        output: Result<Bytes, ClientError>,
    ) -> Result<Vec<WorkItem>, HandlerError>;

    /// Builds the submission for a `SendTx` item. `None` drops the item.
    async fn build_send(&self, item: &WorkItem) -> Result<Option<SendParams>, HandlerError>;

    /// Reacts to a successful receipt, returning successor items.
    async fn on_tx_success(&self, item: &WorkItem, receipt: &TransactionReceipt)
        -> Vec<WorkItem>;

    /// Reacts to a reverted execution or failed submission, returning
    /// successor items.
    async fn on_tx_fail(&self, item: &WorkItem) -> Vec<WorkItem>;

    /// Observes a missing receipt before the manager escalates. Logging
    /// only; the item is not retried.
    async fn on_no_receipt(&self, _item: &WorkItem) {}

    /// The recurring successor of a periodic item, enqueued once per
    /// completed attempt.
    fn successor(&self, _item: &WorkItem) -> Option<WorkItem> {
        None
    }
}

/// Routes work items to their handlers by variant.
#[derive(Clone)]
pub struct HandlerSet {
    /// The RBC state-machine handler.
    pub rbc: Arc<dyn EventHandler>,
    /// The RoundUp propagation handler.
    pub roundup: Arc<dyn EventHandler>,
    /// The periodic handlers, by kind.
    pub periodic: HashMap<PeriodicKind, Arc<dyn EventHandler>>,
}

impl HandlerSet {
    /// The handler responsible for `item`, if registered.
    pub fn for_item(&self, item: &WorkItem) -> Option<&Arc<dyn EventHandler>> {
        match item {
            WorkItem::Rbc(_) => Some(&self.rbc),
            WorkItem::RoundUp(_) => Some(&self.roundup),
            WorkItem::Periodic(task) => self.periodic.get(&task.kind),
        }
    }
}

impl std::fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSet")
            .field("periodic", &self.periodic.keys().collect::<Vec<_>>())
            .finish()
    }
}
