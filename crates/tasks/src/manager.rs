//! The queue consumer driving work items through their lifecycle.

use crate::{
    now_ms, EventHandler, EventQueue, HandlerError, HandlerSet, TaskMetrics, TaskStatus,
    WorkItem, FEE_RETRY_DELAY_MS,
};
use alloy_primitives::B256;
use relayer_client::{ClientError, EthRpc, MultiChain};
use relayer_primitives::ChainId;
use std::sync::Arc;

/// A condition the task manager cannot recover from in-process. The binary
/// logs it and exits with a known status for the outer supervisor.
#[derive(Debug, thiserror::Error)]
pub enum Fatal {
    /// No receipt arrived within the chain's commit window; the RPC
    /// provider is presumed stuck.
    #[error("no receipt for {tx_hash} on {chain} within the commit window")]
    ReceiptTimeout {
        /// The chain the transaction was submitted to.
        chain: ChainId,
        /// The submitted transaction hash.
        tx_hash: B256,
    },
}

/// Drains the event queue, dispatching each matured item to its handler and
/// enqueueing whatever successors the handler returns.
///
/// The SendTx machinery is centralized here: gas estimation with the
/// handler's headroom, fee commitment, nonce assignment, signing,
/// submission, and scheduling of the receipt check after the chain's commit
/// window.
#[derive(Debug)]
pub struct TaskManager<T> {
    queue: Arc<EventQueue>,
    chains: Arc<MultiChain<T>>,
    handlers: HandlerSet,
    metrics: TaskMetrics,
}

impl<T: EthRpc> TaskManager<T> {
    /// Returns a new manager over the given queue and chain set.
    pub fn new(queue: Arc<EventQueue>, chains: Arc<MultiChain<T>>, handlers: HandlerSet) -> Self {
        Self { queue, chains, handlers, metrics: TaskMetrics::default() }
    }

    /// Consumes the queue until a fatal condition arises.
    pub async fn run(self) -> Result<(), Fatal> {
        loop {
            let item = self.queue.pop_matured().await;
            self.dispatch(item).await?;
        }
    }

    /// Dispatches a single matured item.
    pub async fn dispatch(&self, item: WorkItem) -> Result<(), Fatal> {
        tracing::trace!(target: "relayer::tasks", label = item.label(), status = ?item.task_status(), "dispatching item");
        match item.task_status() {
            TaskStatus::CallTx => {
                self.process_call(item).await;
                Ok(())
            }
            TaskStatus::SendTx => {
                self.process_send(item).await;
                Ok(())
            }
            TaskStatus::CheckReceipt => self.process_receipt(item).await,
        }
    }

    async fn process_call(&self, item: WorkItem) {
        let Some(handler) = self.handlers.for_item(&item) else {
            tracing::warn!(target: "relayer::tasks", label = item.label(), "no handler registered");
            return;
        };
        let handler = handler.clone();

        let params = match handler.build_call(&item).await {
            Ok(Some(params)) => params,
            Ok(None) => return,
            Err(err) => return self.handler_error(&item, err),
        };

        self.metrics.calls.increment(1);
        let output = self.chains.world_call(params.chain, params.to, params.data).await;
        match handler.on_call_result(&item, output).await {
            Ok(successors) => self.enqueue_all(successors),
            Err(err) => self.handler_error(&item, err),
        }
    }

    async fn process_send(&self, item: WorkItem) {
        let Some(handler) = self.handlers.for_item(&item) else {
            tracing::warn!(target: "relayer::tasks", label = item.label(), "no handler registered");
            return;
        };
        let handler = handler.clone();

        let params = match handler.build_send(&item).await {
            Ok(Some(params)) => params,
            Ok(None) => return self.enqueue_periodic_successor(&item, &handler),
            Err(err) => {
                self.handler_error(&item, err);
                return self.enqueue_periodic_successor(&item, &handler);
            }
        };

        let raw = match self
            .chains
            .world_build(params.chain, params.to, params.data, params.gas_multiplier)
            .await
        {
            Ok(raw) => raw,
            Err(ClientError::FeeTooHigh) => {
                // requeue once fees settle; the same item retries, so no
                // periodic successor here.
                tracing::debug!(target: "relayer::tasks", label = item.label(), chain = %params.chain, "fee over cap, requeueing");
                self.metrics.fee_requeues.increment(1);
                let mut item = item;
                item.header_mut().switch_to_send(now_ms() + FEE_RETRY_DELAY_MS);
                return self.queue.push(item);
            }
            Err(ClientError::Revert(reason)) => {
                tracing::warn!(target: "relayer::tasks", label = item.label(), chain = %params.chain, %reason, "estimation reverted");
                self.metrics.reverts.increment(1);
                let successors = handler.on_tx_fail(&item).await;
                self.enqueue_all(successors);
                return self.enqueue_periodic_successor(&item, &handler);
            }
            Err(err) => {
                tracing::error!(target: "relayer::tasks", label = item.label(), chain = %params.chain, %err, "transaction build failed");
                return self.enqueue_periodic_successor(&item, &handler);
            }
        };

        match self.chains.world_send(params.chain, &raw).await {
            Ok(tx_hash) => {
                self.metrics.submissions.increment(1);
                let commit_ms = self
                    .chains
                    .get(params.chain)
                    .map(|client| client.commit_time().as_millis() as u64)
                    .unwrap_or_default();
                tracing::info!(target: "relayer::tasks", label = item.label(), chain = %params.chain, %tx_hash, "transaction submitted");
                self.enqueue_periodic_successor(&item, &handler);
                let mut item = item;
                item.header_mut().switch_to_receipt(
                    params.chain,
                    tx_hash,
                    now_ms() + commit_ms,
                );
                self.queue.push(item);
            }
            Err(err) if err.is_fee_related() => {
                // swallowed; the next scan re-emits the event with an
                // escalated fee ladder.
                tracing::warn!(target: "relayer::tasks", label = item.label(), chain = %params.chain, %err, "submission priced out");
                self.metrics.priced_out.increment(1);
                self.enqueue_periodic_successor(&item, &handler);
            }
            Err(ClientError::Revert(reason)) => {
                tracing::warn!(target: "relayer::tasks", label = item.label(), chain = %params.chain, %reason, "submission reverted");
                self.metrics.reverts.increment(1);
                let successors = handler.on_tx_fail(&item).await;
                self.enqueue_all(successors);
                self.enqueue_periodic_successor(&item, &handler);
            }
            Err(err) => {
                tracing::error!(target: "relayer::tasks", label = item.label(), chain = %params.chain, %err, "submission failed");
                self.enqueue_periodic_successor(&item, &handler);
            }
        }
    }

    async fn process_receipt(&self, item: WorkItem) -> Result<(), Fatal> {
        let Some(handler) = self.handlers.for_item(&item) else {
            tracing::warn!(target: "relayer::tasks", label = item.label(), "no handler registered");
            return Ok(());
        };
        let handler = handler.clone();

        let Some(receipt_params) = item.receipt() else {
            tracing::warn!(target: "relayer::tasks", label = item.label(), "receipt check without receipt params");
            return Ok(());
        };

        let receipt =
            self.chains.world_receipt(receipt_params.chain, receipt_params.tx_hash).await;
        match receipt {
            Ok(Some(receipt)) if receipt.status() => {
                self.metrics.receipts_ok.increment(1);
                let successors = handler.on_tx_success(&item, &receipt).await;
                self.enqueue_all(successors);
                Ok(())
            }
            Ok(Some(_)) => {
                tracing::warn!(target: "relayer::tasks", label = item.label(), tx_hash = %receipt_params.tx_hash, "transaction reverted on chain");
                self.metrics.receipts_failed.increment(1);
                let successors = handler.on_tx_fail(&item).await;
                self.enqueue_all(successors);
                Ok(())
            }
            Ok(None) | Err(_) => {
                tracing::error!(
                    target: "relayer::tasks",
                    label = item.label(),
                    chain = %receipt_params.chain,
                    tx_hash = %receipt_params.tx_hash,
                    "no receipt within the commit window"
                );
                handler.on_no_receipt(&item).await;
                Err(Fatal::ReceiptTimeout {
                    chain: receipt_params.chain,
                    tx_hash: receipt_params.tx_hash,
                })
            }
        }
    }

    fn enqueue_all(&self, successors: Vec<WorkItem>) {
        let now = now_ms();
        for mut successor in successors {
            // successors never release in the past.
            if successor.time_lock() < now {
                successor.header_mut().time_lock = now;
            }
            self.queue.push(successor);
        }
    }

    fn enqueue_periodic_successor(&self, item: &WorkItem, handler: &Arc<dyn EventHandler>) {
        if matches!(item, WorkItem::Periodic(_)) {
            if let Some(next) = handler.successor(item) {
                self.queue.push(next);
            }
        }
    }

    fn handler_error(&self, item: &WorkItem, err: HandlerError) {
        tracing::warn!(target: "relayer::tasks", label = item.label(), %err, "handler error, dropping item");
        self.metrics.handler_errors.increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CallParams, EventHandler, PeriodicKind, PeriodicTask, SendParams, TaskStatus,
    };
    use alloy_primitives::{Address, Bytes};
    use alloy_rpc_types_eth::TransactionReceipt;
    use parking_lot::Mutex;
    use relayer_client::test_utils::{mock_receipt, test_client, MockRpc};
    use relayer_primitives::NetworkKind;

    /// A handler that always submits a fixed payload to Ethereum.
    #[derive(Default)]
    struct StubHandler {
        fails: Mutex<usize>,
        successes: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl EventHandler for StubHandler {
        async fn build_call(&self, _: &WorkItem) -> Result<Option<CallParams>, HandlerError> {
            Ok(None)
        }

        async fn on_call_result(
            &self,
            _: &WorkItem,
            _: Result<Bytes, ClientError>,
        ) -> Result<Vec<WorkItem>, HandlerError> {
            Ok(vec![])
        }

        async fn build_send(&self, _: &WorkItem) -> Result<Option<SendParams>, HandlerError> {
            Ok(Some(SendParams::new(
                ChainId::Ethereum,
                Address::repeat_byte(0x11),
                Bytes::from(vec![0xde, 0xad]),
            )))
        }

        async fn on_tx_success(
            &self,
            _: &WorkItem,
            _: &TransactionReceipt,
        ) -> Vec<WorkItem> {
            *self.successes.lock() += 1;
            vec![]
        }

        async fn on_tx_fail(&self, _: &WorkItem) -> Vec<WorkItem> {
            *self.fails.lock() += 1;
            vec![]
        }
    }

    fn manager_with(
        rpc: MockRpc,
        handler: Arc<StubHandler>,
    ) -> (TaskManager<MockRpc>, Arc<EventQueue>) {
        let mut chains = MultiChain::new(NetworkKind::Mainnet);
        chains.insert(test_client(ChainId::Ethereum, rpc));
        let queue = Arc::new(EventQueue::new());
        let handlers = HandlerSet {
            rbc: handler.clone() as Arc<dyn EventHandler>,
            roundup: handler.clone() as Arc<dyn EventHandler>,
            periodic: [(PeriodicKind::Heartbeat, handler as Arc<dyn EventHandler>)]
                .into_iter()
                .collect(),
        };
        (TaskManager::new(queue.clone(), Arc::new(chains), handlers), queue)
    }

    fn heartbeat_item() -> WorkItem {
        WorkItem::Periodic(PeriodicTask::new(PeriodicKind::Heartbeat, 30_000, 0))
    }

    #[tokio::test]
    async fn test_successful_send_schedules_receipt_check() -> eyre::Result<()> {
        // Given
        let rpc = MockRpc::default();
        rpc.set_latest_height(100);
        let handler = Arc::new(StubHandler::default());
        let (manager, queue) = manager_with(rpc, handler);

        // When
        manager.dispatch(heartbeat_item()).await?;

        // Then
        let follow_up = queue.pop_now().expect("receipt check queued");
        assert_eq!(follow_up.task_status(), TaskStatus::CheckReceipt);
        assert!(follow_up.receipt().is_some());
        assert!(follow_up.time_lock() > now_ms());

        Ok(())
    }

    #[tokio::test]
    async fn test_fee_over_cap_requeues_item() -> eyre::Result<()> {
        // Given: network gas price far above the 1000 gwei test cap.
        let rpc = MockRpc::default();
        rpc.set_latest_height(100);
        rpc.set_gas_price(5_000_000_000_000);
        let handler = Arc::new(StubHandler::default());
        let (manager, queue) = manager_with(rpc, handler);

        // When
        manager.dispatch(heartbeat_item()).await?;

        // Then: the item is requeued as SendTx ~3s out; nothing was sent.
        let requeued = queue.pop_now().expect("item requeued");
        assert_eq!(requeued.task_status(), TaskStatus::SendTx);
        assert!(requeued.time_lock() >= now_ms());
        assert!(queue.pop_now().is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_underpriced_submission_is_swallowed() -> eyre::Result<()> {
        // Given
        let rpc = MockRpc::default();
        rpc.set_latest_height(100);
        rpc.fail_sends_with("transaction underpriced");
        let handler = Arc::new(StubHandler::default());
        let (manager, queue) = manager_with(rpc, handler.clone());

        // When
        manager.dispatch(heartbeat_item()).await?;

        // Then: no retry of the same attempt is queued.
        assert!(queue.pop_now().is_none());
        assert_eq!(*handler.fails.lock(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_estimation_revert_runs_fail_hook() -> eyre::Result<()> {
        // Given
        let rpc = MockRpc::default();
        rpc.set_latest_height(100);
        rpc.fail_calls_with("execution reverted: bad request");
        let handler = Arc::new(StubHandler::default());
        let (manager, _queue) = manager_with(rpc, handler.clone());

        // When
        manager.dispatch(heartbeat_item()).await?;

        // Then
        assert_eq!(*handler.fails.lock(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_receipt_outcomes() -> eyre::Result<()> {
        // Given
        let rpc = MockRpc::default();
        rpc.push_receipt(Some(mock_receipt(true)));
        rpc.push_receipt(Some(mock_receipt(false)));
        let handler = Arc::new(StubHandler::default());
        let (manager, _queue) = manager_with(rpc, handler.clone());

        let mut item = heartbeat_item();
        item.header_mut().switch_to_receipt(ChainId::Ethereum, Default::default(), 0);

        // When / Then: success then revert.
        manager.dispatch(item.clone()).await?;
        assert_eq!(*handler.successes.lock(), 1);

        manager.dispatch(item.clone()).await?;
        assert_eq!(*handler.fails.lock(), 1);

        // Missing receipt is fatal.
        let fatal = manager.dispatch(item).await;
        assert!(matches!(fatal, Err(Fatal::ReceiptTimeout { .. })));

        Ok(())
    }
}
