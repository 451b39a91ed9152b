//! The seam between the relayer and the JSON-RPC transport.

use alloy_primitives::{Address, Bytes, B256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{
    Block, BlockNumberOrTag, Filter, Log, SyncStatus, TransactionReceipt, TransactionRequest,
};
use alloy_transport::TransportResult;

/// The JSON-RPC surface the relayer consumes.
///
/// Production code goes through the blanket impl over any
/// [`alloy_provider::Provider`]; tests substitute a scripted double. The
/// transport-level retry policy (5xx backoff) is expected to be mounted in
/// the provider via [`alloy_transport::layers::RetryBackoffLayer`].
#[async_trait::async_trait]
pub trait EthRpc: Send + Sync {
    /// `eth_blockNumber`.
    async fn block_number(&self) -> TransportResult<u64>;

    /// `eth_getBlockByNumber`, without transaction bodies.
    async fn block_by_number(&self, number: BlockNumberOrTag) -> TransportResult<Option<Block>>;

    /// `eth_getLogs`.
    async fn logs(&self, filter: &Filter) -> TransportResult<Vec<Log>>;

    /// `eth_call`.
    async fn call(&self, tx: TransactionRequest) -> TransportResult<Bytes>;

    /// `eth_estimateGas`.
    async fn estimate_gas(&self, tx: TransactionRequest) -> TransportResult<u64>;

    /// `eth_sendRawTransaction`. Returns the transaction hash.
    async fn send_raw_transaction(&self, encoded: &[u8]) -> TransportResult<B256>;

    /// `eth_getTransactionReceipt`.
    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> TransportResult<Option<TransactionReceipt>>;

    /// `eth_getTransactionCount` at the latest block.
    async fn transaction_count(&self, address: Address) -> TransportResult<u64>;

    /// `eth_gasPrice`.
    async fn gas_price(&self) -> TransportResult<u128>;

    /// `eth_maxPriorityFeePerGas`.
    async fn max_priority_fee_per_gas(&self) -> TransportResult<u128>;

    /// Whether the node reports itself as syncing.
    async fn syncing(&self) -> TransportResult<bool>;
}

#[async_trait::async_trait]
impl<P> EthRpc for P
where
    P: Provider + Send + Sync,
{
    async fn block_number(&self) -> TransportResult<u64> {
        Provider::get_block_number(self).await
    }

    async fn block_by_number(&self, number: BlockNumberOrTag) -> TransportResult<Option<Block>> {
        Provider::get_block_by_number(self, number).await
    }

    async fn logs(&self, filter: &Filter) -> TransportResult<Vec<Log>> {
        Provider::get_logs(self, filter).await
    }

    async fn call(&self, tx: TransactionRequest) -> TransportResult<Bytes> {
        Provider::call(self, tx).await
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> TransportResult<u64> {
        Provider::estimate_gas(self, tx).await
    }

    async fn send_raw_transaction(&self, encoded: &[u8]) -> TransportResult<B256> {
        Ok(*Provider::send_raw_transaction(self, encoded).await?.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> TransportResult<Option<TransactionReceipt>> {
        Provider::get_transaction_receipt(self, hash).await
    }

    async fn transaction_count(&self, address: Address) -> TransportResult<u64> {
        Provider::get_transaction_count(self, address).await
    }

    async fn gas_price(&self) -> TransportResult<u128> {
        Provider::get_gas_price(self).await
    }

    async fn max_priority_fee_per_gas(&self) -> TransportResult<u128> {
        Provider::get_max_priority_fee_per_gas(self).await
    }

    async fn syncing(&self) -> TransportResult<bool> {
        Ok(matches!(Provider::syncing(self).await?, SyncStatus::Info(_)))
    }
}
