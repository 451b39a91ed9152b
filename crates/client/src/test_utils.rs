//! Scripted RPC doubles shared by the workspace's tests.

use crate::{AddressBook, ChainMetadata, EthClient, EthRpc, FeeConfig, TxFeeType};
use alloy_consensus::{
    Eip658Value, Receipt, ReceiptEnvelope, ReceiptWithBloom, Transaction, TxEnvelope,
};
use alloy_eips::eip2718::Decodable2718;
use alloy_json_rpc::{ErrorPayload, RpcError};
use alloy_primitives::{keccak256, Address, Bloom, Bytes, B256};
use alloy_rpc_types_eth::{
    Block, BlockNumberOrTag, Filter, Header, Log, TransactionReceipt, TransactionRequest,
};
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::{TransportErrorKind, TransportResult};
use parking_lot::Mutex;
use relayer_primitives::ChainId;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

/// A scripted stand-in for a JSON-RPC provider.
///
/// Calls are answered from per-selector response queues; submissions are
/// recorded; log queries drain a scripted queue and can be forced to fail
/// above a window width, which is how the scanner's timeout handling is
/// exercised. Clones share state, so tests keep a handle after the client
/// takes ownership.
#[derive(Debug, Clone, Default)]
pub struct MockRpc(Arc<MockState>);

#[derive(Debug, Default)]
struct MockState {
    latest_height: Mutex<u64>,
    blocks: Mutex<HashMap<u64, Block>>,
    logs: Mutex<VecDeque<Vec<Log>>>,
    log_filters: Mutex<Vec<Filter>>,
    log_window_limit: Mutex<Option<u64>>,
    calls: Mutex<HashMap<[u8; 4], VecDeque<Bytes>>>,
    call_failure: Mutex<Option<String>>,
    sent: Mutex<Vec<Bytes>>,
    send_failure: Mutex<Option<String>>,
    receipts: Mutex<VecDeque<Option<TransactionReceipt>>>,
    transaction_count: Mutex<u64>,
    gas_price: Mutex<u128>,
    priority_fee: Mutex<u128>,
    syncing: Mutex<bool>,
}

impl MockRpc {
    /// Sets the latest height reported by `eth_blockNumber`.
    pub fn set_latest_height(&self, height: u64) {
        *self.0.latest_height.lock() = height;
    }

    /// Registers a block served by `eth_getBlockByNumber`.
    pub fn push_block(&self, number: u64, timestamp: u64) {
        self.0.blocks.lock().insert(number, mock_block(number, timestamp));
    }

    /// Queues one `eth_getLogs` response.
    pub fn push_logs(&self, logs: Vec<Log>) {
        self.0.logs.lock().push_back(logs);
    }

    /// Fails any `eth_getLogs` whose block range is wider than `limit`.
    pub fn set_log_window_limit(&self, limit: u64) {
        *self.0.log_window_limit.lock() = Some(limit);
    }

    /// The filters of every `eth_getLogs` served so far.
    pub fn log_filters(&self) -> Vec<Filter> {
        self.0.log_filters.lock().clone()
    }

    /// Queues one response for calls matching the 4-byte selector.
    pub fn push_call_response(&self, selector: [u8; 4], response: impl Into<Bytes>) {
        self.0.calls.lock().entry(selector).or_default().push_back(response.into());
    }

    /// Fails every subsequent call and estimation with the given message.
    pub fn fail_calls_with(&self, message: &str) {
        *self.0.call_failure.lock() = Some(message.to_string());
    }

    /// Fails every subsequent submission with the given message.
    pub fn fail_sends_with(&self, message: &str) {
        *self.0.send_failure.lock() = Some(message.to_string());
    }

    /// The raw transactions submitted so far.
    pub fn sent_transactions(&self) -> Vec<Bytes> {
        self.0.sent.lock().clone()
    }

    /// Queues one `eth_getTransactionReceipt` response.
    pub fn push_receipt(&self, receipt: Option<TransactionReceipt>) {
        self.0.receipts.lock().push_back(receipt);
    }

    /// Sets the account nonce reported by `eth_getTransactionCount`.
    pub fn set_transaction_count(&self, count: u64) {
        *self.0.transaction_count.lock() = count;
    }

    /// Sets the network gas price.
    pub fn set_gas_price(&self, price: u128) {
        *self.0.gas_price.lock() = price;
    }

    /// Sets the network priority fee.
    pub fn set_priority_fee(&self, fee: u128) {
        *self.0.priority_fee.lock() = fee;
    }

    /// Sets the sync status.
    pub fn set_syncing(&self, syncing: bool) {
        *self.0.syncing.lock() = syncing;
    }
}

fn resp_error(message: &str) -> RpcError<TransportErrorKind> {
    RpcError::ErrorResp(ErrorPayload {
        code: -32000,
        message: message.to_string().into(),
        data: None,
    })
}

fn filter_range(filter: &Filter) -> Option<(u64, u64)> {
    let from = filter.block_option.get_from_block()?.as_number()?;
    let to = filter.block_option.get_to_block()?.as_number()?;
    Some((from, to))
}

#[async_trait::async_trait]
impl EthRpc for MockRpc {
    async fn block_number(&self) -> TransportResult<u64> {
        Ok(*self.0.latest_height.lock())
    }

    async fn block_by_number(&self, number: BlockNumberOrTag) -> TransportResult<Option<Block>> {
        let number = match number {
            BlockNumberOrTag::Number(number) => number,
            BlockNumberOrTag::Latest => *self.0.latest_height.lock(),
            _ => unimplemented!("mock serves number and latest queries only"),
        };
        Ok(Some(
            self.0.blocks.lock().get(&number).cloned().unwrap_or_else(|| mock_block(number, 0)),
        ))
    }

    async fn logs(&self, filter: &Filter) -> TransportResult<Vec<Log>> {
        if let (Some(limit), Some((from, to))) =
            (*self.0.log_window_limit.lock(), filter_range(filter))
        {
            if to.saturating_sub(from) + 1 > limit {
                return Err(resp_error("query timeout exceeded"));
            }
        }
        self.0.log_filters.lock().push(filter.clone());
        Ok(self.0.logs.lock().pop_front().unwrap_or_default())
    }

    async fn call(&self, tx: TransactionRequest) -> TransportResult<Bytes> {
        if let Some(message) = self.0.call_failure.lock().clone() {
            return Err(resp_error(&message));
        }
        let input = tx.input.input().cloned().unwrap_or_default();
        let selector: [u8; 4] =
            input.get(..4).and_then(|bytes| bytes.try_into().ok()).unwrap_or_default();
        let response = self.0.calls.lock().get_mut(&selector).and_then(VecDeque::pop_front);
        match response {
            Some(response) => Ok(response),
            None => panic!("unscripted eth_call for selector 0x{}", hex_encode(selector)),
        }
    }

    async fn estimate_gas(&self, _tx: TransactionRequest) -> TransportResult<u64> {
        if let Some(message) = self.0.call_failure.lock().clone() {
            return Err(resp_error(&message));
        }
        Ok(100_000)
    }

    async fn send_raw_transaction(&self, encoded: &[u8]) -> TransportResult<B256> {
        if let Some(message) = self.0.send_failure.lock().clone() {
            return Err(resp_error(&message));
        }
        self.0.sent.lock().push(Bytes::from(encoded.to_vec()));
        Ok(keccak256(encoded))
    }

    async fn transaction_receipt(
        &self,
        _hash: B256,
    ) -> TransportResult<Option<TransactionReceipt>> {
        Ok(self.0.receipts.lock().pop_front().unwrap_or(None))
    }

    async fn transaction_count(&self, _address: Address) -> TransportResult<u64> {
        Ok(*self.0.transaction_count.lock())
    }

    async fn gas_price(&self) -> TransportResult<u128> {
        Ok(*self.0.gas_price.lock())
    }

    async fn max_priority_fee_per_gas(&self) -> TransportResult<u128> {
        Ok(*self.0.priority_fee.lock())
    }

    async fn syncing(&self) -> TransportResult<bool> {
        Ok(*self.0.syncing.lock())
    }
}

/// A block with the given number and timestamp.
pub fn mock_block(number: u64, timestamp: u64) -> Block {
    let inner = alloy_consensus::Header {
        number,
        timestamp,
        base_fee_per_gas: Some(10_000_000_000),
        ..Default::default()
    };
    let header = Header {
        hash: keccak256(number.to_be_bytes()),
        inner,
        total_difficulty: None,
        size: None,
    };
    Block { header, ..Default::default() }
}

/// A receipt with the given execution status.
pub fn mock_receipt(success: bool) -> TransactionReceipt {
    let receipt = Receipt::<Log> {
        status: Eip658Value::Eip658(success),
        cumulative_gas_used: 21_000,
        logs: vec![],
    };
    TransactionReceipt {
        inner: ReceiptEnvelope::Legacy(ReceiptWithBloom { receipt, logs_bloom: Bloom::ZERO }),
        transaction_hash: B256::ZERO,
        transaction_index: Some(0),
        block_hash: Some(B256::ZERO),
        block_number: Some(1),
        gas_used: 21_000,
        effective_gas_price: 0,
        blob_gas_used: None,
        blob_gas_price: None,
        from: Address::ZERO,
        to: None,
        contract_address: None,
    }
}

/// Decodes the calldata of a raw signed transaction.
pub fn decoded_input(raw: &[u8]) -> Result<Bytes, alloy_eips::eip2718::Eip2718Error> {
    let envelope = TxEnvelope::decode_2718(&mut &raw[..])?;
    Ok(envelope.input().clone())
}

/// Decodes the destination of a raw signed transaction.
pub fn decoded_to(raw: &[u8]) -> Result<Option<Address>, alloy_eips::eip2718::Eip2718Error> {
    let envelope = TxEnvelope::decode_2718(&mut &raw[..])?;
    Ok(envelope.to())
}

/// Chain metadata with short test-friendly windows: 3s blocks, finality
/// depth 5, commit multiplier 2, legacy fees capped at 1000 gwei.
pub fn test_metadata(id: ChainId) -> ChainMetadata {
    ChainMetadata {
        id,
        block_period_sec: 3,
        block_aging_period: 5,
        commit_multiplier: 2,
        fee: FeeConfig::new(TxFeeType::Legacy { max_gas_price: 1_000_000_000_000 }),
    }
}

/// A client over a mock transport with a fresh random key.
pub fn test_client(id: ChainId, rpc: MockRpc) -> EthClient<MockRpc> {
    test_client_with(id, rpc, PrivateKeySigner::random(), AddressBook::default())
}

/// A client over a mock transport with the given key and address book; used
/// where one relayer identity spans several chains.
pub fn test_client_with(
    id: ChainId,
    rpc: MockRpc,
    signer: PrivateKeySigner,
    addresses: AddressBook,
) -> EthClient<MockRpc> {
    EthClient::new(rpc, signer, test_metadata(id), addresses)
}

fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}
