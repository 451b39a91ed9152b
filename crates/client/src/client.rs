//! The per-chain RPC facade.

use crate::{
    classify_call_error, classify_send_error,
    fee::compute_fee,
    nonce::NonceManager,
    ClientError, CommittedFee, EthRpc, FeeConfig, TxFeeType,
};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, B256};
use alloy_rpc_types_eth::{
    Block, BlockNumberOrTag, Filter, Log, TransactionReceipt, TransactionRequest,
};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::TransportResult;
use parking_lot::Mutex;
use relayer_primitives::{ChainId, EcdsaSignature};
use std::time::Duration;

/// Static per-chain parameters, sourced from configuration.
#[derive(Debug, Clone)]
pub struct ChainMetadata {
    /// The chain this client serves.
    pub id: ChainId,
    /// Average block period in seconds.
    pub block_period_sec: u64,
    /// Finality depth: blocks subtracted from the latest height to obtain a
    /// matured height safe to read.
    pub block_aging_period: u64,
    /// Multiplier over the finality window when waiting for a receipt.
    pub commit_multiplier: u64,
    /// The chain's fee strategy.
    pub fee: FeeConfig,
}

/// The contract addresses the relayer interacts with on one chain.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    /// The Socket contract.
    pub socket: Address,
    /// The authority contract.
    pub authority: Address,
    /// The oracle contract; hub only.
    pub oracle: Option<Address>,
}

/// A per-chain handle bundling the transport, the signer, the locally issued
/// nonce and the chain's fee strategy.
///
/// Height parameters passed by callers are silently clamped to the matured
/// height, hiding unfinalized reorganizations from downstream logic.
#[derive(Debug)]
pub struct EthClient<T> {
    rpc: T,
    signer: PrivateKeySigner,
    wallet: EthereumWallet,
    metadata: ChainMetadata,
    addresses: AddressBook,
    nonce: NonceManager,
    fee_failures: Mutex<usize>,
}

impl<T: EthRpc> EthClient<T> {
    /// Returns a new client over the given transport.
    pub fn new(
        rpc: T,
        signer: PrivateKeySigner,
        metadata: ChainMetadata,
        addresses: AddressBook,
    ) -> Self {
        let wallet = EthereumWallet::from(signer.clone());
        Self {
            rpc,
            signer,
            wallet,
            metadata,
            addresses,
            nonce: NonceManager::default(),
            fee_failures: Mutex::new(0),
        }
    }

    /// The chain this client serves.
    pub fn id(&self) -> ChainId {
        self.metadata.id
    }

    /// Whether this client serves the hub.
    pub fn is_hub(&self) -> bool {
        self.metadata.id.is_hub()
    }

    /// The relayer's account address on this chain.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The chain's static parameters.
    pub fn metadata(&self) -> &ChainMetadata {
        &self.metadata
    }

    /// The chain's contract address book.
    pub fn addresses(&self) -> &AddressBook {
        &self.addresses
    }

    /// The wall-clock time to wait for a transaction receipt:
    /// `block_aging_period × block_period × commit_multiplier`.
    pub fn commit_time(&self) -> Duration {
        Duration::from_secs(
            self.metadata.block_aging_period *
                self.metadata.block_period_sec *
                self.metadata.commit_multiplier,
        )
    }

    /// Signs a 32-byte payload with the relayer key.
    pub fn sign_payload(&self, hash: B256) -> Result<EcdsaSignature, ClientError> {
        self.signer
            .sign_hash_sync(&hash)
            .map(Into::into)
            .map_err(|err| ClientError::Signer(err.to_string()))
    }

    /// The latest height reported by the node.
    pub async fn latest_height(&self) -> TransportResult<u64> {
        self.rpc.block_number().await
    }

    /// The matured height: `latest - block_aging_period`.
    pub async fn matured_height(&self) -> TransportResult<u64> {
        Ok(self.latest_height().await?.saturating_sub(self.metadata.block_aging_period))
    }

    /// Fetches a block by number.
    pub async fn block(&self, number: u64) -> Result<Block, ClientError> {
        self.rpc
            .block_by_number(BlockNumberOrTag::Number(number))
            .await?
            .ok_or(ClientError::MissingBlock(number))
    }

    /// `eth_getLogs` over the given filter. The raw transport error is
    /// surfaced so the scanner can detect provider timeouts.
    pub async fn get_logs(&self, filter: &Filter) -> TransportResult<Vec<Log>> {
        self.rpc.logs(filter).await
    }

    /// Whether the node reports itself as syncing.
    pub async fn syncing(&self) -> TransportResult<bool> {
        self.rpc.syncing().await
    }

    /// Read-only contract call, surfacing EVM reverts.
    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ClientError> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.rpc.call(tx).await.map_err(classify_call_error)
    }

    /// Builds, prices and signs a transaction, returning its raw encoding.
    ///
    /// Gas limit is the network estimate scaled by `gas_multiplier`; an
    /// estimation revert is surfaced as [`ClientError::Revert`], a breached
    /// fee cap as [`ClientError::FeeTooHigh`].
    pub async fn build_and_sign(
        &self,
        to: Address,
        data: Bytes,
        gas_multiplier: f64,
    ) -> Result<Vec<u8>, ClientError> {
        let mut tx = TransactionRequest::default()
            .with_from(self.address())
            .with_to(to)
            .with_input(data);

        let estimate = self.rpc.estimate_gas(tx.clone()).await.map_err(classify_call_error)?;
        tx.set_gas_limit((estimate as f64 * gas_multiplier) as u64);
        tx.set_chain_id(self.metadata.id.network_id() as u64);

        match self.commit_fee().await? {
            CommittedFee::Legacy { gas_price } => tx.set_gas_price(gas_price),
            CommittedFee::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => {
                tx.set_max_fee_per_gas(max_fee_per_gas);
                tx.set_max_priority_fee_per_gas(max_priority_fee_per_gas);
            }
        }

        tx.set_nonce(self.nonce.next(&self.rpc, self.address()).await?);

        let envelope =
            tx.build(&self.wallet).await.map_err(|err| ClientError::Signer(err.to_string()))?;
        Ok(envelope.encoded_2718())
    }

    /// Submits a raw transaction, classifying mempool pricing rejections.
    pub async fn send_raw(&self, raw: &[u8]) -> Result<B256, ClientError> {
        match self.rpc.send_raw_transaction(raw).await {
            Ok(hash) => {
                *self.fee_failures.lock() = 0;
                Ok(hash)
            }
            Err(err) => {
                let classified = classify_send_error(err);
                if classified.is_fee_related() {
                    *self.fee_failures.lock() += 1;
                }
                Err(classified)
            }
        }
    }

    /// Fetches the receipt of a submitted transaction, if present.
    pub async fn receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ClientError> {
        Ok(self.rpc.transaction_receipt(hash).await?)
    }

    /// Forgets the locally issued nonce.
    pub fn reset_nonce(&self) {
        self.nonce.reset();
    }

    async fn commit_fee(&self) -> Result<CommittedFee, ClientError> {
        let failures = *self.fee_failures.lock();
        match self.metadata.fee.kind {
            TxFeeType::Legacy { .. } => {
                let network = self.rpc.gas_price().await?;
                compute_fee(&self.metadata.fee, network, 0, 0, self.is_hub(), failures)
            }
            TxFeeType::Eip1559 { .. } => {
                let priority = self.rpc.max_priority_fee_per_gas().await?;
                let base = self
                    .rpc
                    .block_by_number(BlockNumberOrTag::Latest)
                    .await?
                    .and_then(|block| block.header.base_fee_per_gas)
                    .unwrap_or_default() as u128;
                compute_fee(&self.metadata.fee, 0, priority, base, self.is_hub(), failures)
            }
        }
    }
}
