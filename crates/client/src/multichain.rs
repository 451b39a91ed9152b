//! Routing of calls, builds and submissions by chain id.

use crate::{ClientError, EthClient, EthRpc};
use alloy_primitives::{Address, Bytes, B256};
use alloy_rpc_types_eth::TransactionReceipt;
use relayer_primitives::{ChainId, NetworkKind};
use std::{collections::HashMap, sync::Arc};

/// A chain-routing error.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The chain is not in the supported set.
    #[error("unsupported chain {0}")]
    UnsupportedChain(ChainId),
}

/// The set of per-chain clients, keyed by chain id.
#[derive(Debug)]
pub struct MultiChain<T> {
    network: NetworkKind,
    chains: HashMap<ChainId, Arc<EthClient<T>>>,
}

impl<T: EthRpc> MultiChain<T> {
    /// Returns an empty set for the given network.
    pub fn new(network: NetworkKind) -> Self {
        Self { network, chains: HashMap::new() }
    }

    /// Registers a client.
    pub fn insert(&mut self, client: EthClient<T>) {
        self.chains.insert(client.id(), Arc::new(client));
    }

    /// The network this set serves.
    pub fn network(&self) -> NetworkKind {
        self.network
    }

    /// The client for `chain`, if supported.
    pub fn get(&self, chain: ChainId) -> Option<&Arc<EthClient<T>>> {
        self.chains.get(&chain)
    }

    /// The client for `chain`, or a routing error.
    pub fn try_get(&self, chain: ChainId) -> Result<&Arc<EthClient<T>>, RouteError> {
        self.get(chain).ok_or(RouteError::UnsupportedChain(chain))
    }

    /// The hub client.
    ///
    /// # Panics
    ///
    /// The hub client is registered at startup; its absence is a wiring bug.
    pub fn hub(&self) -> &Arc<EthClient<T>> {
        self.get(self.network.hub()).expect("hub client is registered at startup")
    }

    /// Every peripheral (non-hub) client, in chain-id order.
    pub fn peripherals(&self) -> Vec<&Arc<EthClient<T>>> {
        let mut peripherals: Vec<_> =
            self.chains.values().filter(|client| !client.is_hub()).collect();
        peripherals.sort_by_key(|client| client.id());
        peripherals
    }

    /// Every supported chain id, in order.
    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut ids: Vec<_> = self.chains.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Routes a read-only call to `chain`.
    pub async fn world_call(
        &self,
        chain: ChainId,
        to: Address,
        data: Bytes,
    ) -> Result<Bytes, ClientError> {
        let client = self.try_get(chain).map_err(route_to_client)?;
        client.call(to, data).await
    }

    /// Routes a transaction build to `chain`.
    pub async fn world_build(
        &self,
        chain: ChainId,
        to: Address,
        data: Bytes,
        gas_multiplier: f64,
    ) -> Result<Vec<u8>, ClientError> {
        let client = self.try_get(chain).map_err(route_to_client)?;
        client.build_and_sign(to, data, gas_multiplier).await
    }

    /// Routes a raw submission to `chain`.
    pub async fn world_send(&self, chain: ChainId, raw: &[u8]) -> Result<B256, ClientError> {
        let client = self.try_get(chain).map_err(route_to_client)?;
        client.send_raw(raw).await
    }

    /// Routes a receipt lookup to `chain`.
    pub async fn world_receipt(
        &self,
        chain: ChainId,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ClientError> {
        let client = self.try_get(chain).map_err(route_to_client)?;
        client.receipt(hash).await
    }
}

fn route_to_client(err: RouteError) -> ClientError {
    let RouteError::UnsupportedChain(chain) = err;
    ClientError::UnsupportedChain(chain.to_string())
}
