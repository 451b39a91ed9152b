//! Per-chain RPC facades for the bridge relayer.
//!
//! Every supported chain is wrapped in an [`EthClient`], which owns the
//! signer, the locally issued nonce and the chain's fee strategy, and clamps
//! all ranged reads to the matured height. [`MultiChain`] routes work to the
//! right client by chain id.

pub use client::{AddressBook, ChainMetadata, EthClient};
mod client;

pub use error::{classify_call_error, classify_send_error, is_timeout, ClientError};
mod error;

pub use fee::{CommittedFee, FeeConfig, TxFeeType, DEFAULT_FEE_UPDATE_RATES};
mod fee;

mod nonce;

pub use multichain::{MultiChain, RouteError};
mod multichain;

pub use rpc::EthRpc;
mod rpc;

#[cfg(any(test, feature = "test-utils"))]
/// Scripted RPC doubles shared by the workspace's tests.
pub mod test_utils;
