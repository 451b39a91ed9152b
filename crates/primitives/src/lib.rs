//! Primitive types for the bridge relayer.

pub use chain::{ChainId, NetworkKind, HUB_NETWORK_ID, TESTNET_HUB_NETWORK_ID};
mod chain;

pub use asset::{AssetId, AssetKind, COIN_ADDRESS_SENTINEL};
mod asset;

pub use method::{Direction, InvalidMethod, Opcode, RbcMethod};
mod method;

pub use request::RequestId;
mod request;

pub use status::{
    change_status, status_of, ChainEventStatus, InvalidStatus, STATUS_WORD_RANGE,
};
mod status;

pub use signature::{AggregatedSignatures, EcdsaSignature};
mod signature;

pub use round_cache::RoundCache;
mod round_cache;

/// The number of rounds the hub retains validator-set history for. Events
/// older than `current_round - VALIDATOR_HISTORY_LIMIT` are dropped.
pub const VALIDATOR_HISTORY_LIMIT: u128 = 6;
