//! Function encodings for the Socket, Authority and Oracle endpoints.

use alloy_primitives::{keccak256, B256};

// The call bindings and their return structs are generated by the single
// `sol!` block in `super::logs` (the `sol!` macro can only resolve custom
// types declared within the same invocation, and these functions reference
// the event payload structs defined there). They are re-exported here so the
// call surface keeps its own module path.
pub use super::logs::{
    get_consensus_feedCall, get_requestCall, get_round_signaturesCall, get_signaturesCall,
    heartbeatCall, is_heartbeat_pulsedCall, latest_oracle_roundCall, latest_roundCall,
    majorityCall, oracle_aggregate_feedingCall, oracle_consensus_feedingCall, pollCall,
    previous_majorityCall, round_control_pollCall, round_control_relayCall, round_infoCall,
    selected_relayersCall, RequestInfo, RoundMetaData,
};

/// The oracle id under which Bitcoin block hashes are fed.
pub const BITCOIN_BLOCK_HASH_OID: B256 = B256::new(*b"BITCOIN_BLOCK_HASH\0\0\0\0\0\0\0\0\0\0\0\0\0\0");

/// The oracle id of a price feed for the given ticker symbol.
pub fn price_oracle_id(symbol: &str) -> B256 {
    keccak256(symbol.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolCall;

    #[test]
    fn test_poll_selector_is_stable() {
        assert_eq!(
            pollCall::SIGNATURE,
            "poll(((bytes4,uint128,uint128),uint8,(bytes4,bytes16),(bytes32,bytes32,address,address,uint256,bytes)),(bytes32[],bytes32[],bytes))"
        );
    }

    #[test]
    fn test_price_oracle_id_differs_per_symbol() {
        assert_ne!(price_oracle_id("ETH"), price_oracle_id("BTC"));
        assert_eq!(price_oracle_id("ETH"), price_oracle_id("ETH"));
    }

    #[test]
    fn test_heartbeat_encodes_selector_only() {
        assert_eq!(heartbeatCall {}.abi_encode().len(), 4);
    }
}
