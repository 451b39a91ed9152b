//! Events emitted by the Socket contracts and their payload structs.
//!
//! The field order of [`SocketMessage`] is load-bearing: with the request id
//! struct inlined first, the ABI encoding of a `Socket` emission places the
//! status word at payload bytes [128..160), which the rest of the workspace
//! relies on for O(1) status rewrites.

use alloy_sol_types::sol;
use relayer_primitives::{
    AggregatedSignatures, ChainEventStatus, EcdsaSignature, InvalidStatus, RequestId,
};

sol! {
    /// The id of a cross-chain request: source network tag, round, sequence.
    #[derive(Debug, PartialEq, Eq)]
    struct ReqId {
        bytes4 src_chain;
        uint128 round;
        uint128 sequence;
    }

    /// Where the request goes and what it does there.
    #[derive(Debug, PartialEq, Eq)]
    struct Instruction {
        bytes4 dst_chain;
        bytes16 method;
    }

    /// The request parameters.
    #[derive(Debug, PartialEq, Eq)]
    struct TaskParams {
        bytes32 asset1;
        bytes32 asset2;
        address refund;
        address to;
        uint256 amount;
        bytes variants;
    }

    /// One state transition of one cross-chain request.
    #[derive(Debug, PartialEq, Eq)]
    struct SocketMessage {
        ReqId req_id;
        uint8 status;
        Instruction instruction;
        TaskParams params;
    }

    /// A quorum of signatures in parallel-array form.
    #[derive(Debug, PartialEq, Eq)]
    struct Signatures {
        bytes32[] r;
        bytes32[] s;
        bytes v;
    }

    /// A single recoverable signature.
    #[derive(Debug, PartialEq, Eq)]
    struct Sig {
        bytes32 r;
        bytes32 s;
        uint8 v;
    }

    /// The validator-rotation payload carried by a `RoundUp` emission.
    #[derive(Debug, PartialEq, Eq)]
    struct RoundUpSubmit {
        uint128 round;
        address[] new_relayers;
        Signatures sigs;
    }

    /// Emitted by a Socket contract on every request state transition.
    #[derive(Debug, PartialEq, Eq)]
    event Socket(SocketMessage message);

    /// Emitted by the hub on validator-set rotation progress.
    #[derive(Debug, PartialEq, Eq)]
    event RoundUp(uint8 status, RoundUpSubmit roundup);

    /// The hub-side view of one request: its status and per-status vote
    /// counts, indexed by status value.
    #[derive(Debug, PartialEq, Eq)]
    struct RequestInfo {
        uint8 status;
        uint256[11] vote_counts;
    }

    /// Round geometry reported by the hub's authority contract.
    #[derive(Debug, PartialEq, Eq)]
    struct RoundMetaData {
        uint128 current_round_index;
        uint64 current_height;
        uint64 round_length;
    }

    // Socket.
    function poll(SocketMessage message, Signatures signatures);
    function get_request(ReqId id) external view returns (RequestInfo info);
    function get_signatures(ReqId id, uint8 status) external view returns (Signatures signatures);

    // Authority.
    function latest_round() external view returns (uint128 round);
    function round_info() external view returns (RoundMetaData info);
    function selected_relayers(uint128 round) external view returns (address[] relayers);
    function majority(bool is_initial) external view returns (uint256 quorum);
    function previous_majority(uint128 round, bool is_initial) external view returns (uint256 quorum);
    function round_control_poll(uint128 round, address[] relayers, Sig signature);
    function round_control_relay(uint128 round, address[] relayers, Signatures signatures);
    function get_round_signatures(uint128 round) external view returns (Signatures signatures);
    function heartbeat();
    function is_heartbeat_pulsed(address relayer) external view returns (bool pulsed);

    // Oracle.
    function oracle_aggregate_feeding(bytes32[] oids, uint256[] prices);
    function oracle_consensus_feeding(bytes32[] oids, uint256[] rounds, bytes32[] values);
    function latest_oracle_round(bytes32 oid) external view returns (uint256 round);
    function get_consensus_feed(bytes32 oid, address relayer, uint256 round) external view returns (bytes32 value);
}

impl SocketMessage {
    /// The primitive request id.
    pub fn request_id(&self) -> RequestId {
        RequestId::new(self.req_id.src_chain, self.req_id.round, self.req_id.sequence)
    }

    /// The decoded request status.
    pub fn event_status(&self) -> Result<ChainEventStatus, InvalidStatus> {
        ChainEventStatus::try_from(self.status)
    }
}

impl From<&AggregatedSignatures> for Signatures {
    fn from(sigs: &AggregatedSignatures) -> Self {
        Self { r: sigs.r.clone(), s: sigs.s.clone(), v: sigs.v.clone() }
    }
}

impl From<Signatures> for AggregatedSignatures {
    fn from(sigs: Signatures) -> Self {
        Self { r: sigs.r, s: sigs.s, v: sigs.v }
    }
}

impl From<EcdsaSignature> for Sig {
    fn from(sig: EcdsaSignature) -> Self {
        Self { r: sig.r, s: sig.s, v: sig.v }
    }
}

impl Signatures {
    /// An empty signature set, used where the hub accepts an unsigned poll.
    pub fn empty() -> Self {
        Self::from(&AggregatedSignatures::default())
    }

    /// A single-signature set.
    pub fn single(sig: EcdsaSignature) -> Self {
        Self::from(&AggregatedSignatures::from(sig))
    }
}
