//! The primary key of a cross-chain request.

use alloy_primitives::FixedBytes;

/// Identifies one cross-chain request: the 4-byte network tag of the source
/// chain, the validator round it was opened in, and a per-round sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId {
    /// The 4-byte network id of the source chain.
    pub src_chain: FixedBytes<4>,
    /// The validator round the request was opened in.
    pub round: u128,
    /// The per-round sequence number.
    pub sequence: u128,
}

impl RequestId {
    /// Returns a new [`RequestId`].
    pub const fn new(src_chain: FixedBytes<4>, round: u128, sequence: u128) -> Self {
        Self { src_chain, round, sequence }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.src_chain, self.round, self.sequence)
    }
}
