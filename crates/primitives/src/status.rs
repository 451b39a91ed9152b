//! Request lifecycle statuses and the canonical status-word rewrite.

use alloy_primitives::Bytes;
use std::ops::Range;

/// The byte range of the status word within a Socket event payload. The
/// offset is fixed by the contract ABI and allows O(1) status edits without
/// a full decode.
pub const STATUS_WORD_RANGE: Range<usize> = 128..160;

/// The lifecycle status of a cross-chain request, as carried on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ChainEventStatus {
    /// Unset.
    None = 0,
    /// Opened on the source chain, awaiting votes.
    Requested = 1,
    /// Vote collection failed.
    Failed = 2,
    /// Executed on the source chain.
    Executed = 3,
    /// Reverted on the source chain.
    Reverted = 4,
    /// Accepted by quorum, awaiting destination relay.
    Accepted = 5,
    /// Rejected by quorum, awaiting rollback relay.
    Rejected = 6,
    /// Committed on the destination chain. Terminal.
    Committed = 7,
    /// Rolled back on the source chain. Terminal.
    Rollbacked = 8,
    /// A next validator set has been relayed.
    NextAuthorityRelayed = 9,
    /// A next validator set has been committed.
    NextAuthorityCommitted = 10,
}

/// A status byte outside the known alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown chain event status {0}")]
pub struct InvalidStatus(pub u8);

impl TryFrom<u8> for ChainEventStatus {
    type Error = InvalidStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::None,
            1 => Self::Requested,
            2 => Self::Failed,
            3 => Self::Executed,
            4 => Self::Reverted,
            5 => Self::Accepted,
            6 => Self::Rejected,
            7 => Self::Committed,
            8 => Self::Rollbacked,
            9 => Self::NextAuthorityRelayed,
            10 => Self::NextAuthorityCommitted,
            other => return Err(InvalidStatus(other)),
        })
    }
}

impl ChainEventStatus {
    /// Whether a request carrying this status has reached its final state.
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Committed | Self::Rollbacked)
    }
}

impl std::fmt::Display for ChainEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Requested => "Requested",
            Self::Failed => "Failed",
            Self::Executed => "Executed",
            Self::Reverted => "Reverted",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
            Self::Committed => "Committed",
            Self::Rollbacked => "Rollbacked",
            Self::NextAuthorityRelayed => "NextAuthorityRelayed",
            Self::NextAuthorityCommitted => "NextAuthorityCommitted",
        };
        f.write_str(name)
    }
}

/// Returns a copy of `data` with the status word rewritten to `status`. The
/// input is never mutated; callers allocate a new event around the result.
pub fn change_status(data: &[u8], status: ChainEventStatus) -> Bytes {
    debug_assert!(data.len() >= STATUS_WORD_RANGE.end, "payload shorter than status word");
    let mut out = data.to_vec();
    out[STATUS_WORD_RANGE.start..STATUS_WORD_RANGE.end].fill(0);
    out[STATUS_WORD_RANGE.end - 1] = status as u8;
    out.into()
}

/// Reads the status word of a Socket event payload.
pub fn status_of(data: &[u8]) -> Result<ChainEventStatus, InvalidStatus> {
    if data.len() < STATUS_WORD_RANGE.end {
        return Err(InvalidStatus(u8::MAX));
    }
    let word = &data[STATUS_WORD_RANGE.start..STATUS_WORD_RANGE.end];
    if word[..31].iter().any(|b| *b != 0) {
        return Err(InvalidStatus(u8::MAX));
    }
    ChainEventStatus::try_from(word[31])
}
