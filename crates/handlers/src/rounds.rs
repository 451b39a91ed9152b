//! Shared validator-round state.

use parking_lot::Mutex;
use relayer_primitives::RoundCache;

/// The relayer's view of validator rounds: the hub's latest known round and
/// the bounded cache mapping each round to this relayer's index within its
/// sorted validator set.
#[derive(Debug)]
pub struct RoundState {
    cache: Mutex<RoundCache>,
    latest_round: Mutex<u128>,
}

impl RoundState {
    /// Returns a fresh state anchored at the given round.
    pub fn new(initial_round: u128) -> Self {
        Self { cache: Mutex::new(RoundCache::default()), latest_round: Mutex::new(initial_round) }
    }

    /// The cached relayer index for `round`.
    pub fn cached_index(&self, round: u128) -> Option<usize> {
        self.cache.lock().get(round)
    }

    /// Records the relayer index for `round`.
    pub fn insert_index(&self, round: u128, index: usize) {
        self.cache.lock().insert(round, index);
    }

    /// The hub's latest known round.
    pub fn latest_round(&self) -> u128 {
        *self.latest_round.lock()
    }

    /// Advances the latest known round.
    pub fn set_latest_round(&self, round: u128) {
        *self.latest_round.lock() = round;
    }
}
