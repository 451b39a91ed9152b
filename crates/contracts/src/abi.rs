//! `sol!`-generated bindings, split into event and call surfaces.

pub mod calls;
pub mod logs;

use alloy_primitives::Log;
use alloy_sol_types::SolEvent;

/// Tries to decode the provided log into the type T.
pub fn try_decode_log<T: SolEvent>(log: &Log) -> Option<Log<T>> {
    T::decode_log(log).ok()
}
