//! The locally issued, monotone transaction nonce.

use crate::EthRpc;
use alloy_primitives::Address;
use alloy_transport::TransportResult;
use parking_lot::Mutex;

/// A per-account nonce counter, initialized lazily from
/// `eth_getTransactionCount(latest)` and advanced locally on every issued
/// transaction. Advanced only inside the send path, under the task manager's
/// serial dispatch.
#[derive(Debug, Default)]
pub(crate) struct NonceManager {
    next: Mutex<Option<u64>>,
}

impl NonceManager {
    /// Issues the next nonce for `address`.
    pub(crate) async fn next<T: EthRpc>(
        &self,
        rpc: &T,
        address: Address,
    ) -> TransportResult<u64> {
        {
            let mut guard = self.next.lock();
            if let Some(nonce) = *guard {
                *guard = Some(nonce + 1);
                return Ok(nonce);
            }
        }

        let nonce = rpc.transaction_count(address).await?;
        *self.next.lock() = Some(nonce + 1);
        Ok(nonce)
    }

    /// Forgets the local counter; the next issue re-reads the chain.
    pub(crate) fn reset(&self) {
        *self.next.lock() = None;
    }
}
