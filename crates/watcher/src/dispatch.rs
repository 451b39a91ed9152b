//! Maps discovered logs onto typed work items.
//!
//! The discriminator is the log's first topic; the status byte at the
//! canonical payload offset selects the per-status handler downstream.

use crate::DetectedEvent;
use alloy_sol_types::SolEvent;
use relayer_contracts::abi::logs::{RoundUp, Socket};
use relayer_primitives::{AggregatedSignatures, ChainEventStatus};
use relayer_tasks::{now_ms, RbcEvent, RoundUpEvent, WorkItem};

/// Builds the work item for a discovered log, if it is one the relayer
/// handles.
///
/// During bootstrap the item carries `time_lock = 0`, which suppresses
/// delayed-status handling downstream; steady-state items release
/// immediately. `RoundUp` emissions other than `NEXT_AUTHORITY_COMMITTED`
/// carry nothing actionable and map to `None`.
pub fn into_work_item(event: &DetectedEvent, is_bootstrap: bool) -> Option<WorkItem> {
    let topic0 = *event.log.topics().first()?;
    let block_number = event.log.block_number?;
    let time_lock = if is_bootstrap { 0 } else { now_ms() };

    if topic0 == Socket::SIGNATURE_HASH {
        let decoded = match Socket::decode_log(&event.log.inner) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(target: "relayer::watcher", chain = %event.chain, %err, "undecodable socket log");
                return None;
            }
        };
        let message = decoded.data.message;
        let status = match message.event_status() {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(target: "relayer::watcher", chain = %event.chain, %err, "socket log with unknown status");
                return None;
            }
        };
        let raw = event.log.inner.data.data.clone();
        return Some(WorkItem::Rbc(RbcEvent::new(
            event.chain,
            raw,
            message,
            status,
            block_number,
            time_lock,
        )));
    }

    if topic0 == RoundUp::SIGNATURE_HASH {
        let decoded = match RoundUp::decode_log(&event.log.inner) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(target: "relayer::watcher", chain = %event.chain, %err, "undecodable roundup log");
                return None;
            }
        };
        let RoundUp { status, roundup } = decoded.data;
        if ChainEventStatus::try_from(status) != Ok(ChainEventStatus::NextAuthorityCommitted) {
            tracing::debug!(target: "relayer::watcher", chain = %event.chain, status, "ignoring non-committed roundup");
            return None;
        }
        return Some(WorkItem::RoundUp(RoundUpEvent::new(
            roundup.round,
            roundup.new_relayers,
            AggregatedSignatures::from(roundup.sigs),
            block_number,
            time_lock,
        )));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, FixedBytes, LogData, B256, U256};
    use relayer_contracts::abi::logs::{
        Instruction, ReqId, RoundUpSubmit, Signatures, SocketMessage, TaskParams,
    };
    use relayer_primitives::ChainId;

    fn as_rpc_log(data: LogData, block_number: u64) -> alloy_rpc_types_eth::Log {
        let inner =
            alloy_primitives::Log::new(Address::ZERO, data.topics().to_vec(), data.data.clone())
                .unwrap();
        alloy_rpc_types_eth::Log {
            inner,
            block_hash: Some(B256::ZERO),
            block_number: Some(block_number),
            block_timestamp: None,
            transaction_hash: Some(B256::ZERO),
            transaction_index: Some(0),
            log_index: Some(0),
            removed: false,
        }
    }

    fn socket_log(status: ChainEventStatus) -> alloy_rpc_types_eth::Log {
        let message = SocketMessage {
            req_id: ReqId { src_chain: FixedBytes::from([0, 0, 0, 1]), round: 3, sequence: 8 },
            status: status as u8,
            instruction: Instruction {
                dst_chain: ChainId::Bifrost.id_bytes(),
                method: FixedBytes::ZERO,
            },
            params: TaskParams {
                asset1: B256::ZERO,
                asset2: B256::ZERO,
                refund: Address::ZERO,
                to: Address::ZERO,
                amount: U256::ZERO,
                variants: Bytes::new(),
            },
        };
        as_rpc_log(Socket { message }.encode_log_data(), 77)
    }

    fn roundup_log(status: ChainEventStatus, round: u128) -> alloy_rpc_types_eth::Log {
        let roundup = RoundUpSubmit {
            round,
            new_relayers: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            sigs: Signatures::empty(),
        };
        as_rpc_log(RoundUp { status: status as u8, roundup }.encode_log_data(), 99)
    }

    #[test]
    fn test_socket_log_maps_to_rbc_item() {
        let event = DetectedEvent {
            chain: ChainId::Ethereum,
            log: socket_log(ChainEventStatus::Requested),
        };

        let item = into_work_item(&event, false).expect("rbc item");
        match item {
            WorkItem::Rbc(rbc) => {
                assert_eq!(rbc.status, ChainEventStatus::Requested);
                assert_eq!(rbc.block_number, 77);
                assert_eq!(rbc.request_id().sequence, 8);
                assert!(rbc.header.time_lock > 0);
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn test_bootstrap_marker_zeroes_time_lock() {
        let event = DetectedEvent {
            chain: ChainId::Ethereum,
            log: socket_log(ChainEventStatus::Executed),
        };
        let item = into_work_item(&event, true).expect("rbc item");
        assert_eq!(item.time_lock(), 0);
    }

    #[test]
    fn test_roundup_log_maps_only_when_committed() {
        let committed = DetectedEvent {
            chain: ChainId::Bifrost,
            log: roundup_log(ChainEventStatus::NextAuthorityCommitted, 200),
        };
        let relayed = DetectedEvent {
            chain: ChainId::Bifrost,
            log: roundup_log(ChainEventStatus::NextAuthorityRelayed, 200),
        };

        match into_work_item(&committed, false) {
            Some(WorkItem::RoundUp(event)) => {
                assert_eq!(event.round, 200);
                assert_eq!(event.new_relayers.len(), 2);
                assert!(event.selected_chain.is_none());
            }
            other => panic!("unexpected item {other:?}"),
        }
        assert!(into_work_item(&relayed, false).is_none());
    }

    #[test]
    fn test_foreign_log_is_ignored() {
        let mut log = socket_log(ChainEventStatus::Requested);
        log.inner.data = LogData::new(vec![B256::repeat_byte(0xEE)], Bytes::new()).unwrap();
        let event = DetectedEvent { chain: ChainId::Ethereum, log };
        assert!(into_work_item(&event, false).is_none());
    }
}
