//! Scanner behavior over a scripted transport.

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::SolEvent;
use relayer_client::test_utils::{test_client, MockRpc};
use relayer_contracts::abi::logs::{
    Instruction, ReqId, Socket, SocketMessage, TaskParams,
};
use relayer_primitives::{ChainEventStatus, ChainId};
use relayer_watcher::{EventScanner, ScanTarget};
use std::{sync::Arc, time::Duration};

const SOCKET: Address = Address::repeat_byte(0x51);

fn scanner(
    rpc: MockRpc,
    start_height: u64,
    max_log_window: u64,
) -> (EventScanner<MockRpc>, tokio::sync::mpsc::Receiver<relayer_watcher::DetectedEvent>) {
    let client = Arc::new(test_client(ChainId::Ethereum, rpc));
    EventScanner::new(
        client,
        vec![ScanTarget { address: SOCKET, topic0: Socket::SIGNATURE_HASH }],
        start_height,
        max_log_window,
        Duration::from_secs(3),
    )
}

fn socket_log(block_number: u64) -> alloy_rpc_types_eth::Log {
    let message = SocketMessage {
        req_id: ReqId { src_chain: ChainId::Ethereum.id_bytes(), round: 1, sequence: 1 },
        status: ChainEventStatus::Requested as u8,
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
    let data = Socket { message }.encode_log_data();
    let inner =
        alloy_primitives::Log::new(SOCKET, data.topics().to_vec(), data.data.clone()).unwrap();
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

fn filter_range(filter: &alloy_rpc_types_eth::Filter) -> (u64, u64) {
    (
        filter.block_option.get_from_block().and_then(|b| b.as_number()).unwrap(),
        filter.block_option.get_to_block().and_then(|b| b.as_number()).unwrap(),
    )
}

#[tokio::test]
async fn test_scan_respects_finality_and_advances_monotonically() -> eyre::Result<()> {
    // Given: latest height 100 with a finality depth of 5.
    let rpc = MockRpc::default();
    rpc.set_latest_height(100);
    let (mut scanner, mut events) = scanner(rpc.clone(), 90, 1_000);
    rpc.push_logs(vec![socket_log(93)]);

    // When
    scanner.step().await?;

    // Then: exactly [90, 95] was queried and the log emitted.
    let filters = rpc.log_filters();
    assert_eq!(filters.len(), 1);
    assert_eq!(filter_range(&filters[0]), (90, 95));
    assert_eq!(scanner.latest_scanned_height(), 96);
    let event = events.try_recv()?;
    assert_eq!(event.chain, ChainId::Ethereum);
    assert_eq!(event.log.block_number, Some(93));

    // When: no new matured blocks.
    scanner.step().await?;

    // Then: no query fired and the cursor held.
    assert_eq!(rpc.log_filters().len(), 1);
    assert_eq!(scanner.latest_scanned_height(), 96);

    // When: the chain advances.
    rpc.set_latest_height(102);
    scanner.step().await?;

    // Then: the next range starts exactly where the last ended.
    let filters = rpc.log_filters();
    assert_eq!(filter_range(&filters[1]), (96, 97));
    assert_eq!(scanner.latest_scanned_height(), 98);

    Ok(())
}

#[tokio::test]
async fn test_ranges_split_into_bounded_windows() -> eyre::Result<()> {
    // Given: 96 matured blocks and a 40-block window.
    let rpc = MockRpc::default();
    rpc.set_latest_height(100);
    let (mut scanner, _events) = scanner(rpc.clone(), 0, 40);

    // When
    scanner.step().await?;

    // Then: three windows cover [0, 95].
    let ranges: Vec<_> = rpc.log_filters().iter().map(filter_range).collect();
    assert_eq!(ranges, vec![(0, 39), (40, 79), (80, 95)]);

    Ok(())
}

#[tokio::test]
async fn test_provider_timeout_halves_the_window() -> eyre::Result<()> {
    // Given: the provider times out above 10-block ranges, window 16.
    let rpc = MockRpc::default();
    rpc.set_latest_height(20);
    rpc.set_log_window_limit(10);
    let (mut scanner, _events) = scanner(rpc.clone(), 0, 16);

    // When
    scanner.step().await?;

    // Then: the 16-block window split into served halves and the bound
    // shrank permanently.
    let ranges: Vec<_> = rpc.log_filters().iter().map(filter_range).collect();
    assert_eq!(ranges[0], (0, 7));
    assert_eq!(ranges[1], (8, 15));
    assert!(scanner.max_log_window() < 16);
    assert_eq!(scanner.latest_scanned_height(), 16);

    Ok(())
}
