//! Shared fixtures for the handler scenario tests.
#![allow(dead_code)]

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolEvent;
use relayer_client::{
    test_utils::{test_client_with, MockRpc},
    AddressBook, MultiChain,
};
use relayer_contracts::abi::{
    calls::RequestInfo,
    logs::{Instruction, ReqId, Signatures, Socket, SocketMessage, TaskParams},
};
use relayer_handlers::{RoundState, RoundUpRelayHandler, SocketRelayHandler};
use relayer_primitives::{ChainEventStatus, ChainId, NetworkKind};
use relayer_tasks::{
    EventHandler, EventQueue, HandlerSet, RbcEvent, RoundUpEvent, TaskManager, WorkItem,
};
use std::{collections::HashMap, sync::Arc};

/// The Socket contract address used on every test chain.
pub const SOCKET: Address = Address::repeat_byte(0x51);
/// The authority contract address used on every test chain.
pub const AUTHORITY: Address = Address::repeat_byte(0x52);
/// The hub oracle address.
pub const ORACLE: Address = Address::repeat_byte(0x53);

/// A four-chain relayer over scripted transports.
pub struct Fixture {
    pub hub_rpc: MockRpc,
    pub eth_rpc: MockRpc,
    pub bnb_rpc: MockRpc,
    pub matic_rpc: MockRpc,
    pub chains: Arc<MultiChain<MockRpc>>,
    pub queue: Arc<EventQueue>,
    pub rounds: Arc<RoundState>,
    pub relayer: Address,
    pub manager: TaskManager<MockRpc>,
}

pub fn fixture(fast_relayer: bool) -> Fixture {
    let signer = PrivateKeySigner::random();
    let relayer = signer.address();

    let hub_rpc = MockRpc::default();
    let eth_rpc = MockRpc::default();
    let bnb_rpc = MockRpc::default();
    let matic_rpc = MockRpc::default();

    let addresses = AddressBook { socket: SOCKET, authority: AUTHORITY, oracle: Some(ORACLE) };
    let mut chains = MultiChain::new(NetworkKind::Mainnet);
    for (chain, rpc) in [
        (ChainId::Bifrost, hub_rpc.clone()),
        (ChainId::Ethereum, eth_rpc.clone()),
        (ChainId::Binance, bnb_rpc.clone()),
        (ChainId::Polygon, matic_rpc.clone()),
    ] {
        rpc.set_latest_height(100);
        chains.insert(test_client_with(chain, rpc, signer.clone(), addresses.clone()));
    }

    let chains = Arc::new(chains);
    let queue = Arc::new(EventQueue::new());
    let rounds = Arc::new(RoundState::new(0));

    let handlers = HandlerSet {
        rbc: Arc::new(SocketRelayHandler::new(
            chains.clone(),
            queue.clone(),
            rounds.clone(),
            fast_relayer,
        )) as Arc<dyn EventHandler>,
        roundup: Arc::new(RoundUpRelayHandler::new(
            chains.clone(),
            queue.clone(),
            rounds.clone(),
            fast_relayer,
        )) as Arc<dyn EventHandler>,
        periodic: HashMap::new(),
    };
    let manager = TaskManager::new(queue.clone(), chains.clone(), handlers);

    Fixture {
        hub_rpc,
        eth_rpc,
        bnb_rpc,
        matic_rpc,
        chains,
        queue,
        rounds,
        relayer,
        manager,
    }
}

pub fn hub_tag() -> FixedBytes<4> {
    ChainId::Bifrost.id_bytes()
}

pub fn eth_tag() -> FixedBytes<4> {
    ChainId::Ethereum.id_bytes()
}

/// A WARP_UNIFY method descriptor.
pub fn warp_unify_method() -> FixedBytes<16> {
    FixedBytes::from([0x01, 0x02, 0x01, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
}

/// Builds an observed Socket event.
pub fn socket_event(
    observed_on: ChainId,
    src: FixedBytes<4>,
    dst: FixedBytes<4>,
    round: u128,
    sequence: u128,
    status: ChainEventStatus,
    block_number: u64,
) -> RbcEvent {
    let message = SocketMessage {
        req_id: ReqId { src_chain: src, round, sequence },
        status: status as u8,
        instruction: Instruction { dst_chain: dst, method: warp_unify_method() },
        params: TaskParams {
            asset1: B256::repeat_byte(0x11),
            asset2: B256::repeat_byte(0x12),
            refund: Address::repeat_byte(0x21),
            to: Address::repeat_byte(0x22),
            amount: U256::from(1_000_000_000_000_000_000u128),
            variants: Bytes::new(),
        },
    };
    let raw = Socket { message: message.clone() }.encode_log_data().data;
    RbcEvent::new(observed_on, raw, message, status, block_number, 0)
}

/// Builds a committed RoundUp event, un-fanned-out.
pub fn roundup_event(round: u128, validators: Vec<Address>, block_number: u64) -> RoundUpEvent {
    RoundUpEvent::new(round, validators, Default::default(), block_number, 0)
}

/// The hub view of a request with the given status and REQUESTED vote count.
pub fn request_info(status: ChainEventStatus, requested_votes: u64) -> RequestInfo {
    let mut vote_counts = [U256::ZERO; 11];
    vote_counts[ChainEventStatus::Requested as usize] = U256::from(requested_votes);
    RequestInfo { status: status as u8, vote_counts }
}

/// A signature set with `n` distinct entries.
pub fn agg_signatures(n: usize) -> Signatures {
    Signatures {
        r: (0..n).map(|i| B256::repeat_byte(i as u8 + 1)).collect(),
        s: (0..n).map(|i| B256::repeat_byte(i as u8 + 0x80)).collect(),
        v: vec![27u8; n].into(),
    }
}

/// A sorted validator set of `extra + 1` members containing `relayer`, plus
/// the relayer's position within it.
pub fn sorted_set_with(relayer: Address, extra: usize) -> (Vec<Address>, usize) {
    let mut set: Vec<Address> =
        (0..extra).map(|i| Address::repeat_byte(i as u8 * 16 + 7)).collect();
    set.push(relayer);
    set.sort();
    let position = set.iter().position(|addr| *addr == relayer).unwrap();
    (set, position)
}

/// Pops every currently queued item.
pub fn drain_queue(queue: &EventQueue) -> Vec<WorkItem> {
    let mut items = Vec::new();
    while let Some(item) = queue.pop_now() {
        items.push(item);
    }
    items
}
