//! End-to-end scenarios for the RBC state machine, driven through the task
//! manager over scripted transports.

mod common;

use common::*;

use alloy_primitives::{keccak256, FixedBytes, Signature, U256};
use alloy_sol_types::{SolCall, SolValue};
use relayer_client::test_utils::{decoded_input, decoded_to, mock_receipt};
use relayer_contracts::abi::calls::{
    get_requestCall, get_signaturesCall, majorityCall, pollCall, selected_relayersCall,
};
use relayer_primitives::{change_status, ChainEventStatus};
use relayer_tasks::{now_ms, TaskStatus, WorkItem, CALL_DELAY_SEC};

#[tokio::test]
async fn test_inbound_requested_votes_then_verifies_quorum() -> eyre::Result<()> {
    // Given: an inbound REQUESTED event for round 42, membership cached.
    let f = fixture(false);
    f.rounds.set_latest_round(42);
    f.rounds.insert_index(42, 0);
    let event = socket_event(
        relayer_primitives::ChainId::Ethereum,
        eth_tag(),
        hub_tag(),
        42,
        7,
        ChainEventStatus::Requested,
        10,
    );

    // When: the SendTx fires.
    f.manager.dispatch(WorkItem::Rbc(event)).await?;

    // Then: one unsigned poll went to the hub socket.
    let sent = f.hub_rpc.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(decoded_to(&sent[0])?, Some(SOCKET));
    let call = pollCall::abi_decode(&decoded_input(&sent[0])?)?;
    assert!(call.signatures.r.is_empty());
    assert_eq!(call.message.req_id.round, 42);
    assert_eq!(call.message.req_id.sequence, 7);

    // And: the receipt check matured into a deferred quorum verification.
    let receipt_check = f.queue.pop_now().expect("receipt check queued");
    assert_eq!(receipt_check.task_status(), TaskStatus::CheckReceipt);
    f.hub_rpc.push_receipt(Some(mock_receipt(true)));
    f.manager.dispatch(receipt_check).await?;

    let verify = f.queue.pop_now().expect("deferred verification queued");
    assert_eq!(verify.task_status(), TaskStatus::CallTx);
    assert!(verify.time_lock() >= now_ms() + (CALL_DELAY_SEC - 10) * 1_000);

    // When: quorum was reached by the deferral deadline.
    f.hub_rpc.push_call_response(
        get_requestCall::SELECTOR,
        request_info(ChainEventStatus::Requested, 5).abi_encode(),
    );
    f.hub_rpc.push_call_response(majorityCall::SELECTOR, U256::from(3).abi_encode());
    f.manager.dispatch(verify).await?;

    // Then: no further submission.
    assert!(f.queue.pop_now().is_none());
    assert_eq!(f.hub_rpc.sent_transactions().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_inbound_requested_missing_quorum_fails_once() -> eyre::Result<()> {
    // Given: the deferred verification finds 1 vote against a majority of 3.
    let f = fixture(false);
    f.rounds.set_latest_round(42);
    f.rounds.insert_index(42, 0);
    let mut verify = socket_event(
        relayer_primitives::ChainId::Ethereum,
        eth_tag(),
        hub_tag(),
        42,
        7,
        ChainEventStatus::Requested,
        10,
    );
    verify.header.switch_to_call(0);

    f.hub_rpc.push_call_response(
        get_requestCall::SELECTOR,
        request_info(ChainEventStatus::Requested, 1).abi_encode(),
    );
    f.hub_rpc.push_call_response(majorityCall::SELECTOR, U256::from(3).abi_encode());

    // When
    f.manager.dispatch(WorkItem::Rbc(verify)).await?;

    // Then: a FAILED submission follows, exactly once.
    let failed = f.queue.pop_now().expect("failed successor queued");
    assert_eq!(failed.task_status(), TaskStatus::SendTx);
    f.manager.dispatch(failed).await?;

    let sent = f.hub_rpc.sent_transactions();
    assert_eq!(sent.len(), 1);
    let call = pollCall::abi_decode(&decoded_input(&sent[0])?)?;
    assert_eq!(call.message.status, ChainEventStatus::Failed as u8);
    assert_eq!(call.signatures.r.len(), 1);
    assert!(f.queue.pop_now().is_some_and(|item| item.task_status() == TaskStatus::CheckReceipt));

    Ok(())
}

#[tokio::test]
async fn test_outbound_requested_signs_accepted_payload() -> eyre::Result<()> {
    // Given: an outbound REQUESTED event.
    let f = fixture(false);
    f.rounds.set_latest_round(100);
    f.rounds.insert_index(100, 1);
    let event = socket_event(
        relayer_primitives::ChainId::Bifrost,
        hub_tag(),
        eth_tag(),
        100,
        9,
        ChainEventStatus::Requested,
        5,
    );
    let raw = event.raw.clone();

    // When
    f.manager.dispatch(WorkItem::Rbc(event)).await?;

    // Then: the poll carries the ACCEPTED-status payload and a signature
    // that recovers to this relayer over exactly that payload.
    let sent = f.hub_rpc.sent_transactions();
    assert_eq!(sent.len(), 1);
    let call = pollCall::abi_decode(&decoded_input(&sent[0])?)?;
    assert_eq!(call.message.status, ChainEventStatus::Accepted as u8);
    assert_eq!(call.signatures.r.len(), 1);

    let digest = keccak256(change_status(&raw, ChainEventStatus::Accepted));
    let signature = Signature::new(
        U256::from_be_bytes(call.signatures.r[0].0),
        U256::from_be_bytes(call.signatures.s[0].0),
        call.signatures.v[0] == 28,
    );
    assert_eq!(signature.recover_address_from_prehash(&digest)?, f.relayer);

    Ok(())
}

#[tokio::test]
async fn test_outbound_accepted_primary_relays_aggregated_signatures() -> eyre::Result<()> {
    // Given: an ACCEPTED event on the hub for (BIFROST, 100, 3),
    // destination ETHEREUM, and this relayer is primary for the event.
    let f = fixture(false);
    f.rounds.set_latest_round(100);
    let (set, position) = sorted_set_with(f.relayer, 3);
    f.rounds.insert_index(100, position);
    let event = socket_event(
        relayer_primitives::ChainId::Bifrost,
        hub_tag(),
        eth_tag(),
        100,
        3,
        ChainEventStatus::Accepted,
        position as u64, // block % 4 == position
    );

    f.eth_rpc.push_call_response(
        get_requestCall::SELECTOR,
        request_info(ChainEventStatus::Accepted, 0).abi_encode(),
    );
    f.hub_rpc.push_call_response(selected_relayersCall::SELECTOR, set.abi_encode());
    f.hub_rpc.push_call_response(get_signaturesCall::SELECTOR, agg_signatures(3).abi_encode());

    // When
    f.manager.dispatch(WorkItem::Rbc(event)).await?;

    // Then: one submission on Ethereum carrying the hub-collected quorum.
    let sent = f.eth_rpc.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(decoded_to(&sent[0])?, Some(SOCKET));
    let call = pollCall::abi_decode(&decoded_input(&sent[0])?)?;
    assert_eq!(call.signatures.r.len(), 3);
    assert!(f.hub_rpc.sent_transactions().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_secondary_becomes_fallback_submitter() -> eyre::Result<()> {
    // Given: the same ACCEPTED event, but this relayer is not
    // primary.
    let f = fixture(false);
    f.rounds.set_latest_round(100);
    let (set, position) = sorted_set_with(f.relayer, 3);
    f.rounds.insert_index(100, position);
    let event = socket_event(
        relayer_primitives::ChainId::Bifrost,
        hub_tag(),
        eth_tag(),
        100,
        3,
        ChainEventStatus::Accepted,
        position as u64 + 1, // block % 4 != position
    );

    f.eth_rpc.push_call_response(
        get_requestCall::SELECTOR,
        request_info(ChainEventStatus::Accepted, 0).abi_encode(),
    );
    f.hub_rpc.push_call_response(selected_relayersCall::SELECTOR, set.abi_encode());

    // When: the SendTx fires at time T.
    f.manager.dispatch(WorkItem::Rbc(event)).await?;

    // Then: nothing was sent; a deferred re-check sits at T + 600s.
    assert!(f.eth_rpc.sent_transactions().is_empty());
    let deferred = f.queue.pop_now().expect("deferral queued");
    assert_eq!(deferred.task_status(), TaskStatus::CallTx);
    assert!(deferred.time_lock() >= now_ms() + (CALL_DELAY_SEC - 10) * 1_000);

    // When: at T + 600s the request still sits at ACCEPTED.
    f.eth_rpc.push_call_response(
        get_requestCall::SELECTOR,
        request_info(ChainEventStatus::Accepted, 0).abi_encode(),
    );
    f.manager.dispatch(deferred).await?;

    let fallback = f.queue.pop_now().expect("fallback queued");
    assert_eq!(fallback.task_status(), TaskStatus::SendTx);

    // Then: the fallback submits exactly once, without a primary check.
    f.eth_rpc.push_call_response(
        get_requestCall::SELECTOR,
        request_info(ChainEventStatus::Accepted, 0).abi_encode(),
    );
    f.hub_rpc.push_call_response(get_signaturesCall::SELECTOR, agg_signatures(3).abi_encode());
    f.manager.dispatch(fallback).await?;

    assert_eq!(f.eth_rpc.sent_transactions().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_already_processed_accepted_is_dropped() -> eyre::Result<()> {
    // Given: the destination already advanced the request to COMMITTED.
    let f = fixture(true);
    let event = socket_event(
        relayer_primitives::ChainId::Bifrost,
        hub_tag(),
        eth_tag(),
        100,
        3,
        ChainEventStatus::Accepted,
        7,
    );
    f.eth_rpc.push_call_response(
        get_requestCall::SELECTOR,
        request_info(ChainEventStatus::Committed, 0).abi_encode(),
    );

    // When
    f.manager.dispatch(WorkItem::Rbc(event)).await?;

    // Then
    assert!(f.eth_rpc.sent_transactions().is_empty());
    assert!(f.queue.pop_now().is_none());

    Ok(())
}

#[tokio::test]
async fn test_unsupported_source_chain_is_dropped() -> eyre::Result<()> {
    // Given: a non-fast relayer and an event from an unknown network tag.
    let f = fixture(false);
    let event = socket_event(
        relayer_primitives::ChainId::Ethereum,
        FixedBytes::from([0xde, 0xad, 0xbe, 0xef]),
        hub_tag(),
        42,
        1,
        ChainEventStatus::Requested,
        10,
    );

    // When
    f.manager.dispatch(WorkItem::Rbc(event)).await?;

    // Then
    assert!(f.hub_rpc.sent_transactions().is_empty());
    assert!(f.queue.pop_now().is_none());

    Ok(())
}

#[tokio::test]
async fn test_terminal_statuses_submit_nothing() -> eyre::Result<()> {
    let f = fixture(true);
    for status in [ChainEventStatus::Committed, ChainEventStatus::Rollbacked] {
        let event = socket_event(
            relayer_primitives::ChainId::Bifrost,
            hub_tag(),
            eth_tag(),
            100,
            1,
            status,
            7,
        );
        f.manager.dispatch(WorkItem::Rbc(event)).await?;
    }
    assert!(f.hub_rpc.sent_transactions().is_empty());
    assert!(f.eth_rpc.sent_transactions().is_empty());
    assert!(f.queue.pop_now().is_none());

    Ok(())
}
