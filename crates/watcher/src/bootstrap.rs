//! Historical replay on startup.
//!
//! Selects a block range reaching ~5 rounds back on the hub, time-aligns the
//! range on every peripheral chain, replays the watched logs through the
//! dispatcher, and enqueues only the requests that are still in flight.

use crate::{dispatch::into_work_item, DetectedEvent, EventScanner, WatcherError};
use alloy_sol_types::SolCall;
use relayer_client::{EthClient, EthRpc, MultiChain};
use relayer_contracts::abi::calls::round_infoCall;
use relayer_primitives::{ChainEventStatus, ChainId, RequestId, VALIDATOR_HISTORY_LIMIT};
use relayer_tasks::{now_ms, EventQueue, RbcEvent, RoundUpEvent, WorkItem};
use std::{collections::HashMap, time::Duration};

/// How many rounds back the hub replay reaches.
pub const HUB_ROUND_LOOKBACK: u64 = 5;

/// The sleep between sync probes while the hub node is catching up.
const SYNC_POLL: Duration = Duration::from_secs(60);

/// The timestamp tolerance of the peripheral-height search, in seconds.
const TIMESTAMP_TOLERANCE_SEC: u64 = 30;

/// Conservative bias subtracted from the target timestamp off-hub.
const OFF_HUB_BIAS_SEC: u64 = 30;

/// What the bootstrap left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapOutcome {
    /// The hub's current validator round at bootstrap time.
    pub current_round: u128,
    /// The number of work items enqueued.
    pub enqueued: usize,
}

/// Replays historical logs into the queue and hands the scanners over to
/// steady-state scanning.
pub async fn bootstrap<T: EthRpc + 'static>(
    chains: &MultiChain<T>,
    scanners: &mut [EventScanner<T>],
    queue: &EventQueue,
) -> Result<BootstrapOutcome, WatcherError> {
    let hub = chains.hub();

    while hub.syncing().await? {
        tracing::info!(target: "relayer::bootstrap", "hub node is syncing, waiting");
        tokio::time::sleep(SYNC_POLL).await;
    }

    let returned = hub
        .call(hub.addresses().authority, round_infoCall {}.abi_encode().into())
        .await?;
    let info = round_infoCall::abi_decode_returns(&returned)?;
    let current_round = info.current_round_index;

    let hub_target =
        info.current_height.saturating_sub(HUB_ROUND_LOOKBACK * info.round_length).max(1);
    let hub_target_ts = hub.block(hub_target).await?.header.timestamp;
    tracing::info!(
        target: "relayer::bootstrap",
        current_round,
        hub_target,
        "replaying from ~{HUB_ROUND_LOOKBACK} rounds back"
    );

    let mut rbc_events = Vec::new();
    let mut roundups = Vec::new();

    for scanner in scanners.iter_mut() {
        let chain = scanner.chain();
        let Some(client) = chains.get(chain) else {
            tracing::warn!(target: "relayer::bootstrap", %chain, "scanner without client, skipping");
            continue;
        };

        let to = client.matured_height().await?;
        let from = if chain.is_hub() {
            hub_target.min(to)
        } else {
            let target_ts = hub_target_ts.saturating_sub(OFF_HUB_BIAS_SEC);
            find_height_by_timestamp(
                client,
                scanner.latest_scanned_height().max(1),
                to,
                target_ts,
            )
            .await?
        };

        let logs = scanner.scan_range(from, to).await?;
        tracing::debug!(target: "relayer::bootstrap", %chain, from, to, count = logs.len(), "replayed range");

        for log in logs {
            match into_work_item(&DetectedEvent { chain, log }, true) {
                Some(WorkItem::Rbc(event)) => rbc_events.push(event),
                Some(WorkItem::RoundUp(event)) => roundups.push(event),
                _ => {}
            }
        }

        scanner.set_latest_scanned_height(to + 1);
    }

    let hub_id = chains.network().hub();
    let now = now_ms();
    let mut enqueued = 0;

    for mut event in dedup_rbc_events(rbc_events, hub_id, current_round) {
        event.header.time_lock = now;
        queue.push(WorkItem::Rbc(event));
        enqueued += 1;
    }

    // only the newest committed rotation matters.
    if let Some(mut newest) = roundups.into_iter().max_by_key(|event| event.block_number) {
        newest.header.time_lock = now;
        queue.push(WorkItem::RoundUp(newest));
        enqueued += 1;
    }

    tracing::info!(target: "relayer::bootstrap", enqueued, "bootstrap complete");
    Ok(BootstrapOutcome { current_round, enqueued })
}

/// Binary-searches the height whose timestamp lies within 30s of `target_ts`.
async fn find_height_by_timestamp<T: EthRpc>(
    client: &EthClient<T>,
    mut front: u64,
    mut rear: u64,
    target_ts: u64,
) -> Result<u64, WatcherError> {
    loop {
        if front + 1 >= rear {
            return Ok(front);
        }
        let medium = front + (rear - front) / 2;
        let ts = client.block(medium).await?.header.timestamp;
        if ts.abs_diff(target_ts) < TIMESTAMP_TOLERANCE_SEC {
            return Ok(medium);
        }
        if ts < target_ts {
            front = medium;
        } else {
            rear = medium;
        }
    }
}

/// Collapses each request to its latest observed status and drops requests
/// that are finalized or too old for the hub's validator history.
fn dedup_rbc_events(
    events: Vec<RbcEvent>,
    hub: ChainId,
    current_round: u128,
) -> Vec<RbcEvent> {
    let mut groups: HashMap<RequestId, RbcEvent> = HashMap::new();
    for event in events {
        let id = event.request_id();
        match groups.entry(id) {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                if prefer(&event, slot.get(), hub) {
                    slot.insert(event);
                }
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(event);
            }
        }
    }

    let mut survivors: Vec<_> = groups
        .into_values()
        .filter(|event| {
            if event.status.is_final() {
                tracing::debug!(target: "relayer::bootstrap", id = %event.request_id(), "dropping finalized request");
                return false;
            }
            if event.round() + VALIDATOR_HISTORY_LIMIT < current_round {
                tracing::debug!(target: "relayer::bootstrap", id = %event.request_id(), round = event.round(), "dropping out-of-history request");
                return false;
            }
            true
        })
        .collect();
    survivors.sort_by_key(|event| event.request_id());
    survivors
}

/// Whether `candidate` carries a later status than `incumbent`: outbound
/// requests follow the commit-priority order, inbound requests the raw
/// status value.
fn prefer(candidate: &RbcEvent, incumbent: &RbcEvent, hub: ChainId) -> bool {
    if candidate.is_inbound(hub) {
        candidate.status as u8 > incumbent.status as u8
    } else {
        outbound_rank(candidate.status) < outbound_rank(incumbent.status)
    }
}

fn outbound_rank(status: ChainEventStatus) -> u8 {
    match status {
        ChainEventStatus::Committed => 0,
        ChainEventStatus::Rollbacked => 1,
        ChainEventStatus::Executed => 2,
        ChainEventStatus::Reverted => 3,
        ChainEventStatus::Accepted => 4,
        ChainEventStatus::Rejected => 5,
        ChainEventStatus::Requested => 6,
        ChainEventStatus::Failed => 7,
        // never emitted for requests; lowest priority.
        _ => u8::MAX,
    }
}
