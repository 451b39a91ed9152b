//! The per-request state machine behind Socket emissions.

use crate::{RelayMetrics, RoundState};
use alloy_primitives::{keccak256, Address, FixedBytes, U256};
use alloy_rpc_types_eth::TransactionReceipt;
use alloy_sol_types::SolCall;
use relayer_client::{ClientError, EthRpc, MultiChain};
use relayer_contracts::abi::{
    calls::{
        get_requestCall, get_signaturesCall, majorityCall, previous_majorityCall, pollCall,
        selected_relayersCall,
    },
    logs::{Signatures, SocketMessage},
};
use relayer_primitives::{ChainEventStatus, ChainId, EcdsaSignature, VALIDATOR_HISTORY_LIMIT};
use relayer_tasks::{
    now_ms, CallParams, EventHandler, EventQueue, HandlerError, RbcEvent, SendParams, WorkItem,
    CALL_DELAY_SEC,
};
use std::sync::Arc;

/// Gas headroom for aggregated ACCEPTED/REJECTED relays.
const AGGREGATED_RELAY_GAS: f64 = 5.0;

/// Gas headroom for outbound EXECUTED/REVERTED polls.
const OUTBOUND_EXECUTION_GAS: f64 = 2.0;

/// Drives each cross-chain request through its per-status action.
///
/// Inbound requests (`src_chain != hub`) vote and verify on the hub;
/// ACCEPTED/REJECTED take the aggregated slow path on the relay target,
/// where the primary relayer submits the hub-collected quorum of signatures
/// and every secondary backstops it after a deferral.
pub struct SocketRelayHandler<T> {
    chains: Arc<MultiChain<T>>,
    queue: Arc<EventQueue>,
    rounds: Arc<RoundState>,
    fast_relayer: bool,
    metrics: RelayMetrics,
}

impl<T: EthRpc> SocketRelayHandler<T> {
    /// Returns a new handler.
    pub fn new(
        chains: Arc<MultiChain<T>>,
        queue: Arc<EventQueue>,
        rounds: Arc<RoundState>,
        fast_relayer: bool,
    ) -> Self {
        Self { chains, queue, rounds, fast_relayer, metrics: RelayMetrics::default() }
    }

    fn hub_id(&self) -> ChainId {
        self.chains.network().hub()
    }

    fn relayer_address(&self) -> Address {
        self.chains.hub().address()
    }

    fn resolve(&self, tag: FixedBytes<4>) -> Option<ChainId> {
        ChainId::from_id_bytes(tag, self.chains.network())
    }

    /// The chain an ACCEPTED/REJECTED relay is submitted to: the source
    /// chain for inbound requests, the destination chain for outbound ones.
    fn relay_target(&self, event: &RbcEvent) -> Result<ChainId, HandlerError> {
        let tag = if event.is_inbound(self.hub_id()) {
            event.message.req_id.src_chain
        } else {
            event.message.instruction.dst_chain
        };
        self.resolve(tag)
            .ok_or_else(|| HandlerError::InvalidFlow(format!("unsupported relay target {tag}")))
    }

    fn sign_message(&self, raw: &[u8]) -> Result<EcdsaSignature, HandlerError> {
        Ok(self.chains.hub().sign_payload(keccak256(raw))?)
    }

    fn poll_params(
        &self,
        chain: ChainId,
        message: &SocketMessage,
        signatures: Signatures,
        gas_multiplier: f64,
    ) -> Result<SendParams, HandlerError> {
        let client = self
            .chains
            .get(chain)
            .ok_or_else(|| HandlerError::InvalidFlow(format!("unsupported chain {chain}")))?;
        let data = pollCall { message: message.clone(), signatures }.abi_encode();
        Ok(SendParams::new(chain, client.addresses().socket, data.into())
            .with_gas_multiplier(gas_multiplier))
    }

    async fn selected_relayers(&self, round: u128) -> Result<Vec<Address>, HandlerError> {
        let hub = self.chains.hub();
        let data = selected_relayersCall { round }.abi_encode();
        let returned = hub.call(hub.addresses().authority, data.into()).await?;
        Ok(selected_relayersCall::abi_decode_returns(&returned)?)
    }

    /// The membership gate: every event is "mine" in fast mode; otherwise
    /// the source chain must be supported and this relayer must sit in the
    /// validator set of the event's round, consulting the hub on a cache
    /// miss.
    async fn check_my_event(&self, event: &RbcEvent) -> Result<bool, HandlerError> {
        if self.fast_relayer {
            return Ok(true);
        }
        if self.resolve(event.message.req_id.src_chain).is_none() {
            tracing::warn!(
                target: "relayer::relay",
                id = %event.request_id(),
                "event from unsupported chain, dropping"
            );
            return Ok(false);
        }

        let round = event.round();
        if self.rounds.cached_index(round).is_some() {
            return Ok(true);
        }
        let mut relayers = self.selected_relayers(round).await?;
        relayers.sort();
        match relayers.iter().position(|addr| *addr == self.relayer_address()) {
            Some(index) => {
                self.rounds.insert_index(round, index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether this relayer is primary for the event:
    /// `block_number % set_len == cached index`.
    async fn is_primary(&self, event: &RbcEvent) -> Result<bool, HandlerError> {
        if self.fast_relayer {
            return Ok(true);
        }
        let Some(index) = self.rounds.cached_index(event.round()) else {
            return Ok(false);
        };
        let set_len = self.selected_relayers(event.round()).await?.len() as u128;
        if set_len == 0 {
            return Ok(false);
        }
        Ok(u128::from(event.block_number) % set_len == index as u128)
    }

    /// The vote threshold for `round`. Rounds beyond the hub's validator
    /// history report zero, which disarms quorum-based transitions.
    async fn quorum(&self, round: u128) -> Result<U256, HandlerError> {
        let current = self.rounds.latest_round();
        if round + VALIDATOR_HISTORY_LIMIT < current {
            return Ok(U256::ZERO);
        }
        let hub = self.chains.hub();
        let data = if round == current {
            majorityCall { is_initial: true }.abi_encode()
        } else {
            previous_majorityCall { round, is_initial: true }.abi_encode()
        };
        let returned = hub.call(hub.addresses().authority, data.into()).await?;
        Ok(if round == current {
            majorityCall::abi_decode_returns(&returned)?
        } else {
            previous_majorityCall::abi_decode_returns(&returned)?
        })
    }

    async fn request_status_on(
        &self,
        chain: ChainId,
        event: &RbcEvent,
    ) -> Result<u8, HandlerError> {
        let client = self
            .chains
            .get(chain)
            .ok_or_else(|| HandlerError::InvalidFlow(format!("unsupported chain {chain}")))?;
        let data = get_requestCall { id: event.message.req_id.clone() }.abi_encode();
        let returned = client.call(client.addresses().socket, data.into()).await?;
        Ok(get_requestCall::abi_decode_returns(&returned)?.status)
    }

    /// The ACCEPTED/REJECTED slow path shared by both statuses,
    /// parameterized by the expected already-processed status.
    async fn aggregated_relay(
        &self,
        event: &RbcEvent,
    ) -> Result<Option<SendParams>, HandlerError> {
        let target = self.relay_target(event)?;
        let expected_next = expected_next_status(event.status);

        let on_chain = self.request_status_on(target, event).await?;
        if on_chain == expected_next as u8 {
            tracing::info!(
                target: "relayer::relay",
                id = %event.request_id(),
                status = %event.status,
                "already processed, dropping"
            );
            self.metrics.already_processed.increment(1);
            return Ok(None);
        }

        if !event.aggregated || self.is_primary(event).await? {
            let hub = self.chains.hub();
            let data = get_signaturesCall {
                id: event.message.req_id.clone(),
                status: event.status as u8,
            }
            .abi_encode();
            let returned = hub.call(hub.addresses().socket, data.into()).await?;
            let signatures = get_signaturesCall::abi_decode_returns(&returned)?;

            self.metrics.aggregated_relays.increment(1);
            return Ok(Some(self.poll_params(
                target,
                &event.message,
                signatures,
                AGGREGATED_RELAY_GAS,
            )?));
        }

        // secondary: re-check after the delay and fall back to submitting
        // if the primary stayed silent.
        let mut deferred = event.clone();
        deferred.header.switch_to_call(now_ms() + CALL_DELAY_SEC * 1_000);
        self.queue.push(WorkItem::Rbc(deferred));
        Ok(None)
    }
}

const fn expected_next_status(status: ChainEventStatus) -> ChainEventStatus {
    match status {
        ChainEventStatus::Accepted => ChainEventStatus::Committed,
        _ => ChainEventStatus::Rollbacked,
    }
}

#[async_trait::async_trait]
impl<T: EthRpc> EventHandler for SocketRelayHandler<T> {
    async fn build_call(&self, item: &WorkItem) -> Result<Option<CallParams>, HandlerError> {
        let WorkItem::Rbc(event) = item else { return Ok(None) };
        match event.status {
            // quorum verification on the hub after the deferral.
            ChainEventStatus::Requested => {
                let hub = self.chains.hub();
                let data = get_requestCall { id: event.message.req_id.clone() }.abi_encode();
                Ok(Some(CallParams {
                    chain: self.hub_id(),
                    to: hub.addresses().socket,
                    data: data.into(),
                }))
            }
            // secondary wake-up: re-read the request on the relay target.
            ChainEventStatus::Accepted | ChainEventStatus::Rejected => {
                let target = self.relay_target(event)?;
                let client = self.chains.get(target).ok_or_else(|| {
                    HandlerError::InvalidFlow(format!("unsupported chain {target}"))
                })?;
                let data = get_requestCall { id: event.message.req_id.clone() }.abi_encode();
                Ok(Some(CallParams { chain: target, to: client.addresses().socket, data: data.into() }))
            }
            _ => Ok(None),
        }
    }

    async fn on_call_result(
        &self,
        item: &WorkItem,
        output: Result<alloy_primitives::Bytes, ClientError>,
    ) -> Result<Vec<WorkItem>, HandlerError> {
        let WorkItem::Rbc(event) = item else { return Ok(vec![]) };
        let output = match output {
            Ok(output) => output,
            Err(ClientError::Revert(reason)) => {
                tracing::warn!(target: "relayer::relay", id = %event.request_id(), %reason, "invalid flow on call");
                return Ok(vec![]);
            }
            Err(err) => return Err(err.into()),
        };
        let info = get_requestCall::abi_decode_returns(&output)?;

        match event.status {
            ChainEventStatus::Requested => {
                let quorum = self.quorum(event.round()).await?;
                let votes = info.vote_counts[ChainEventStatus::Requested as usize];
                if votes >= quorum {
                    // quorum reached, the protocol proceeds without us.
                    return Ok(vec![]);
                }
                let mut failed = event.clone_with_other_status(ChainEventStatus::Failed);
                failed.header.switch_to_send(now_ms());
                Ok(vec![WorkItem::Rbc(failed)])
            }
            ChainEventStatus::Accepted | ChainEventStatus::Rejected => {
                if info.status == expected_next_status(event.status) as u8 {
                    self.metrics.already_processed.increment(1);
                    return Ok(vec![]);
                }
                // the primary stayed silent; become the fallback submitter.
                let mut fallback = event.clone();
                fallback.aggregated = false;
                fallback.header.switch_to_send(now_ms());
                Ok(vec![WorkItem::Rbc(fallback)])
            }
            _ => Ok(vec![]),
        }
    }

    async fn build_send(&self, item: &WorkItem) -> Result<Option<SendParams>, HandlerError> {
        let WorkItem::Rbc(event) = item else { return Ok(None) };
        if !self.check_my_event(event).await? {
            self.metrics.not_mine.increment(1);
            return Ok(None);
        }

        let hub = self.hub_id();
        let inbound = event.is_inbound(hub);
        match event.status {
            // the hub treats an unsigned inbound poll as the initial vote.
            ChainEventStatus::Requested if inbound => {
                self.metrics.polls.increment(1);
                Ok(Some(self.poll_params(hub, &event.message, Signatures::empty(), 1.2)?))
            }
            ChainEventStatus::Requested => {
                let accepted = event.clone_with_other_status(ChainEventStatus::Accepted);
                let sig = self.sign_message(&accepted.raw)?;
                self.metrics.polls.increment(1);
                Ok(Some(self.poll_params(
                    hub,
                    &accepted.message,
                    Signatures::single(sig),
                    1.2,
                )?))
            }
            ChainEventStatus::Failed if inbound => {
                let sig = self.sign_message(&event.raw)?;
                self.metrics.polls.increment(1);
                Ok(Some(self.poll_params(hub, &event.message, Signatures::single(sig), 1.2)?))
            }
            ChainEventStatus::Failed => Ok(None),
            ChainEventStatus::Executed | ChainEventStatus::Reverted => {
                let advanced = event.clone_with_other_status(advanced_by_two(event.status));
                let sig = self.sign_message(&advanced.raw)?;
                let gas = if inbound { 1.2 } else { OUTBOUND_EXECUTION_GAS };
                self.metrics.polls.increment(1);
                Ok(Some(self.poll_params(hub, &advanced.message, Signatures::single(sig), gas)?))
            }
            ChainEventStatus::Accepted | ChainEventStatus::Rejected => {
                self.aggregated_relay(event).await
            }
            ChainEventStatus::Committed => {
                self.metrics.committed.increment(1);
                Ok(None)
            }
            ChainEventStatus::Rollbacked => {
                self.metrics.rollbacked.increment(1);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn on_tx_success(
        &self,
        item: &WorkItem,
        _receipt: &TransactionReceipt,
    ) -> Vec<WorkItem> {
        let WorkItem::Rbc(event) = item else { return vec![] };
        match event.status {
            // verify quorum once the vote had time to aggregate.
            ChainEventStatus::Requested if event.is_inbound(self.hub_id()) => {
                let mut verify = event.clone();
                verify.header.switch_to_call(now_ms() + CALL_DELAY_SEC * 1_000);
                vec![WorkItem::Rbc(verify)]
            }
            _ => vec![],
        }
    }

    async fn on_tx_fail(&self, item: &WorkItem) -> Vec<WorkItem> {
        let WorkItem::Rbc(event) = item else { return vec![] };
        let inbound = event.is_inbound(self.hub_id());
        match event.status {
            ChainEventStatus::Requested => {
                let mut failed = event.clone_with_other_status(ChainEventStatus::Failed);
                failed.header.switch_to_send(now_ms());
                vec![WorkItem::Rbc(failed)]
            }
            ChainEventStatus::Accepted if !inbound => {
                let mut rejected = event.clone_with_other_status(ChainEventStatus::Rejected);
                rejected.aggregated = false;
                rejected.header.switch_to_send(now_ms());
                vec![WorkItem::Rbc(rejected)]
            }
            ChainEventStatus::Accepted => {
                tracing::warn!(
                    target: "relayer::relay",
                    id = %event.request_id(),
                    "inbound accepted relay failed, invalid flow"
                );
                vec![]
            }
            _ => vec![],
        }
    }
}

const fn advanced_by_two(status: ChainEventStatus) -> ChainEventStatus {
    match status {
        ChainEventStatus::Executed => ChainEventStatus::Accepted,
        _ => ChainEventStatus::Rejected,
    }
}

impl<T> std::fmt::Debug for SocketRelayHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketRelayHandler")
            .field("fast_relayer", &self.fast_relayer)
            .finish()
    }
}
