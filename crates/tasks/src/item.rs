//! The heterogeneous work items flowing through the event queue.

use alloy_primitives::{Address, Bytes, B256};
use relayer_contracts::abi::logs::SocketMessage;
use relayer_primitives::{
    change_status, AggregatedSignatures, ChainEventStatus, ChainId, RequestId,
};
use std::time::{SystemTime, UNIX_EPOCH};

/// The current wall-clock time in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}

/// The lifecycle stage of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Perform a read-only contract call.
    CallTx,
    /// Build and submit a transaction.
    SendTx,
    /// Check the receipt of a submitted transaction.
    CheckReceipt,
}

/// Locates the transaction whose receipt a `CheckReceipt` item waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptParams {
    /// The chain the transaction was submitted to.
    pub chain: ChainId,
    /// The submitted transaction hash.
    pub tx_hash: B256,
}

/// Fields common to every work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHeader {
    /// The earliest wall-clock millisecond this item may be dispatched.
    pub time_lock: u64,
    /// The lifecycle stage.
    pub status: TaskStatus,
    /// The receipt target, present only in the `CheckReceipt` stage.
    pub receipt: Option<ReceiptParams>,
}

impl TaskHeader {
    /// A fresh `SendTx` header released at `time_lock`.
    pub const fn send_at(time_lock: u64) -> Self {
        Self { time_lock, status: TaskStatus::SendTx, receipt: None }
    }

    /// Moves to the `CallTx` stage, released at `time_lock`.
    pub fn switch_to_call(&mut self, time_lock: u64) {
        self.status = TaskStatus::CallTx;
        self.time_lock = time_lock;
        self.receipt = None;
    }

    /// Moves to the `SendTx` stage, released at `time_lock`.
    pub fn switch_to_send(&mut self, time_lock: u64) {
        self.status = TaskStatus::SendTx;
        self.time_lock = time_lock;
        self.receipt = None;
    }

    /// Moves to the `CheckReceipt` stage for the given transaction.
    pub fn switch_to_receipt(&mut self, chain: ChainId, tx_hash: B256, time_lock: u64) {
        self.status = TaskStatus::CheckReceipt;
        self.time_lock = time_lock;
        self.receipt = Some(ReceiptParams { chain, tx_hash });
    }
}

/// One observed state transition of one cross-chain request.
///
/// The raw payload and the decoded message travel together; status edits go
/// through [`RbcEvent::clone_with_other_status`], which allocates a new
/// event with the status word rewritten in both forms.
#[derive(Debug, Clone)]
pub struct RbcEvent {
    /// The common work-item fields.
    pub header: TaskHeader,
    /// The chain the event was observed on.
    pub chain: ChainId,
    /// The raw event payload.
    pub raw: Bytes,
    /// The decoded payload.
    pub message: SocketMessage,
    /// The decoded request status.
    pub status: ChainEventStatus,
    /// The block the event was emitted in.
    pub block_number: u64,
    /// Whether the aggregated slow path is still pending for this relayer.
    pub aggregated: bool,
}

impl RbcEvent {
    /// Builds an event from a decoded Socket emission.
    pub fn new(
        chain: ChainId,
        raw: Bytes,
        message: SocketMessage,
        status: ChainEventStatus,
        block_number: u64,
        time_lock: u64,
    ) -> Self {
        Self {
            header: TaskHeader::send_at(time_lock),
            chain,
            raw,
            message,
            status,
            block_number,
            aggregated: true,
        }
    }

    /// The request's primary key.
    pub fn request_id(&self) -> RequestId {
        self.message.request_id()
    }

    /// The round the request was opened in.
    pub fn round(&self) -> u128 {
        self.message.req_id.round
    }

    /// Whether the request originated off-hub.
    pub fn is_inbound(&self, hub: ChainId) -> bool {
        self.message.req_id.src_chain != hub.id_bytes()
    }

    /// A new event carrying `status`, with the raw payload's status word
    /// rewritten to match. The original is left untouched.
    pub fn clone_with_other_status(&self, status: ChainEventStatus) -> Self {
        let mut cloned = self.clone();
        cloned.raw = change_status(&self.raw, status);
        cloned.message.status = status as u8;
        cloned.status = status;
        cloned
    }
}

/// A hub validator-rotation emission, optionally pinned to one destination
/// chain by the fan-out.
#[derive(Debug, Clone)]
pub struct RoundUpEvent {
    /// The common work-item fields.
    pub header: TaskHeader,
    /// The rotated-in round.
    pub round: u128,
    /// The new validator set, as emitted.
    pub new_relayers: Vec<Address>,
    /// The signatures carried by the emission.
    pub sigs: AggregatedSignatures,
    /// The hub block the event was emitted in.
    pub block_number: u64,
    /// The destination chain, set per clone by the fan-out.
    pub selected_chain: Option<ChainId>,
    /// Whether the aggregated slow path is still pending for this relayer.
    pub aggregated: bool,
}

impl RoundUpEvent {
    /// Builds an un-fanned-out event from a decoded emission.
    pub fn new(
        round: u128,
        new_relayers: Vec<Address>,
        sigs: AggregatedSignatures,
        block_number: u64,
        time_lock: u64,
    ) -> Self {
        Self {
            header: TaskHeader::send_at(time_lock),
            round,
            new_relayers,
            sigs,
            block_number,
            selected_chain: None,
            aggregated: true,
        }
    }

    /// A clone pinned to one destination chain.
    pub fn for_chain(&self, chain: ChainId) -> Self {
        let mut cloned = self.clone();
        cloned.selected_chain = Some(chain);
        cloned
    }
}

/// The recurring tasks the relayer self-schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodicKind {
    /// Hub session liveness signal.
    Heartbeat,
    /// Asset price submission.
    PriceFeed,
    /// Bitcoin block hash submission.
    BtcHashFeed,
    /// Validator round probe.
    RoundProbe,
}

/// A recurring work item. Every completed attempt enqueues
/// [`PeriodicTask::clone_next`] exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicTask {
    /// The common work-item fields.
    pub header: TaskHeader,
    /// Which recurring task this is.
    pub kind: PeriodicKind,
    /// The nominal period, in milliseconds.
    pub period_ms: u64,
}

impl PeriodicTask {
    /// A task first released at `time_lock`.
    pub const fn new(kind: PeriodicKind, period_ms: u64, time_lock: u64) -> Self {
        Self { header: TaskHeader::send_at(time_lock), kind, period_ms }
    }

    /// The successor, released one period later.
    pub fn clone_next(&self) -> Self {
        self.clone_next_in(self.period_ms)
    }

    /// The successor, released after a custom delay.
    pub fn clone_next_in(&self, delay_ms: u64) -> Self {
        let mut next = self.clone();
        next.header = TaskHeader::send_at(self.header.time_lock + delay_ms);
        next
    }
}

/// A queued unit of work.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// A cross-chain request transition.
    Rbc(RbcEvent),
    /// A validator-rotation propagation.
    RoundUp(RoundUpEvent),
    /// A recurring task.
    Periodic(PeriodicTask),
}

impl WorkItem {
    /// The common header.
    pub fn header(&self) -> &TaskHeader {
        match self {
            Self::Rbc(event) => &event.header,
            Self::RoundUp(event) => &event.header,
            Self::Periodic(task) => &task.header,
        }
    }

    /// The common header, mutably.
    pub fn header_mut(&mut self) -> &mut TaskHeader {
        match self {
            Self::Rbc(event) => &mut event.header,
            Self::RoundUp(event) => &mut event.header,
            Self::Periodic(task) => &mut task.header,
        }
    }

    /// The release timestamp.
    pub fn time_lock(&self) -> u64 {
        self.header().time_lock
    }

    /// The lifecycle stage.
    pub fn task_status(&self) -> TaskStatus {
        self.header().status
    }

    /// The receipt target, if in the `CheckReceipt` stage.
    pub fn receipt(&self) -> Option<ReceiptParams> {
        self.header().receipt
    }

    /// A short label for logging and metrics.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Rbc(_) => "rbc",
            Self::RoundUp(_) => "roundup",
            Self::Periodic(PeriodicTask { kind: PeriodicKind::Heartbeat, .. }) => "heartbeat",
            Self::Periodic(PeriodicTask { kind: PeriodicKind::PriceFeed, .. }) => "price-feed",
            Self::Periodic(PeriodicTask { kind: PeriodicKind::BtcHashFeed, .. }) => {
                "btc-hash-feed"
            }
            Self::Periodic(PeriodicTask { kind: PeriodicKind::RoundProbe, .. }) => "round-probe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{FixedBytes, U256};
    use relayer_contracts::abi::logs::{Instruction, ReqId, Socket, TaskParams};
    use alloy_sol_types::SolEvent;
    use relayer_primitives::status_of;

    fn socket_message(status: ChainEventStatus) -> (Bytes, SocketMessage) {
        let message = SocketMessage {
            req_id: ReqId { src_chain: FixedBytes::from([0, 0, 0, 1]), round: 9, sequence: 1 },
            status: status as u8,
            instruction: Instruction {
                dst_chain: FixedBytes::from([0, 0, 0x0b, 0xfc]),
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
        let raw = Socket { message: message.clone() }.encode_log_data().data;
        (raw, message)
    }

    #[test]
    fn test_clone_with_other_status_rewrites_both_forms() {
        let (raw, message) = socket_message(ChainEventStatus::Requested);
        let event = RbcEvent::new(
            ChainId::Ethereum,
            raw,
            message,
            ChainEventStatus::Requested,
            10,
            0,
        );

        let accepted = event.clone_with_other_status(ChainEventStatus::Accepted);

        assert_eq!(accepted.status, ChainEventStatus::Accepted);
        assert_eq!(accepted.message.status, ChainEventStatus::Accepted as u8);
        assert_eq!(status_of(&accepted.raw).unwrap(), ChainEventStatus::Accepted);
        // the original is untouched.
        assert_eq!(event.status, ChainEventStatus::Requested);
        assert_eq!(status_of(&event.raw).unwrap(), ChainEventStatus::Requested);
    }

    #[test]
    fn test_direction_is_derived_from_source_chain() {
        let (raw, mut message) = socket_message(ChainEventStatus::Requested);
        let event = RbcEvent::new(
            ChainId::Ethereum,
            raw.clone(),
            message.clone(),
            ChainEventStatus::Requested,
            10,
            0,
        );
        assert!(event.is_inbound(ChainId::Bifrost));

        message.req_id.src_chain = ChainId::Bifrost.id_bytes();
        let outbound =
            RbcEvent::new(ChainId::Bifrost, raw, message, ChainEventStatus::Requested, 10, 0);
        assert!(!outbound.is_inbound(ChainId::Bifrost));
    }

    #[test]
    fn test_periodic_clone_next_advances_release() {
        let task = PeriodicTask::new(PeriodicKind::Heartbeat, 30_000, 1_000);
        let next = task.clone_next();
        assert_eq!(next.header.time_lock, 31_000);
        assert_eq!(next.header.status, TaskStatus::SendTx);

        let fast = task.clone_next_in(3_000);
        assert_eq!(fast.header.time_lock, 4_000);
    }

    #[test]
    fn test_header_transitions() {
        let mut header = TaskHeader::send_at(5);
        header.switch_to_receipt(ChainId::Ethereum, B256::ZERO, 99);
        assert_eq!(header.status, TaskStatus::CheckReceipt);
        assert!(header.receipt.is_some());

        header.switch_to_call(120);
        assert_eq!(header.status, TaskStatus::CallTx);
        assert_eq!(header.time_lock, 120);
        assert!(header.receipt.is_none());
    }
}
