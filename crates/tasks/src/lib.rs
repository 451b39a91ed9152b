//! The time-priority event queue and the task manager driving every work
//! item through its CallTx → SendTx → CheckReceipt lifecycle.

pub use item::{
    now_ms, PeriodicKind, PeriodicTask, RbcEvent, ReceiptParams, RoundUpEvent, TaskHeader,
    TaskStatus, WorkItem,
};
mod item;

pub use queue::EventQueue;
mod queue;

pub use handler::{CallParams, EventHandler, HandlerError, HandlerSet, SendParams};
mod handler;

pub use manager::{Fatal, TaskManager};
mod manager;

pub use metrics::TaskMetrics;
mod metrics;

/// The deferral applied before re-checking quorum or backstopping a silent
/// primary relayer, in seconds.
pub const CALL_DELAY_SEC: u64 = 600;

/// The requeue delay applied when the network fee breaches the configured
/// cap, in milliseconds.
pub const FEE_RETRY_DELAY_MS: u64 = 3_000;
