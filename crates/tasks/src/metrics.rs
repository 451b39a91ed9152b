use metrics::Counter;
use metrics_derive::Metrics;

/// The metrics for the [`super::TaskManager`].
#[derive(Metrics, Clone)]
#[metrics(scope = "relayer_tasks")]
pub struct TaskMetrics {
    /// A counter on the read-only calls dispatched.
    pub calls: Counter,
    /// A counter on the transactions submitted.
    pub submissions: Counter,
    /// A counter on submissions swallowed for pricing reasons.
    pub priced_out: Counter,
    /// A counter on fee-cap requeues.
    pub fee_requeues: Counter,
    /// A counter on reverted executions.
    pub reverts: Counter,
    /// A counter on successful receipts.
    pub receipts_ok: Counter,
    /// A counter on failed receipts.
    pub receipts_failed: Counter,
    /// A counter on handler errors that dropped an item.
    pub handler_errors: Counter,
}
