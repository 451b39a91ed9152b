use metrics::Counter;
use metrics_derive::Metrics;

/// The metrics for the relay and roundup handlers.
#[derive(Metrics, Clone)]
#[metrics(scope = "relayer_handlers")]
pub struct RelayMetrics {
    /// A counter on poll submissions built.
    pub polls: Counter,
    /// A counter on aggregated relays submitted.
    pub aggregated_relays: Counter,
    /// A counter on requests observed committed.
    pub committed: Counter,
    /// A counter on requests observed rolled back.
    pub rollbacked: Counter,
    /// A counter on already-processed drops.
    pub already_processed: Counter,
    /// A counter on events rejected by the membership gate.
    pub not_mine: Counter,
    /// A counter on roundup fan-out clones.
    pub roundup_fanouts: Counter,
    /// A counter on roundup relays submitted.
    pub roundup_relays: Counter,
    /// A counter on heartbeat submissions.
    pub heartbeats: Counter,
    /// A counter on price feed submissions.
    pub price_feeds: Counter,
    /// A counter on Bitcoin hash feed submissions.
    pub btc_feeds: Counter,
    /// A counter on round-control polls submitted.
    pub round_polls: Counter,
}
