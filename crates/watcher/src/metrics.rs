use metrics::{Counter, Gauge};
use metrics_derive::Metrics;

/// The metrics for the [`super::EventScanner`].
#[derive(Metrics, Clone)]
#[metrics(scope = "relayer_watcher")]
pub struct ScannerMetrics {
    /// A counter on the logs discovered.
    pub logs_found: Counter,
    /// A counter on log-window halvings.
    pub window_shrinks: Counter,
    /// The latest fully scanned height.
    pub height: Gauge,
}
