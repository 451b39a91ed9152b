//! Multi-chain event monitor for the bridge relayer.
//!
//! One [`EventScanner`] per supported chain polls contract logs from its
//! `latest_scanned_height` up to the matured height, in bounded windows that
//! shrink on provider timeouts, and emits [`DetectedEvent`]s into a channel
//! consumed by the work-item dispatcher.

mod error;
pub use error::WatcherError;

mod metrics;
pub use metrics::ScannerMetrics;

pub mod dispatch;

mod bootstrap;
pub use bootstrap::{bootstrap, BootstrapOutcome, HUB_ROUND_LOOKBACK};

use alloy_primitives::{Address, B256};
use alloy_rpc_types_eth::{Filter, Log};
use relayer_client::{is_timeout, EthClient, EthRpc};
use relayer_primitives::ChainId;
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::sync::mpsc;

/// The scanner's emission channel depth.
const EVENT_CHANNEL_SIZE: usize = 1024;

/// One `(address, topic0)` pair the scanner watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTarget {
    /// The emitting contract.
    pub address: Address,
    /// The event signature hash.
    pub topic0: B256,
}

/// A raw log discovered by a scanner, tagged with its chain.
#[derive(Debug, Clone)]
pub struct DetectedEvent {
    /// The chain the log was observed on.
    pub chain: ChainId,
    /// The raw log.
    pub log: Log,
}

/// A per-chain polling scanner.
///
/// Scanners do not coordinate; each owns its `latest_scanned_height` and
/// emits logs in block order for its chain.
#[derive(Debug)]
pub struct EventScanner<T> {
    client: Arc<EthClient<T>>,
    targets: Vec<ScanTarget>,
    latest_scanned_height: u64,
    max_log_window: u64,
    poll_period: Duration,
    sender: mpsc::Sender<DetectedEvent>,
    metrics: ScannerMetrics,
}

impl<T: EthRpc + 'static> EventScanner<T> {
    /// Returns a new scanner and the receiving end of its emissions.
    pub fn new(
        client: Arc<EthClient<T>>,
        targets: Vec<ScanTarget>,
        start_height: u64,
        max_log_window: u64,
        poll_period: Duration,
    ) -> (Self, mpsc::Receiver<DetectedEvent>) {
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let scanner = Self {
            client,
            targets,
            latest_scanned_height: start_height,
            max_log_window: max_log_window.max(1),
            poll_period,
            sender,
            metrics: ScannerMetrics::default(),
        };
        (scanner, receiver)
    }

    /// The chain this scanner serves.
    pub fn chain(&self) -> ChainId {
        self.client.id()
    }

    /// The next height the scanner will read from.
    pub fn latest_scanned_height(&self) -> u64 {
        self.latest_scanned_height
    }

    /// Moves the scan cursor; the bootstrap uses this to hand over to
    /// steady-state scanning.
    pub fn set_latest_scanned_height(&mut self, height: u64) {
        self.latest_scanned_height = height;
    }

    /// The current log window bound.
    pub fn max_log_window(&self) -> u64 {
        self.max_log_window
    }

    /// Spawns the polling loop onto the runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// The polling loop: one [`Self::step`] per period until the emission
    /// channel closes.
    pub async fn run(mut self) {
        loop {
            match self.step().await {
                Err(WatcherError::ChannelClosed) => {
                    tracing::warn!(target: "relayer::watcher", chain = %self.chain(), "emission channel closed, stopping scanner");
                    break;
                }
                Err(err) => {
                    tracing::error!(target: "relayer::watcher", chain = %self.chain(), %err, "scan step failed");
                }
                Ok(()) => {}
            }
            tokio::time::sleep(self.poll_period).await;
        }
    }

    /// A single scan step: reads `[latest_scanned_height, matured]` and
    /// emits every discovered log. The cursor only advances after a fully
    /// successful pass, keeping successive cursor values strictly
    /// increasing.
    pub async fn step(&mut self) -> Result<(), WatcherError> {
        let to = self.client.matured_height().await?;
        if to < self.latest_scanned_height {
            return Ok(());
        }

        let from = self.latest_scanned_height;
        let logs = self.scan_range(from, to).await?;
        let count = logs.len();

        for log in logs {
            self.sender
                .send(DetectedEvent { chain: self.chain(), log })
                .await
                .map_err(|_| WatcherError::ChannelClosed)?;
        }

        self.metrics.logs_found.increment(count as u64);
        self.metrics.height.set(to as f64);
        tracing::trace!(target: "relayer::watcher", chain = %self.chain(), from, to, count, "scanned range");

        self.latest_scanned_height = to + 1;
        Ok(())
    }

    /// Fetches every watched log in `[from, to]`, splitting the range into
    /// windows of at most `max_log_window` blocks. A provider timeout
    /// halves the offending window, recurses on both halves, and
    /// permanently shrinks the window bound.
    pub async fn scan_range(&mut self, from: u64, to: u64) -> Result<Vec<Log>, WatcherError> {
        let mut out = Vec::new();
        let mut pending = VecDeque::new();

        let mut start = from;
        while start <= to {
            let end = to.min(start.saturating_add(self.max_log_window - 1));
            pending.push_back((start, end));
            start = end + 1;
        }

        while let Some((start, end)) = pending.pop_front() {
            let filter = self.filter(start, end);
            match self.client.get_logs(&filter).await {
                Ok(mut logs) => out.append(&mut logs),
                Err(err) if is_timeout(&err) && end > start => {
                    let mid = start + (end - start) / 2;
                    self.max_log_window = (self.max_log_window / 2).max(1);
                    self.metrics.window_shrinks.increment(1);
                    tracing::debug!(
                        target: "relayer::watcher",
                        chain = %self.chain(),
                        start,
                        end,
                        window = self.max_log_window,
                        "provider timeout, halving log window"
                    );
                    pending.push_front((mid + 1, end));
                    pending.push_front((start, mid));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(out)
    }

    fn filter(&self, from: u64, to: u64) -> Filter {
        Filter::new()
            .address(self.targets.iter().map(|target| target.address).collect::<Vec<_>>())
            .event_signature(self.targets.iter().map(|target| target.topic0).collect::<Vec<_>>())
            .from_block(from)
            .to_block(to)
    }
}
