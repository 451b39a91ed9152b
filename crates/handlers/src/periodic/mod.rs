//! The recurring tasks the relayer feeds the hub with.

pub use heartbeat::HeartbeatHandler;
mod heartbeat;

pub use price_feed::PriceFeedHandler;
mod price_feed;

pub use btc_feed::BtcHashFeedHandler;
mod btc_feed;

pub use round_probe::RoundProbeHandler;
mod round_probe;

/// The heartbeat period.
pub const HEARTBEAT_PERIOD_MS: u64 = 30_000;
