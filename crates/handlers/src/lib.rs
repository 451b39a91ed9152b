//! The per-domain handlers behind the task manager: the RBC request state
//! machine, the validator-set RoundUp propagation, and the recurring hub
//! feeds.

pub use relay::SocketRelayHandler;
mod relay;

pub use roundup::RoundUpRelayHandler;
mod roundup;

pub mod periodic;

pub use rounds::RoundState;
mod rounds;

pub use traits::{BtcClient, CollaboratorError, EsploraClient, HttpPriceFetcher, PriceFetcher};
mod traits;

pub use metrics::RelayMetrics;
mod metrics;
