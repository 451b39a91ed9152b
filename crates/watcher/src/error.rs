use alloy_json_rpc::RpcError;
use alloy_transport::TransportErrorKind;
use relayer_client::ClientError;

/// An error that occurred while scanning or bootstrapping.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// A transport-level RPC failure.
    #[error("rpc transport error: {0}")]
    Transport(#[from] RpcError<TransportErrorKind>),
    /// A client-side failure.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// A contract returned bytes that do not decode.
    #[error("abi decoding failed: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    /// The emission channel was closed by the consumer.
    #[error("event channel closed")]
    ChannelClosed,
}
