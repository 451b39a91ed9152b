//! Client error taxonomy and RPC error classification.

use alloy_json_rpc::RpcError;
use alloy_transport::TransportErrorKind;

/// An error surfaced by a per-chain client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A transport-level RPC failure.
    #[error("rpc transport error: {0}")]
    Transport(#[from] RpcError<TransportErrorKind>),
    /// The submitted transaction was underpriced for the current mempool.
    #[error("transaction underpriced")]
    Underpriced,
    /// The node rejected the fee as exceeding its configured cap.
    #[error("transaction fee cap exceeded")]
    FeeCapExceeded,
    /// The priority fee is below the node's minimum.
    #[error("priority fee too low")]
    PriorityFeeTooLow,
    /// The call or estimation reverted in the EVM.
    #[error("execution reverted: {0}")]
    Revert(String),
    /// The network fee exceeds the configured per-chain maximum. The caller
    /// may retry once fees settle.
    #[error("network fee exceeds the configured cap")]
    FeeTooHigh,
    /// Transaction building or signing failed.
    #[error("transaction signing failed: {0}")]
    Signer(String),
    /// A block expected to exist was absent.
    #[error("unknown block {0}")]
    MissingBlock(u64),
    /// A work item targeted a chain outside the supported set.
    #[error("unsupported chain {0}")]
    UnsupportedChain(String),
}

impl ClientError {
    /// Whether the submission may succeed after a fee escalation.
    pub const fn is_fee_related(&self) -> bool {
        matches!(
            self,
            Self::Underpriced | Self::FeeCapExceeded | Self::PriorityFeeTooLow
        )
    }
}

/// Classifies an `eth_sendRawTransaction` failure.
pub fn classify_send_error(err: RpcError<TransportErrorKind>) -> ClientError {
    if let RpcError::ErrorResp(payload) = &err {
        let message = payload.message.to_lowercase();
        if message.contains("underpriced") {
            return ClientError::Underpriced;
        }
        if message.contains("fee cap") || message.contains("exceeds the configured cap") {
            return ClientError::FeeCapExceeded;
        }
        if message.contains("priority fee") || message.contains("tip") {
            return ClientError::PriorityFeeTooLow;
        }
    }
    ClientError::Transport(err)
}

/// Classifies an `eth_call` / `eth_estimateGas` failure, surfacing revert
/// reasons.
pub fn classify_call_error(err: RpcError<TransportErrorKind>) -> ClientError {
    if let RpcError::ErrorResp(payload) = &err {
        let message = payload.message.to_string();
        if message.to_lowercase().contains("revert") {
            return ClientError::Revert(message);
        }
    }
    ClientError::Transport(err)
}

/// Whether an `eth_getLogs` failure looks like a provider-side timeout; the
/// scanner reacts by halving its block window.
pub fn is_timeout(err: &RpcError<TransportErrorKind>) -> bool {
    match err {
        RpcError::ErrorResp(payload) => {
            let message = payload.message.to_lowercase();
            message.contains("timeout") || message.contains("timed out")
        }
        RpcError::Transport(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_json_rpc::ErrorPayload;

    fn resp_error(message: &str) -> RpcError<TransportErrorKind> {
        RpcError::ErrorResp(ErrorPayload {
            code: -32000,
            message: message.to_string().into(),
            data: None,
        })
    }

    #[test]
    fn test_send_error_classification() {
        assert!(matches!(
            classify_send_error(resp_error("replacement transaction underpriced")),
            ClientError::Underpriced
        ));
        assert!(matches!(
            classify_send_error(resp_error("tx fee (2.00 ether) exceeds the configured cap")),
            ClientError::FeeCapExceeded
        ));
        assert!(matches!(
            classify_send_error(resp_error("max priority fee per gas too low")),
            ClientError::PriorityFeeTooLow
        ));
        assert!(matches!(
            classify_send_error(resp_error("nonce too low")),
            ClientError::Transport(_)
        ));
    }

    #[test]
    fn test_call_error_surfaces_revert_reason() {
        let err = classify_call_error(resp_error("execution reverted: Socket: invalid status"));
        match err {
            ClientError::Revert(reason) => assert!(reason.contains("invalid status")),
            other => panic!("expected revert, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_detection() {
        assert!(is_timeout(&resp_error("query timeout exceeded")));
        assert!(!is_timeout(&resp_error("unknown block")));
    }
}
