//! Per-chain transaction fee strategies.

use crate::ClientError;

/// The default escalation ladder applied on repeated submission failures.
pub const DEFAULT_FEE_UPDATE_RATES: [f64; 4] = [1.1, 1.2, 1.3, 2.0];

/// Multiplier applied over the network-reported fee before committing.
const FEE_HEADROOM: f64 = 1.5;

/// Weight of the priority fee in the EIP-1559 max-fee computation.
const PRIORITY_WEIGHT: u128 = 4;

/// The minimum base fee assumed on the hub, in wei (1000 gwei).
pub(crate) const HUB_BASE_FEE_FLOOR: u128 = 1_000_000_000_000;

/// The fee model of a chain, selected by configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum TxFeeType {
    /// Type-0 transactions priced from `eth_gasPrice`.
    Legacy {
        /// The maximum network gas price the relayer will pay over.
        max_gas_price: u128,
    },
    /// Type-2 transactions priced from the priority fee and the base fee.
    Eip1559 {
        /// Cap on the committed max fee per gas.
        max_gas_price: u128,
        /// Cap on the network priority fee.
        max_priority_price: u128,
    },
}

/// A chain's complete fee configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeConfig {
    /// The fee model.
    pub kind: TxFeeType,
    /// The escalation ladder; rate `n` is applied on the `n`-th consecutive
    /// failure.
    pub update_rates: Vec<f64>,
}

impl FeeConfig {
    /// Returns a config with the default escalation ladder.
    pub fn new(kind: TxFeeType) -> Self {
        Self { kind, update_rates: DEFAULT_FEE_UPDATE_RATES.to_vec() }
    }

    /// The escalation rate for the given consecutive-failure count.
    pub fn escalation_rate(&self, failures: usize) -> f64 {
        if failures == 0 {
            return 1.0;
        }
        let idx = (failures - 1).min(self.update_rates.len().saturating_sub(1));
        self.update_rates.get(idx).copied().unwrap_or(1.0)
    }
}

/// The fee fields committed into an outgoing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommittedFee {
    /// Legacy gas price.
    Legacy {
        /// The committed gas price, in wei.
        gas_price: u128,
    },
    /// EIP-1559 fee pair.
    Eip1559 {
        /// The committed max fee per gas, in wei.
        max_fee_per_gas: u128,
        /// The committed max priority fee per gas, in wei.
        max_priority_fee_per_gas: u128,
    },
}

/// Computes the fee to commit, rejecting when the network price breaches the
/// configured caps.
///
/// * Legacy: commits `gas_price × 1.5`, rejecting when the network gas price
///   exceeds the configured maximum.
/// * EIP-1559: commits `max_fee = 1.5 × (priority × 4 + base)`, rejecting
///   when either the priority fee or the resulting max fee exceeds its cap.
///   On the hub, the base fee is floored to 1000 gwei.
pub(crate) fn compute_fee(
    config: &FeeConfig,
    network_gas_price: u128,
    network_priority: u128,
    next_base_fee: u128,
    is_hub: bool,
    failures: usize,
) -> Result<CommittedFee, ClientError> {
    let escalation = config.escalation_rate(failures);
    match config.kind {
        TxFeeType::Legacy { max_gas_price } => {
            if network_gas_price > max_gas_price {
                return Err(ClientError::FeeTooHigh);
            }
            let gas_price = scale(scale(network_gas_price, FEE_HEADROOM), escalation);
            Ok(CommittedFee::Legacy { gas_price })
        }
        TxFeeType::Eip1559 { max_gas_price, max_priority_price } => {
            let base = if is_hub { next_base_fee.max(HUB_BASE_FEE_FLOOR) } else { next_base_fee };
            let max_fee =
                scale(scale(network_priority * PRIORITY_WEIGHT + base, FEE_HEADROOM), escalation);
            if network_priority > max_priority_price || max_fee > max_gas_price {
                return Err(ClientError::FeeTooHigh);
            }
            Ok(CommittedFee::Eip1559 {
                max_fee_per_gas: max_fee,
                max_priority_fee_per_gas: network_priority,
            })
        }
    }
}

fn scale(value: u128, rate: f64) -> u128 {
    (value as f64 * rate) as u128
}
