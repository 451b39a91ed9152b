//! The public/private JSON configuration model.
//!
//! The private file is deep-merged over the public one at the JSON value
//! level; validation failures abort startup.

use alloy_primitives::Address;
use eyre::{bail, eyre, Context};
use relayer_client::{FeeConfig, TxFeeType, DEFAULT_FEE_UPDATE_RATES};
use relayer_primitives::{ChainId, NetworkKind};
use serde::Deserialize;
use serde_json::Value;
use std::{collections::HashSet, fs, path::Path};

/// The merged relayer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayerConfig {
    /// `"mainnet"` or `"testnet"`.
    pub network: String,
    /// Whether membership and primary checks are bypassed.
    #[serde(default)]
    pub fast_relayer: bool,
    /// The relayer identity.
    #[serde(default)]
    pub entity: EntityConfig,
    /// One entry per served chain.
    pub evm_chains: Vec<EvmChainConfig>,
    /// Cross-chain monitor settings.
    pub multichain_config: MultichainConfig,
    /// Periodic feed settings.
    pub oracle_config: OracleConfig,
}

/// The relayer identity material.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityConfig {
    /// Hex-encoded secp256k1 secret. Usually supplied by the private file
    /// or the command line.
    pub secret_hex: Option<String>,
}

/// Per-chain connection and pricing parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct EvmChainConfig {
    /// The chain name, resolved within the selected network set.
    pub chain_name: String,
    /// The JSON-RPC endpoint, including any access key.
    pub url_with_access_key: String,
    /// Average block period in seconds.
    pub block_period_sec: u64,
    /// Finality depth subtracted from the latest height.
    pub block_aging_period: u64,
    /// Multiplier over the finality window when waiting for receipts.
    pub transaction_commit_multiplier: u64,
    /// The scanner's maximum log-window width in blocks.
    pub max_log_num: u64,
    /// Retained for config compatibility; receipt waits are bounded by the
    /// commit window instead.
    #[serde(default)]
    pub receipt_max_try: Option<u32>,
    /// The fee strategy.
    pub tx_fee_type: TxFeeTypeConfig,
    /// The contracts the relayer interacts with on this chain.
    pub contracts: Vec<ContractConfig>,
    /// The `(contract, event)` pairs the scanner watches.
    pub events: Vec<EventTargetConfig>,
    /// The height scanning starts from when no better anchor exists.
    #[serde(default)]
    pub bootstrap_latest_height: Option<u64>,
}

/// The per-chain fee model selection.
#[derive(Debug, Clone, Deserialize)]
pub struct TxFeeTypeConfig {
    /// 0 for legacy, 2 for EIP-1559.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Legacy: the maximum network gas price accepted.
    #[serde(default)]
    pub gas_price: Option<u128>,
    /// EIP-1559: cap on the committed max fee.
    #[serde(default)]
    pub max_gas_price: Option<u128>,
    /// EIP-1559: cap on the network priority fee.
    #[serde(default)]
    pub max_priority_price: Option<u128>,
    /// The escalation ladder applied on repeated failures.
    #[serde(default)]
    pub fee_update_rates: Option<Vec<f64>>,
}

impl TxFeeTypeConfig {
    /// Resolves into the client fee configuration.
    pub fn fee_config(&self) -> eyre::Result<FeeConfig> {
        let kind = match self.kind {
            0 => TxFeeType::Legacy {
                max_gas_price: self
                    .gas_price
                    .or(self.max_gas_price)
                    .ok_or_else(|| eyre!("legacy fee type requires gas_price"))?,
            },
            2 => TxFeeType::Eip1559 {
                max_gas_price: self
                    .max_gas_price
                    .ok_or_else(|| eyre!("eip-1559 fee type requires max_gas_price"))?,
                max_priority_price: self
                    .max_priority_price
                    .ok_or_else(|| eyre!("eip-1559 fee type requires max_priority_price"))?,
            },
            other => bail!("unknown tx fee type {other}"),
        };
        Ok(FeeConfig {
            kind,
            update_rates: self
                .fee_update_rates
                .clone()
                .unwrap_or_else(|| DEFAULT_FEE_UPDATE_RATES.to_vec()),
        })
    }
}

/// One contract entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    /// The logical name: `socket`, `authority` or `oracle`.
    pub name: String,
    /// The deployed address.
    pub address: Address,
    /// Retained for config compatibility; bindings are compiled in.
    #[serde(default)]
    pub abi_path: Option<String>,
}

/// One watched event entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct EventTargetConfig {
    /// The logical contract name the event is emitted by.
    pub contract_name: String,
    /// The event name: `Socket` or `RoundUp`.
    pub event_name: String,
}

/// Cross-chain monitor settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MultichainConfig {
    /// The scanner tick period, in seconds.
    pub chain_monitor_period_sec: u64,
}

/// Periodic feed settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// The price collection period, in seconds.
    pub price_source_collection_period_sec: u64,
    /// The Bitcoin hash collection period, in seconds.
    pub btc_hash_source_collection_period_sec: u64,
    /// The validator round probe period, in seconds.
    pub validator_set_check_period_sec: u64,
    /// The ticker symbols fed to the price oracle.
    #[serde(default)]
    pub asset_symbols: Vec<String>,
    /// The price aggregator endpoint.
    #[serde(default)]
    pub price_endpoint: Option<String>,
    /// The Esplora-style Bitcoin API endpoint.
    #[serde(default)]
    pub btc_endpoint: Option<String>,
    /// Bitcoin confirmation depth.
    #[serde(default)]
    pub btc_confirmations: Option<u64>,
}

impl RelayerConfig {
    /// The selected network set.
    pub fn network_kind(&self) -> eyre::Result<NetworkKind> {
        match self.network.as_str() {
            "mainnet" => Ok(NetworkKind::Mainnet),
            "testnet" => Ok(NetworkKind::Testnet),
            other => bail!("unknown network {other:?}"),
        }
    }

    /// Startup validation; any failure is fatal.
    pub fn validate(&self) -> eyre::Result<()> {
        let network = self.network_kind()?;

        let mut seen_chains = HashSet::new();
        let mut has_hub = false;
        for chain_config in &self.evm_chains {
            let chain = ChainId::from_name(&chain_config.chain_name, network)
                .ok_or_else(|| eyre!("unknown chain {:?}", chain_config.chain_name))?;
            if !seen_chains.insert(chain) {
                bail!("duplicate chain {:?}", chain_config.chain_name);
            }
            has_hub |= chain.is_hub();

            let contract_names: HashSet<&str> =
                chain_config.contracts.iter().map(|contract| contract.name.as_str()).collect();
            let mut seen_events = HashSet::new();
            for event in &chain_config.events {
                if !contract_names.contains(event.contract_name.as_str()) {
                    bail!(
                        "event {:?} on {:?} references missing contract {:?}",
                        event.event_name,
                        chain_config.chain_name,
                        event.contract_name
                    );
                }
                if !seen_events.insert(event) {
                    bail!(
                        "duplicate event {:?} on {:?}",
                        event.event_name,
                        chain_config.chain_name
                    );
                }
            }

            chain_config.tx_fee_type.fee_config()?;
        }
        if !has_hub {
            bail!("configuration is missing the hub chain");
        }
        Ok(())
    }
}

/// Loads the public config and deep-merges the private one over it.
pub fn load(public: &Path, private: Option<&Path>) -> eyre::Result<RelayerConfig> {
    let mut value: Value = serde_json::from_str(
        &fs::read_to_string(public).wrap_err_with(|| format!("reading {}", public.display()))?,
    )?;

    if let Some(private) = private.filter(|path| path.exists()) {
        let overlay: Value = serde_json::from_str(
            &fs::read_to_string(private)
                .wrap_err_with(|| format!("reading {}", private.display()))?,
        )?;
        merge(&mut value, overlay);
    }

    let config: RelayerConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, overlay) => *slot = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn public_config() -> Value {
        json!({
            "network": "mainnet",
            "evm_chains": [{
                "chain_name": "bifrost",
                "url_with_access_key": "https://hub.example/rpc",
                "block_period_sec": 3,
                "block_aging_period": 5,
                "transaction_commit_multiplier": 2,
                "max_log_num": 1000,
                "tx_fee_type": { "type": 2, "max_gas_price": 5000000000000u64, "max_priority_price": 100000000000u64 },
                "contracts": [
                    { "name": "socket", "address": "0x0000000000000000000000000000000000000051" },
                    { "name": "authority", "address": "0x0000000000000000000000000000000000000052" }
                ],
                "events": [
                    { "contract_name": "socket", "event_name": "Socket" },
                    { "contract_name": "socket", "event_name": "RoundUp" }
                ]
            }],
            "multichain_config": { "chain_monitor_period_sec": 3 },
            "oracle_config": {
                "price_source_collection_period_sec": 300,
                "btc_hash_source_collection_period_sec": 300,
                "validator_set_check_period_sec": 60
            }
        })
    }

    #[test]
    fn test_parse_and_validate() -> eyre::Result<()> {
        let config: RelayerConfig = serde_json::from_value(public_config())?;
        config.validate()?;
        assert_eq!(config.network_kind()?, NetworkKind::Mainnet);
        assert!(matches!(
            config.evm_chains[0].tx_fee_type.fee_config()?.kind,
            TxFeeType::Eip1559 { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_private_overlay_wins_deeply() {
        let mut base = public_config();
        merge(
            &mut base,
            json!({
                "entity": { "secret_hex": "0xabc" },
                "multichain_config": { "chain_monitor_period_sec": 7 }
            }),
        );
        let config: RelayerConfig = serde_json::from_value(base).unwrap();
        assert_eq!(config.entity.secret_hex.as_deref(), Some("0xabc"));
        assert_eq!(config.multichain_config.chain_monitor_period_sec, 7);
        // untouched keys survive the merge.
        assert_eq!(config.evm_chains.len(), 1);
    }

    #[test]
    fn test_duplicate_event_is_fatal() {
        let mut value = public_config();
        value["evm_chains"][0]["events"] = json!([
            { "contract_name": "socket", "event_name": "Socket" },
            { "contract_name": "socket", "event_name": "Socket" }
        ]);
        let config: RelayerConfig = serde_json::from_value(value).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_event_without_contract_is_fatal() {
        let mut value = public_config();
        value["evm_chains"][0]["events"] =
            json!([{ "contract_name": "vault", "event_name": "Socket" }]);
        let config: RelayerConfig = serde_json::from_value(value).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_hub_is_fatal() {
        let mut value = public_config();
        value["evm_chains"][0]["chain_name"] = json!("ethereum");
        let config: RelayerConfig = serde_json::from_value(value).unwrap();
        assert!(config.validate().is_err());
    }
}
