//! The bridge relayer binary: configuration, wiring, and supervision exits.

mod cli;
mod config;

use alloy_provider::RootProvider;
use alloy_rpc_client::RpcClient;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolEvent;
use alloy_transport::layers::RetryBackoffLayer;
use clap::Parser;
use cli::Cli;
use eyre::{bail, eyre, Context};
use relayer_client::{AddressBook, ChainMetadata, EthClient, MultiChain};
use relayer_contracts::abi::logs::{RoundUp, Socket};
use relayer_handlers::{
    periodic::{
        BtcHashFeedHandler, HeartbeatHandler, PriceFeedHandler, RoundProbeHandler,
        HEARTBEAT_PERIOD_MS,
    },
    EsploraClient, HttpPriceFetcher, RoundState, RoundUpRelayHandler, SocketRelayHandler,
};
use relayer_primitives::ChainId;
use relayer_tasks::{
    now_ms, EventHandler, EventQueue, HandlerSet, PeriodicKind, PeriodicTask, TaskManager,
    WorkItem,
};
use relayer_watcher::{bootstrap, dispatch::into_work_item, EventScanner, ScanTarget};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;

/// Exit code asking the outer supervisor for a restart after a presumed
/// stuck RPC provider.
const STUCK_PROVIDER_EXIT_CODE: i32 = 101;

/// The grace period before the supervisor exit.
const STUCK_PROVIDER_GRACE: Duration = Duration::from_secs(60);

/// Transport retry policy: up to 20 retries, 180s apart.
const RPC_MAX_RETRIES: u32 = 20;
const RPC_RETRY_BACKOFF_MS: u64 = 180_000;
const RPC_COMPUTE_UNITS_PER_SEC: u64 = 100;

/// Default Bitcoin confirmation depth.
const DEFAULT_BTC_CONFIRMATIONS: u64 = 6;

type ChainRpc = RootProvider;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> eyre::Result<()> {
    let config = config::load(&cli.config_path, Some(&cli.private_config_path))?;
    let network = config.network_kind()?;

    let secret = cli
        .private_key
        .clone()
        .or_else(|| config.entity.secret_hex.clone())
        .ok_or_else(|| eyre!("no relayer key: pass --private-key or set entity.secret_hex"))?;
    let signer: PrivateKeySigner =
        secret.trim_start_matches("0x").parse().wrap_err("parsing relayer private key")?;

    tracing::info!(
        target: "relayer",
        ?network,
        relayer = %signer.address(),
        prometheus = cli.prometheus,
        "starting relayer"
    );

    let mut chains = MultiChain::new(network);
    let mut scanner_plans = Vec::new();
    for chain_config in &config.evm_chains {
        let chain = ChainId::from_name(&chain_config.chain_name, network)
            .ok_or_else(|| eyre!("unknown chain {:?}", chain_config.chain_name))?;

        let url: url::Url = chain_config
            .url_with_access_key
            .parse()
            .wrap_err_with(|| format!("parsing rpc url for {chain}"))?;
        let rpc_client = RpcClient::builder()
            .layer(RetryBackoffLayer::new(
                RPC_MAX_RETRIES,
                RPC_RETRY_BACKOFF_MS,
                RPC_COMPUTE_UNITS_PER_SEC,
            ))
            .http(url);
        let provider: ChainRpc = RootProvider::new(rpc_client);

        let mut addresses = AddressBook::default();
        for contract in &chain_config.contracts {
            match contract.name.as_str() {
                "socket" => addresses.socket = contract.address,
                "authority" => addresses.authority = contract.address,
                "oracle" => addresses.oracle = Some(contract.address),
                other => {
                    tracing::warn!(target: "relayer", contract = other, "unknown contract entry ignored")
                }
            }
        }

        let metadata = ChainMetadata {
            id: chain,
            block_period_sec: chain_config.block_period_sec,
            block_aging_period: chain_config.block_aging_period,
            commit_multiplier: chain_config.transaction_commit_multiplier,
            fee: chain_config.tx_fee_type.fee_config()?,
        };
        chains.insert(EthClient::new(provider, signer.clone(), metadata, addresses));

        let mut targets = Vec::new();
        for event in &chain_config.events {
            let address = chain_config
                .contracts
                .iter()
                .find(|contract| contract.name == event.contract_name)
                .map(|contract| contract.address)
                .ok_or_else(|| eyre!("event references missing contract"))?;
            let topic0 = match event.event_name.as_str() {
                "Socket" => Socket::SIGNATURE_HASH,
                "RoundUp" => RoundUp::SIGNATURE_HASH,
                other => bail!("unknown event {other:?} on {chain}"),
            };
            targets.push(ScanTarget { address, topic0 });
        }
        scanner_plans.push((
            chain,
            targets,
            chain_config.bootstrap_latest_height.unwrap_or(1),
            chain_config.max_log_num,
        ));
    }
    let chains = Arc::new(chains);
    let queue = Arc::new(EventQueue::new());

    let poll_period = Duration::from_secs(config.multichain_config.chain_monitor_period_sec);
    let mut scanners = Vec::new();
    let mut receivers = Vec::new();
    for (chain, targets, start, window) in scanner_plans {
        let client = chains.get(chain).expect("registered above").clone();
        let (scanner, receiver) = EventScanner::new(client, targets, start, window, poll_period);
        scanners.push(scanner);
        receivers.push(receiver);
    }

    // replay history, then hand the scanners over to steady state.
    let outcome = bootstrap(chains.as_ref(), &mut scanners, &queue).await?;
    let rounds = Arc::new(RoundState::new(outcome.current_round));

    let mut periodic: HashMap<PeriodicKind, Arc<dyn EventHandler>> = HashMap::new();
    periodic.insert(
        PeriodicKind::RoundProbe,
        Arc::new(RoundProbeHandler::new(chains.clone(), rounds.clone(), config.fast_relayer)),
    );
    if !cli.no_heartbeat {
        periodic.insert(PeriodicKind::Heartbeat, Arc::new(HeartbeatHandler::new(chains.clone())));
    }
    if let Some(endpoint) = &config.oracle_config.price_endpoint {
        periodic.insert(
            PeriodicKind::PriceFeed,
            Arc::new(PriceFeedHandler::new(
                chains.clone(),
                rounds.clone(),
                Arc::new(HttpPriceFetcher::new_http(endpoint.clone())),
                config.oracle_config.asset_symbols.clone(),
                config.fast_relayer,
            )),
        );
    } else {
        tracing::info!(target: "relayer", "price feed disabled: no price endpoint configured");
    }
    if let Some(endpoint) = &config.oracle_config.btc_endpoint {
        periodic.insert(
            PeriodicKind::BtcHashFeed,
            Arc::new(BtcHashFeedHandler::new(
                chains.clone(),
                Arc::new(EsploraClient::new_http(
                    endpoint.clone(),
                    config.oracle_config.btc_confirmations.unwrap_or(DEFAULT_BTC_CONFIRMATIONS),
                )),
            )),
        );
    } else {
        tracing::info!(target: "relayer", "btc hash feed disabled: no btc endpoint configured");
    }

    let handlers = HandlerSet {
        rbc: Arc::new(SocketRelayHandler::new(
            chains.clone(),
            queue.clone(),
            rounds.clone(),
            config.fast_relayer,
        )),
        roundup: Arc::new(RoundUpRelayHandler::new(
            chains.clone(),
            queue.clone(),
            rounds.clone(),
            config.fast_relayer,
        )),
        periodic,
    };

    seed_periodic_tasks(&handlers, &queue, &config);

    for scanner in scanners {
        scanner.spawn();
    }
    for mut receiver in receivers {
        let queue = queue.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Some(item) = into_work_item(&event, false) {
                    queue.push(item);
                }
            }
        });
    }

    let manager = TaskManager::new(queue, chains, handlers);
    match manager.run().await {
        Ok(()) => Ok(()),
        Err(fatal) => {
            tracing::error!(target: "relayer", %fatal, "fatal condition, requesting restart");
            tokio::time::sleep(STUCK_PROVIDER_GRACE).await;
            std::process::exit(STUCK_PROVIDER_EXIT_CODE);
        }
    }
}

fn seed_periodic_tasks(
    handlers: &HandlerSet,
    queue: &EventQueue,
    config: &config::RelayerConfig,
) {
    let now = now_ms();
    let oracle = &config.oracle_config;
    let seeds = [
        (PeriodicKind::Heartbeat, HEARTBEAT_PERIOD_MS),
        (PeriodicKind::PriceFeed, oracle.price_source_collection_period_sec * 1_000),
        (PeriodicKind::BtcHashFeed, oracle.btc_hash_source_collection_period_sec * 1_000),
        (PeriodicKind::RoundProbe, oracle.validator_set_check_period_sec * 1_000),
    ];
    for (kind, period_ms) in seeds {
        if handlers.periodic.contains_key(&kind) {
            queue.push(WorkItem::Periodic(PeriodicTask::new(kind, period_ms, now)));
        }
    }
}
