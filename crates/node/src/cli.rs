//! The relayer launcher command line.

use clap::Parser;
use std::path::PathBuf;

/// Cross-chain bridge relayer.
#[derive(Debug, Clone, Parser)]
#[command(name = "relayer", version, about)]
pub struct Cli {
    /// Hex-encoded relayer private key; overrides the private config.
    #[arg(short = 'k', long = "private-key")]
    pub private_key: Option<String>,

    /// Path to the public configuration file.
    #[arg(short = 'c', long = "config-path", default_value = "configs/entity.relayer.json")]
    pub config_path: PathBuf,

    /// Path to the private configuration file, deep-merged over the public
    /// one.
    #[arg(
        short = 'a',
        long = "private-config-path",
        default_value = "configs/entity.relayer.private.json"
    )]
    pub private_config_path: PathBuf,

    /// Whether the metrics recorder is announced as enabled.
    #[arg(
        short = 'p',
        long = "prometheus",
        action = clap::ArgAction::Set,
        default_value_t = true
    )]
    pub prometheus: bool,

    /// Skip the heartbeat task.
    #[arg(short = 'b', long = "no-heartbeat")]
    pub no_heartbeat: bool,
}
