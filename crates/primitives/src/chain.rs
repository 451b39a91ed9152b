//! Chain identifiers for the supported networks.

use alloy_primitives::FixedBytes;

/// The 4-byte network id of the hub chain.
pub const HUB_NETWORK_ID: u32 = 0x0bfc;

/// The 4-byte network id of the testnet hub chain.
pub const TESTNET_HUB_NETWORK_ID: u32 = 0xbfc0;

/// Whether the relayer serves the mainnet or the testnet chain set. The two
/// sets are disjoint and selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// The mainnet chain set.
    Mainnet,
    /// The testnet chain set.
    Testnet,
}

impl NetworkKind {
    /// Returns every chain in this network set, hub first.
    pub const fn chains(&self) -> &'static [ChainId] {
        match self {
            Self::Mainnet => &[
                ChainId::Bifrost,
                ChainId::Ethereum,
                ChainId::Binance,
                ChainId::Polygon,
                ChainId::Base,
            ],
            Self::Testnet => &[
                ChainId::BifrostTestnet,
                ChainId::Sepolia,
                ChainId::BinanceTestnet,
                ChainId::Amoy,
                ChainId::BaseSepolia,
            ],
        }
    }

    /// Returns the hub chain of this network set.
    pub const fn hub(&self) -> ChainId {
        match self {
            Self::Mainnet => ChainId::Bifrost,
            Self::Testnet => ChainId::BifrostTestnet,
        }
    }
}

/// A chain served by the relayer, tagged with its 4-byte network id.
///
/// The hub carries the coordination contracts (quorum, signature
/// aggregation, validator rotation); every other chain is peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChainId {
    /// The mainnet hub.
    Bifrost,
    /// Ethereum mainnet.
    Ethereum,
    /// BNB smart chain mainnet.
    Binance,
    /// Polygon PoS mainnet.
    Polygon,
    /// Base mainnet.
    Base,
    /// The testnet hub.
    BifrostTestnet,
    /// Ethereum Sepolia.
    Sepolia,
    /// BNB smart chain testnet.
    BinanceTestnet,
    /// Polygon Amoy.
    Amoy,
    /// Base Sepolia.
    BaseSepolia,
}

impl ChainId {
    /// The network id: `0x0bfc` for the hub, the EIP-155 chain id elsewhere.
    pub const fn network_id(&self) -> u32 {
        match self {
            Self::Bifrost => HUB_NETWORK_ID,
            Self::Ethereum => 1,
            Self::Binance => 56,
            Self::Polygon => 137,
            Self::Base => 8453,
            Self::BifrostTestnet => TESTNET_HUB_NETWORK_ID,
            Self::Sepolia => 11155111,
            Self::BinanceTestnet => 97,
            Self::Amoy => 80002,
            Self::BaseSepolia => 84532,
        }
    }

    /// The network id as the 4-byte big-endian tag used in on-chain payloads.
    pub fn id_bytes(&self) -> FixedBytes<4> {
        FixedBytes::from(self.network_id().to_be_bytes())
    }

    /// Resolves a 4-byte network tag within the given network set. Returns
    /// `None` for tags outside the supported set.
    pub fn from_id_bytes(bytes: FixedBytes<4>, network: NetworkKind) -> Option<Self> {
        let id = u32::from_be_bytes(bytes.0);
        network.chains().iter().copied().find(|chain| chain.network_id() == id)
    }

    /// Whether this chain is the hub of its network set.
    pub const fn is_hub(&self) -> bool {
        matches!(self, Self::Bifrost | Self::BifrostTestnet)
    }

    /// The canonical chain name, as used in configuration files.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bifrost => "bifrost",
            Self::Ethereum => "ethereum",
            Self::Binance => "binance",
            Self::Polygon => "polygon",
            Self::Base => "base",
            Self::BifrostTestnet => "bifrost-testnet",
            Self::Sepolia => "sepolia",
            Self::BinanceTestnet => "binance-testnet",
            Self::Amoy => "amoy",
            Self::BaseSepolia => "base-sepolia",
        }
    }

    /// Resolves a configuration chain name within the given network set.
    pub fn from_name(name: &str, network: NetworkKind) -> Option<Self> {
        network.chains().iter().copied().find(|chain| chain.name() == name)
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
