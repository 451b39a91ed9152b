//! The 32-byte asset composite used in cross-chain request parameters.

use alloy_primitives::{Address, FixedBytes, B256};

/// The 20-byte sentinel standing in for a native coin, where a bridged asset
/// would carry its ERC-20 address.
pub const COIN_ADDRESS_SENTINEL: Address =
    Address::new([0xff; 20]);

/// The asset type tag occupying bytes [4..8) of the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AssetKind {
    /// Unset.
    None = 0,
    /// A native coin.
    Coin = 1,
    /// A unified (hub-side) asset.
    Unified = 2,
    /// A bridged representation of a remote asset.
    Bridged = 3,
    /// Reserved.
    Reserved = 4,
}

impl TryFrom<u32> for AssetKind {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Coin),
            2 => Ok(Self::Unified),
            3 => Ok(Self::Bridged),
            4 => Ok(Self::Reserved),
            other => Err(other),
        }
    }
}

/// A 32-byte asset identifier:
/// `{symbol (4B), kind (4B), home chain network id (4B), address (20B)}`.
///
/// The address field holds the ERC-20 contract for token assets and
/// [`COIN_ADDRESS_SENTINEL`] for native coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetId {
    /// The right-zero-padded ticker symbol.
    pub symbol: FixedBytes<4>,
    /// The asset type.
    pub kind: AssetKind,
    /// The 4-byte network id of the asset's home chain.
    pub home_chain: FixedBytes<4>,
    /// The ERC-20 address, or the coin sentinel.
    pub address: Address,
}

impl AssetId {
    /// Builds an asset id from a ticker string of at most 4 bytes.
    pub fn new(symbol: &str, kind: AssetKind, home_chain: FixedBytes<4>, address: Address) -> Self {
        let mut sym = [0u8; 4];
        let bytes = symbol.as_bytes();
        sym[..bytes.len().min(4)].copy_from_slice(&bytes[..bytes.len().min(4)]);
        Self { symbol: FixedBytes::from(sym), kind, home_chain, address }
    }

    /// Encodes the composite into its canonical 32-byte form.
    pub fn encode(&self) -> B256 {
        let mut out = [0u8; 32];
        out[..4].copy_from_slice(self.symbol.as_slice());
        out[4..8].copy_from_slice(&(self.kind as u32).to_be_bytes());
        out[8..12].copy_from_slice(self.home_chain.as_slice());
        out[12..32].copy_from_slice(self.address.as_slice());
        B256::from(out)
    }

    /// Decodes the canonical 32-byte form. Fails on an unknown asset type.
    pub fn decode(raw: B256) -> Result<Self, u32> {
        let bytes = raw.0;
        let kind = u32::from_be_bytes(bytes[4..8].try_into().expect("4 bytes"));
        Ok(Self {
            symbol: FixedBytes::from_slice(&bytes[..4]),
            kind: AssetKind::try_from(kind)?,
            home_chain: FixedBytes::from_slice(&bytes[8..12]),
            address: Address::from_slice(&bytes[12..32]),
        })
    }

    /// The ticker as a string, trailing NULs stripped.
    pub fn ticker(&self) -> String {
        self.symbol
            .iter()
            .copied()
            .take_while(|b| *b != 0)
            .map(char::from)
            .collect()
    }

    /// The decimal count derived from the symbol: 6 for USDC/USDT, 18
    /// otherwise.
    pub fn decimals(&self) -> u8 {
        match self.ticker().as_str() {
            "USDC" | "USDT" => 6,
            _ => 18,
        }
    }

    /// Whether the asset is a native coin.
    pub fn is_coin(&self) -> bool {
        self.address == COIN_ADDRESS_SENTINEL
    }
}
