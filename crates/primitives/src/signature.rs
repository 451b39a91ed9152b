//! ECDSA signature forms exchanged with the hub contracts.

use alloy_primitives::{Bytes, Signature, B256};

/// A recoverable secp256k1 signature in its on-chain `(r, s, v)` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature {
    /// The r scalar.
    pub r: B256,
    /// The s scalar.
    pub s: B256,
    /// The recovery id, offset to 27/28.
    pub v: u8,
}

impl From<Signature> for EcdsaSignature {
    fn from(sig: Signature) -> Self {
        Self {
            r: B256::from(sig.r().to_be_bytes::<32>()),
            s: B256::from(sig.s().to_be_bytes::<32>()),
            v: 27 + sig.v() as u8,
        }
    }
}

/// A quorum of signatures in the parallel-array layout returned by the
/// hub's `get_signatures` and `get_round_signatures` views: all `r` scalars,
/// all `s` scalars, and the concatenated `v` bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedSignatures {
    /// The r scalars.
    pub r: Vec<B256>,
    /// The s scalars.
    pub s: Vec<B256>,
    /// The concatenated recovery bytes.
    pub v: Bytes,
}

impl AggregatedSignatures {
    /// The number of signatures carried.
    pub fn len(&self) -> usize {
        self.r.len()
    }

    /// Whether no signature is carried.
    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }
}

impl From<EcdsaSignature> for AggregatedSignatures {
    fn from(sig: EcdsaSignature) -> Self {
        Self { r: vec![sig.r], s: vec![sig.s], v: Bytes::from(vec![sig.v]) }
    }
}

impl FromIterator<EcdsaSignature> for AggregatedSignatures {
    fn from_iter<I: IntoIterator<Item = EcdsaSignature>>(iter: I) -> Self {
        let mut out = Self::default();
        let mut v = Vec::new();
        for sig in iter {
            out.r.push(sig.r);
            out.s.push(sig.s);
            v.push(sig.v);
        }
        out.v = v.into();
        out
    }
}
