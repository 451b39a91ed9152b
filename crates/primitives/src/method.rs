//! The 16-byte cross-chain method descriptor.

use alloy_primitives::FixedBytes;

/// The direction prefix of an RBC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// Request originates on a peripheral chain.
    Inbound = 0x01,
    /// Request originates on the hub.
    Outbound = 0x02,
    /// Request crosses in both directions.
    InAndOutbound = 0x03,
}

impl TryFrom<u8> for Direction {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Inbound),
            0x02 => Ok(Self::Outbound),
            0x03 => Ok(Self::InAndOutbound),
            other => Err(other),
        }
    }
}

/// A single bridge operation opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Move an asset across chains.
    Warp = 0x01,
    /// Convert a bridged asset into its unified form.
    Unify = 0x02,
    /// Convert a unified asset back into a bridged form.
    Split = 0x03,
    /// Unify then split in one request.
    UnifySplit = 0x04,
    /// Deposit into a pool.
    Deposit = 0x05,
    /// Withdraw from a pool.
    Withdraw = 0x06,
    /// Borrow against collateral.
    Borrow = 0x07,
    /// Repay a borrow position.
    Repay = 0x08,
    /// Open a cross-chain position.
    XOpen = 0x09,
    /// Close a cross-chain position.
    XEnd = 0x0a,
    /// Swap between assets.
    Swap = 0x0b,
    /// Arbitrary contract call.
    Call = 0x0c,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Warp),
            0x02 => Ok(Self::Unify),
            0x03 => Ok(Self::Split),
            0x04 => Ok(Self::UnifySplit),
            0x05 => Ok(Self::Deposit),
            0x06 => Ok(Self::Withdraw),
            0x07 => Ok(Self::Borrow),
            0x08 => Ok(Self::Repay),
            0x09 => Ok(Self::XOpen),
            0x0a => Ok(Self::XEnd),
            0x0b => Ok(Self::Swap),
            0x0c => Ok(Self::Call),
            other => Err(other),
        }
    }
}

/// A length-prefixed opcode sequence with a direction prefix, serialized
/// into 16 bytes: `{direction, len, opcodes.., 0 padding}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbcMethod {
    /// The request direction.
    pub direction: Direction,
    /// The operations, executed in order. At most 14.
    pub opcodes: Vec<Opcode>,
}

/// Failure to decode an [`RbcMethod`] from its 16-byte form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidMethod {
    /// The direction prefix is unknown.
    #[error("unknown direction prefix {0:#04x}")]
    Direction(u8),
    /// The declared length exceeds the available bytes.
    #[error("opcode length {0} out of bounds")]
    Length(u8),
    /// An opcode byte is unknown.
    #[error("unknown opcode {0:#04x}")]
    Opcode(u8),
    /// Bytes past the declared length are non-zero.
    #[error("non-zero padding")]
    Padding,
}

impl RbcMethod {
    /// Encodes into the canonical 16-byte form, right-zero-padded after the
    /// used opcodes.
    pub fn encode(&self) -> FixedBytes<16> {
        debug_assert!(self.opcodes.len() <= 14);
        let mut out = [0u8; 16];
        out[0] = self.direction as u8;
        out[1] = self.opcodes.len() as u8;
        for (i, op) in self.opcodes.iter().enumerate().take(14) {
            out[2 + i] = *op as u8;
        }
        FixedBytes::from(out)
    }

    /// Decodes the canonical 16-byte form.
    pub fn decode(raw: FixedBytes<16>) -> Result<Self, InvalidMethod> {
        let bytes = raw.0;
        let direction = Direction::try_from(bytes[0]).map_err(InvalidMethod::Direction)?;
        let len = bytes[1];
        if len as usize > 14 {
            return Err(InvalidMethod::Length(len));
        }
        let opcodes = bytes[2..2 + len as usize]
            .iter()
            .map(|b| Opcode::try_from(*b).map_err(InvalidMethod::Opcode))
            .collect::<Result<Vec<_>, _>>()?;
        if bytes[2 + len as usize..].iter().any(|b| *b != 0) {
            return Err(InvalidMethod::Padding);
        }
        Ok(Self { direction, opcodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let method = RbcMethod {
            direction: Direction::Inbound,
            opcodes: vec![Opcode::Warp, Opcode::Unify],
        };
        let encoded = method.encode();
        assert_eq!(encoded.as_slice()[..4], [0x01, 0x02, 0x01, 0x02]);
        assert_eq!(RbcMethod::decode(encoded).unwrap(), method);
    }

    #[test]
    fn test_padding_is_zero() {
        let method =
            RbcMethod { direction: Direction::Outbound, opcodes: vec![Opcode::Swap] };
        let encoded = method.encode();
        assert!(encoded.as_slice()[3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut raw = [0u8; 16];
        raw[0] = 0x01;
        raw[1] = 1;
        raw[2] = 0xff;
        assert_eq!(
            RbcMethod::decode(FixedBytes::from(raw)),
            Err(InvalidMethod::Opcode(0xff))
        );

        raw[0] = 0x07;
        assert_eq!(
            RbcMethod::decode(FixedBytes::from(raw)),
            Err(InvalidMethod::Direction(0x07))
        );
    }
}
