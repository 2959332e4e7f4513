//! Compressed partial user-operation tokens.
//!
//! A prepared transaction travels inside a frame URL rather than a database:
//! the seven parameters that describe it are ABI-encoded as a single dynamic
//! tuple, raw-deflated, and hex-encoded into a path segment. The sign flow
//! later reverses the pipeline. The ABI schema is
//! `(uint256,bytes,uint256,uint256,uint256,uint256,uint256)` and must stay
//! byte-compatible with any compliant ABI coder, since tokens minted by other
//! tooling are expected to decode here and vice versa.

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{SolValue, sol};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

sol! {
    /// Wire schema of the token payload. Field order is the wire format;
    /// renaming a field is fine, reordering is a protocol break.
    struct PartialUserOpSchema {
        uint256 chain_id;
        bytes call_data;
        uint256 call_gas_limit;
        uint256 verification_gas_limit;
        uint256 pre_verification_gas;
        uint256 max_fee_per_gas;
        uint256 max_priority_fee_per_gas;
    }
}

/// The gas and fee parameters of a transaction prepared for signing, before
/// any wallet-specific fields (sender, nonce, signature) are known.
///
/// Created by the generate-transaction flow, carried inside the sign URL,
/// and never persisted server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialUserOp {
    pub chain_id: U256,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Errors produced while encoding or decoding a transaction token.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The token path segment is not valid hex.
    #[error("token is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// The hex payload is not a raw-deflate stream.
    #[error("token is not valid raw-deflate data: {0}")]
    Deflate(#[from] std::io::Error),
    /// The inflated payload does not match the partial user-op tuple schema.
    #[error("token payload does not match the partial user-op schema: {0}")]
    Abi(#[from] alloy_sol_types::Error),
}

impl From<PartialUserOp> for PartialUserOpSchema {
    fn from(op: PartialUserOp) -> Self {
        PartialUserOpSchema {
            chain_id: op.chain_id,
            call_data: op.call_data,
            call_gas_limit: op.call_gas_limit,
            verification_gas_limit: op.verification_gas_limit,
            pre_verification_gas: op.pre_verification_gas,
            max_fee_per_gas: op.max_fee_per_gas,
            max_priority_fee_per_gas: op.max_priority_fee_per_gas,
        }
    }
}

impl From<PartialUserOpSchema> for PartialUserOp {
    fn from(schema: PartialUserOpSchema) -> Self {
        PartialUserOp {
            chain_id: schema.chain_id,
            call_data: schema.call_data,
            call_gas_limit: schema.call_gas_limit,
            verification_gas_limit: schema.verification_gas_limit,
            pre_verification_gas: schema.pre_verification_gas,
            max_fee_per_gas: schema.max_fee_per_gas,
            max_priority_fee_per_gas: schema.max_priority_fee_per_gas,
        }
    }
}

impl PartialUserOp {
    /// ABI-encodes the tuple, including the leading offset word of the
    /// standalone dynamic-tuple encoding.
    pub fn abi_encode(&self) -> Vec<u8> {
        PartialUserOpSchema::from(self.clone()).abi_encode()
    }

    /// Inverse of [`PartialUserOp::abi_encode`].
    pub fn abi_decode(data: &[u8]) -> Result<Self, CodecError> {
        let schema = PartialUserOpSchema::abi_decode(data)?;
        Ok(schema.into())
    }

    /// Encodes, compresses, and hex-encodes this op into a URL path segment.
    pub fn to_token(&self) -> Result<String, CodecError> {
        let compressed = compress(&self.abi_encode())?;
        Ok(hex::encode(compressed))
    }

    /// Decodes a URL path segment produced by [`PartialUserOp::to_token`].
    pub fn from_token(token: &str) -> Result<Self, CodecError> {
        let compressed = hex::decode(token.trim_start_matches("0x"))?;
        let encoded = decompress(&compressed)?;
        Self::abi_decode(&encoded)
    }
}

/// Raw-deflate (no zlib or gzip header) at the maximum compression level.
pub fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Raw-inflate. Fails on anything that is not a valid deflate stream.
pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    DeflateDecoder::new(data).read_to_end(&mut decoded)?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::bytes;

    // A token minted by the production deployment: a WETH deposit on Base
    // wrapped in the wallet's execute() call.
    const MAINNET_TOKEN: &str = "6360c00b14f04b2bb2e2976778805f3a00bfb48fb7031e59c6749f678a78f5f3bbbdc22fefe440c0fd4bb6c9aa7f431670c254c386cf00eb59a70858c19040409ee5c263de0d0c640200";

    fn sample_op() -> PartialUserOp {
        PartialUserOp {
            chain_id: U256::from(8453u64),
            call_data: bytes!("b61d27f6000000000000000000000000000000000000000000000000000000000000dead"),
            call_gas_limit: U256::from(500_000u64),
            verification_gas_limit: U256::from(5_000_000u64),
            pre_verification_gas: U256::from(40_000u64),
            max_fee_per_gas: U256::from(1_001_194u64),
            max_priority_fee_per_gas: U256::from(1_000_000u64),
        }
    }

    #[test]
    fn token_round_trip() {
        let op = sample_op();
        let token = op.to_token().unwrap();
        let decoded = PartialUserOp::from_token(&token).unwrap();
        assert_eq!(decoded, op);
    }

    #[test]
    fn round_trip_with_empty_call_data() {
        let op = PartialUserOp {
            call_data: Bytes::new(),
            ..sample_op()
        };
        let token = op.to_token().unwrap();
        assert_eq!(PartialUserOp::from_token(&token).unwrap(), op);
    }

    #[test]
    fn encoding_is_a_standalone_dynamic_tuple() {
        let encoded = sample_op().abi_encode();
        assert_eq!(encoded.len() % 32, 0);
        // Offset word to the tuple body, then chain id as the first member.
        assert_eq!(U256::from_be_slice(&encoded[..32]), U256::from(0x20u64));
        assert_eq!(U256::from_be_slice(&encoded[32..64]), U256::from(8453u64));
    }

    #[test]
    fn decodes_mainnet_token() {
        let op = PartialUserOp::from_token(MAINNET_TOKEN).unwrap();
        assert_eq!(op.chain_id, U256::from(8453u64));
        assert_eq!(op.call_gas_limit, U256::from(20_480u64));
        assert_eq!(op.verification_gas_limit, U256::from(5_000_000u64));
        assert_eq!(op.pre_verification_gas, U256::from(6_028_060_193u64));
        assert_eq!(op.max_fee_per_gas, U256::from(1_001_194u64));
        assert_eq!(op.max_priority_fee_per_gas, U256::from(1_000_000u64));
        assert_eq!(op.call_data.len(), 164);
        assert_eq!(&op.call_data[..4], [0xb6, 0x1d, 0x27, 0xf6]);
    }

    #[test]
    fn mainnet_token_round_trips_through_the_schema() {
        let op = PartialUserOp::from_token(MAINNET_TOKEN).unwrap();
        let reencoded = PartialUserOp::abi_decode(&op.abi_encode()).unwrap();
        assert_eq!(reencoded, op);
    }

    #[test]
    fn rejects_non_hex_tokens() {
        assert!(matches!(
            PartialUserOp::from_token("zzzz"),
            Err(CodecError::Hex(_))
        ));
    }

    #[test]
    fn rejects_non_deflate_payloads() {
        // 0xff opens a reserved deflate block type.
        assert!(matches!(
            PartialUserOp::from_token("ffffffffffffffff"),
            Err(CodecError::Deflate(_))
        ));
    }

    #[test]
    fn rejects_payloads_with_wrong_schema() {
        let compressed = compress(b"not an abi tuple").unwrap();
        let token = hex::encode(compressed);
        assert!(matches!(
            PartialUserOp::from_token(&token),
            Err(CodecError::Abi(_))
        ));
    }
}
