//! ERC-4337 user-operation assembly.
//!
//! The wallet contract authenticates a transaction by re-verifying the
//! frame action that approved it. The hub hands us that action as a decoded
//! protobuf, but the contract can only parse ABI input, so the message is
//! deliberately re-encoded into a fixed ABI tuple together with the ed25519
//! signature and the compressed transaction token the user saw. That tuple
//! becomes the operation's `signature` field.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue, sol};
use serde::{Deserialize, Serialize};

use crate::hub::HubMessage;
use crate::wallet::WalletInfo;

sol! {
    struct CastIdTuple {
        uint64 fid;
        bytes hash;
    }

    struct FrameActionBodyTuple {
        bytes url;
        uint32 button_index;
        CastIdTuple cast_id;
    }

    struct MessageDataTuple {
        uint8 message_type;
        uint64 fid;
        uint32 timestamp;
        uint8 network;
        FrameActionBodyTuple body;
    }

    /// What the wallet contract parses out of `UserOperation.signature`.
    struct FrameUserOpSignature {
        MessageDataTuple message_data;
        bytes ed25519_signature;
        bytes compressed_partial_user_op;
    }
}

/// An ERC-4337 v0.6 user operation in bundler wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

/// The subset of an operation a gas estimator needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateUserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    /// The hub message lacks the fields a frame action must carry.
    #[error("validated message has no frame action data")]
    IncompleteMessage,
}

/// Re-encodes a hub-validated frame action into the ABI tuple the wallet
/// contract verifies on-chain.
pub fn encode_frame_signature(
    message: &HubMessage,
    compressed_partial_user_op: &[u8],
) -> Result<Bytes, AssembleError> {
    let data = message.data.as_ref().ok_or(AssembleError::IncompleteMessage)?;
    let body = data
        .frame_action_body
        .as_ref()
        .ok_or(AssembleError::IncompleteMessage)?;
    let cast_id = body.cast_id.clone().unwrap_or_default();

    let tuple = FrameUserOpSignature {
        message_data: MessageDataTuple {
            message_type: data.message_type.proto_value(),
            fid: data.fid,
            timestamp: data.timestamp,
            network: data.network.proto_value(),
            body: FrameActionBodyTuple {
                url: body.url.as_slice().to_vec().into(),
                button_index: body.button_index,
                cast_id: CastIdTuple {
                    fid: cast_id.fid,
                    hash: cast_id.hash.as_slice().to_vec().into(),
                },
            },
        },
        ed25519_signature: message.signature.as_slice().to_vec().into(),
        compressed_partial_user_op: compressed_partial_user_op.to_vec().into(),
    };
    Ok(tuple.abi_encode().into())
}

/// Builds the ERC-4337 initCode: empty once the wallet is deployed, otherwise
/// the factory address followed by the encoded `createAccount` call.
pub fn build_init_code(
    wallet: &WalletInfo,
    fid: u64,
    signer_key: &[u8],
    factory: Address,
) -> Bytes {
    if wallet.is_deployed() {
        return Bytes::new();
    }
    let call = crate::wallet::IFrameWalletFactory::createAccountCall {
        fid: U256::from(fid),
        signerKey: Bytes::copy_from_slice(signer_key),
        salt: wallet.salt,
    };
    let encoded = call.abi_encode();
    let mut init_code = Vec::with_capacity(Address::len_bytes() + encoded.len());
    init_code.extend_from_slice(factory.as_slice());
    init_code.extend_from_slice(&encoded);
    init_code.into()
}

/// Gas parameters policy for the prepare flow.
///
/// These are empirically tuned operational knobs, not protocol constants:
/// estimators routinely under-report verification gas for this wallet and
/// over-report pre-verification gas, so the defaults below came out of
/// running against live bundlers and are all overridable in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GasPolicy {
    /// Floor under the estimator's callGasLimit.
    pub min_call_gas_limit: u64,
    /// Used when the estimator fails or returns nothing.
    pub fallback_call_gas_limit: u64,
    /// Fixed verification gas; estimator figures proved unreliable.
    pub verification_gas_limit: u64,
    /// Flat pre-verification gas component.
    pub base_pre_verification_gas: u64,
    /// OP-stack gas price oracle. When set, the L1 data fee for the calldata
    /// is converted into L2 gas units and added to the flat component.
    pub l1_fee_oracle: Option<Address>,
}

impl Default for GasPolicy {
    fn default() -> Self {
        GasPolicy {
            min_call_gas_limit: 100_000,
            fallback_call_gas_limit: 500_000,
            verification_gas_limit: 5_000_000,
            base_pre_verification_gas: 40_000,
            l1_fee_oracle: None,
        }
    }
}

impl GasPolicy {
    /// Call gas limit from an estimator figure, floored at the minimum.
    pub fn call_gas_limit(&self, estimated: Option<U256>) -> U256 {
        let limit = estimated.unwrap_or(U256::from(self.fallback_call_gas_limit));
        limit.max(U256::from(self.min_call_gas_limit))
    }

    pub fn verification_gas_limit(&self) -> U256 {
        U256::from(self.verification_gas_limit)
    }

    /// Pre-verification gas: the flat component, plus the L1 data fee
    /// converted at the current max fee per gas when an oracle reported one.
    pub fn pre_verification_gas(&self, l1_fee: Option<U256>, max_fee_per_gas: U256) -> U256 {
        let base = U256::from(self.base_pre_verification_gas);
        match l1_fee {
            Some(fee) if !max_fee_per_gas.is_zero() => base + fee / max_fee_per_gas,
            _ => base,
        }
    }
}

/// Identity and signature that pass the wallet's signature-shape check
/// without being cryptographically valid. Gas estimation simulates
/// verification, so the operation must carry an fid/signer/salt triple that
/// matches the bytes inside this signature.
pub mod estimation_dummy {
    use alloy_primitives::{Bytes, bytes};

    pub const FID: u64 = 231775;

    pub const SIGNER_KEY: Bytes =
        bytes!("31351506585341467af8e18295bbd3eea2d5ea942edaf612f915f8e9cf639419");

    pub const SIGNATURE: Bytes = bytes!(
        "0000000000000000000000000000000000000000000000000000000000000020000000000000000000000000000000000000000000000000000000000000006000000000000000000000000000000000000000000000000000000000000002c00000000000000000000000000000000000000000000000000000000000000320000000000000000000000000000000000000000000000000000000000000000d000000000000000000000000000000000000000000000000000000000003895f0000000000000000000000000000000000000000000000000000000005e7144b000000000000000000000000000000000000000000000000000000000000000100000000000000000000000000000000000000000000000000000000000000a000000000000000000000000000000000000000000000000000000000000000600000000000000000000000000000000000000000000000000000000000000001000000000000000000000000000000000000000000000000000000000000014000000000000000000000000000000000000000000000000000000000000000af68747470733a2f2f307866772e76657263656c2e6170702f76312f363336306330306231346630346232626232653239373637373838303566336130306266623438666237303331653539633637343966363738613738663566336262626463323266656665343430633066643462623663396161376634333136373063323534633338366366303065623539613730383538633139303430343039656535633236336465306430633634303230300000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000003895f0000000000000000000000000000000000000000000000000000000000000040000000000000000000000000000000000000000000000000000000000000001400000000000000000000000000000000000000010000000000000000000000000000000000000000000000000000000000000000000000000000000000000040a8e1f31939d5dd821674284ed6333bf9fa7c24e3744455553127c6b0a2c2fd701c3d611fa57360faf7ffc0e06650695b42410564e9179fd36ff6fda0f93bf202000000000000000000000000000000000000000000000000000000000000004a6360c00b14f04b2bb2e2976778805f3a00bfb48fb7031e59c6749f678a78f5f3bbbdc22fefe440c0fd4bb6c9aa7f431670c254c386cf00eb59a70858c19040409ee5c263de0d0c64020000000000000000000000000000000000000000000000"
    );
}
