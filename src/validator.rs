//! Frame action validation pipeline.
//!
//! Every inbound frame POST lands here first. The pipeline has exactly three
//! distinguishable terminal failures, and callers depend on telling them
//! apart: `missing` means no signed action arrived yet (first render, not an
//! error), `hub` means the oracle rejected the message or could not be
//! reached, and `wallet` means chain reads for the signer's wallet failed.
//! No stage may collapse its failure into a neighboring kind.

use alloy_primitives::U256;
use serde::Deserialize;
use tracing::instrument;

use crate::hub::{FrameMessageOracle, HubMessage, MessageType};
use crate::wallet::{ResolveWallet, WalletInfo, WalletResolveError};

/// The JSON envelope a Farcaster client POSTs to a frame.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSignaturePacket {
    #[serde(default)]
    pub untrusted_data: Option<UntrustedData>,
    #[serde(default)]
    pub trusted_data: Option<TrustedData>,
}

/// Client-asserted fields; display-only, never trusted for authorization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UntrustedData {
    #[serde(default)]
    pub fid: Option<u64>,
    #[serde(default)]
    pub button_index: Option<u32>,
    #[serde(default)]
    pub input_text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// The signed protobuf message, hex-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedData {
    #[serde(default)]
    pub message_bytes: String,
}

/// A frame action the hub vouched for, plus the signer's wallet state.
#[derive(Debug, Clone)]
pub struct ValidatedFrameAction {
    pub message: HubMessage,
    pub wallet: WalletInfo,
}

impl ValidatedFrameAction {
    /// Index of the button the user pressed; 0 when the message carries no
    /// action body, which downstream dispatch rejects as unexpected.
    pub fn button_index(&self) -> u32 {
        self.message
            .data
            .as_ref()
            .and_then(|data| data.frame_action_body.as_ref())
            .map(|body| body.button_index)
            .unwrap_or(0)
    }

    pub fn fid(&self) -> u64 {
        self.message.data.as_ref().map(|data| data.fid).unwrap_or(0)
    }
}

/// Terminal outcomes of the validation pipeline, one variant per stage.
#[derive(Debug, thiserror::Error)]
pub enum FrameValidationError {
    /// No usable signature envelope; the caller should render the initial
    /// prompt frame rather than an error.
    #[error("missing frame signature: {reason}")]
    Missing { reason: String },
    /// The hub rejected the message or the hub call itself failed.
    #[error("hub validation failed: {reason}")]
    Hub { reason: String },
    /// The signer's wallet could not be resolved from chain state.
    #[error("wallet resolution failed: {reason}: {source}")]
    Wallet {
        reason: String,
        #[source]
        source: WalletResolveError,
    },
}

impl FrameValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            FrameValidationError::Missing { .. } => "missing",
            FrameValidationError::Hub { .. } => "hub",
            FrameValidationError::Wallet { .. } => "wallet",
        }
    }

    fn missing(reason: impl Into<String>) -> Self {
        FrameValidationError::Missing {
            reason: reason.into(),
        }
    }

    fn hub(reason: impl Into<String>) -> Self {
        FrameValidationError::Hub {
            reason: reason.into(),
        }
    }
}

/// Wallet salt from the `s` query parameter; 0 when absent or unparseable.
pub fn wallet_salt(param: Option<&str>) -> U256 {
    param
        .and_then(|value| value.parse::<u64>().ok())
        .map(U256::from)
        .unwrap_or(U256::ZERO)
}

/// Runs the full validation pipeline for one request body.
///
/// Decodes the signature packet, has the hub validate the signed message,
/// and resolves the acting identity's wallet with the request salt.
#[instrument(skip_all, fields(salt = %salt))]
pub async fn validate_frame_action<O, R>(
    oracle: &O,
    resolver: &R,
    salt: U256,
    body: &[u8],
) -> Result<ValidatedFrameAction, FrameValidationError>
where
    O: FrameMessageOracle,
    R: ResolveWallet,
{
    let packet: FrameSignaturePacket = serde_json::from_slice(body).map_err(|e| {
        FrameValidationError::missing(format!("request body is not a frame signature packet: {e}"))
    })?;
    let trusted = packet
        .trusted_data
        .ok_or_else(|| FrameValidationError::missing("frame signature packet has no trustedData"))?;
    let raw_message = hex::decode(trusted.message_bytes.trim_start_matches("0x"))
        .map_err(|e| FrameValidationError::missing(format!("messageBytes is not valid hex: {e}")))?;

    let response = oracle
        .validate(&raw_message)
        .await
        .map_err(|e| FrameValidationError::hub(format!("couldn't validate message with hub: {e}")))?;
    if !response.valid {
        return Err(FrameValidationError::hub("frame message was invalid"));
    }
    let message = response
        .message
        .ok_or_else(|| FrameValidationError::hub("hub returned no decoded message"))?;
    let (fid, message_type) = match message.data.as_ref() {
        Some(data) => (data.fid, data.message_type),
        None => return Err(FrameValidationError::hub("frame message has no data")),
    };
    if message_type != MessageType::FrameAction {
        return Err(FrameValidationError::hub("message is not a frame action"));
    }

    let wallet = resolver
        .resolve(fid, message.signer.as_slice(), salt)
        .await
        .map_err(|source| FrameValidationError::Wallet {
            reason: "couldn't get wallet info for the frame's user".to_string(),
            source,
        })?;

    Ok(ValidatedFrameAction { message, wallet })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{
        Base64Bytes, FarcasterNetwork, FrameActionBody, HexBytes, HubError, HubValidationResponse,
        MessageData,
    };
    use alloy_primitives::{Address, Bytes};

    enum OracleBehavior {
        Valid,
        Invalid,
        NoMessage,
        WrongType,
        Unreachable,
    }

    struct StubOracle(OracleBehavior);

    fn frame_action_message(message_type: MessageType) -> HubMessage {
        HubMessage {
            data: Some(MessageData {
                message_type,
                fid: 231775,
                timestamp: 97829680,
                network: FarcasterNetwork::Mainnet,
                frame_action_body: Some(FrameActionBody {
                    url: Base64Bytes(b"https://example.com/v1/abcd".to_vec()),
                    button_index: 2,
                    cast_id: None,
                    input_text: None,
                }),
            }),
            hash: HexBytes(vec![0x11; 20]),
            signature: Base64Bytes(vec![0x22; 64]),
            signer: HexBytes(vec![0x33; 32]),
        }
    }

    impl FrameMessageOracle for StubOracle {
        fn validate(
            &self,
            _raw_message: &[u8],
        ) -> impl Future<Output = Result<HubValidationResponse, HubError>> + Send {
            let result = match self.0 {
                OracleBehavior::Valid => Ok(HubValidationResponse {
                    valid: true,
                    message: Some(frame_action_message(MessageType::FrameAction)),
                }),
                OracleBehavior::Invalid => Ok(HubValidationResponse {
                    valid: false,
                    message: None,
                }),
                OracleBehavior::NoMessage => Ok(HubValidationResponse {
                    valid: true,
                    message: None,
                }),
                OracleBehavior::WrongType => Ok(HubValidationResponse {
                    valid: true,
                    message: Some(frame_action_message(MessageType::Other)),
                }),
                OracleBehavior::Unreachable => Err(()),
            };
            async move {
                match result {
                    Ok(response) => Ok(response),
                    Err(()) => {
                        let transport = reqwest::Client::new()
                            .post("http://127.0.0.1:0/")
                            .send()
                            .await
                            .unwrap_err();
                        Err(HubError::Transport(transport))
                    }
                }
            }
        }
    }

    struct StubResolver {
        fail: bool,
    }

    impl ResolveWallet for StubResolver {
        fn resolve(
            &self,
            _fid: u64,
            _signer_key: &[u8],
            salt: U256,
        ) -> impl Future<Output = Result<WalletInfo, WalletResolveError>> + Send {
            let fail = self.fail;
            async move {
                if fail {
                    Err(WalletResolveError::Factory(
                        alloy_contract::Error::ContractNotDeployed,
                    ))
                } else {
                    Ok(WalletInfo {
                        address: Address::repeat_byte(0x07),
                        nonce: U256::from(3u64),
                        code: Bytes::new(),
                        salt,
                    })
                }
            }
        }
    }

    const SIGNED_BODY: &[u8] =
        br#"{"trustedData":{"messageBytes":"0ac101080d10df920e18b0b6cc2e2001"}}"#;

    #[tokio::test]
    async fn malformed_body_is_missing() {
        let error = validate_frame_action(
            &StubOracle(OracleBehavior::Valid),
            &StubResolver { fail: false },
            U256::ZERO,
            b"not json",
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind(), "missing");
    }

    #[tokio::test]
    async fn body_without_trusted_data_is_missing() {
        let error = validate_frame_action(
            &StubOracle(OracleBehavior::Valid),
            &StubResolver { fail: false },
            U256::ZERO,
            br#"{"untrustedData":{"buttonIndex":1}}"#,
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind(), "missing");
    }

    #[tokio::test]
    async fn unreachable_hub_is_hub_kind() {
        let error = validate_frame_action(
            &StubOracle(OracleBehavior::Unreachable),
            &StubResolver { fail: false },
            U256::ZERO,
            SIGNED_BODY,
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind(), "hub");
    }

    #[tokio::test]
    async fn rejected_message_is_hub_kind() {
        for behavior in [
            OracleBehavior::Invalid,
            OracleBehavior::NoMessage,
            OracleBehavior::WrongType,
        ] {
            let error = validate_frame_action(
                &StubOracle(behavior),
                &StubResolver { fail: false },
                U256::ZERO,
                SIGNED_BODY,
            )
            .await
            .unwrap_err();
            assert_eq!(error.kind(), "hub");
        }
    }

    #[tokio::test]
    async fn failed_resolution_is_wallet_kind() {
        let error = validate_frame_action(
            &StubOracle(OracleBehavior::Valid),
            &StubResolver { fail: true },
            U256::ZERO,
            SIGNED_BODY,
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind(), "wallet");
    }

    #[tokio::test]
    async fn valid_action_carries_message_and_wallet() {
        let action = validate_frame_action(
            &StubOracle(OracleBehavior::Valid),
            &StubResolver { fail: false },
            U256::from(9u64),
            SIGNED_BODY,
        )
        .await
        .unwrap();
        assert_eq!(action.button_index(), 2);
        assert_eq!(action.fid(), 231775);
        assert_eq!(action.wallet.salt, U256::from(9u64));
    }

    #[test]
    fn salt_defaults_to_zero() {
        assert_eq!(wallet_salt(None), U256::ZERO);
        assert_eq!(wallet_salt(Some("")), U256::ZERO);
        assert_eq!(wallet_salt(Some("oops")), U256::ZERO);
        assert_eq!(wallet_salt(Some("7")), U256::from(7u64));
    }
}
