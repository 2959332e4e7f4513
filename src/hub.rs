//! Farcaster hub client: the signature-verification oracle.
//!
//! Frame action messages are never validated locally. The raw protobuf bytes
//! from the frame signature packet are shipped to a hub's
//! `/v1/validateMessage` endpoint, and only the hub's decoded view of the
//! message is trusted afterwards. The hub's JSON encodes bytes fields
//! unevenly (base64 for message payloads, 0x-hex for hashes and signers),
//! which the newtypes below absorb.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::instrument;
use url::Url;

/// Bytes carried as a 0x-prefixed hex string in hub JSON.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexBytes(0x{})", hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        HexBytes(bytes)
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| serde::de::Error::custom(format!("invalid hex bytes: {e}")))?;
        Ok(HexBytes(bytes))
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
    }
}

/// Bytes carried as a base64 string in hub JSON.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Base64Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Base64Bytes({})", b64.encode(&self.0))
    }
}

impl From<Vec<u8>> for Base64Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Base64Bytes(bytes)
    }
}

impl<'de> Deserialize<'de> for Base64Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = b64
            .decode(&s)
            .map_err(|e| serde::de::Error::custom(format!("invalid base64 bytes: {e}")))?;
        Ok(Base64Bytes(bytes))
    }
}

impl Serialize for Base64Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&b64.encode(&self.0))
    }
}

/// Protocol message types this server cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MessageType {
    #[serde(rename = "MESSAGE_TYPE_FRAME_ACTION")]
    FrameAction,
    #[serde(other)]
    Other,
}

impl MessageType {
    /// Numeric value of the protobuf enum, used for ABI re-encoding.
    pub fn proto_value(&self) -> u8 {
        match self {
            MessageType::FrameAction => 13,
            MessageType::Other => 0,
        }
    }
}

/// Farcaster network the message was signed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FarcasterNetwork {
    #[serde(rename = "FARCASTER_NETWORK_MAINNET")]
    Mainnet,
    #[serde(rename = "FARCASTER_NETWORK_TESTNET")]
    Testnet,
    #[serde(rename = "FARCASTER_NETWORK_DEVNET")]
    Devnet,
    #[serde(other)]
    Other,
}

impl FarcasterNetwork {
    pub fn proto_value(&self) -> u8 {
        match self {
            FarcasterNetwork::Mainnet => 1,
            FarcasterNetwork::Testnet => 2,
            FarcasterNetwork::Devnet => 3,
            FarcasterNetwork::Other => 0,
        }
    }
}

/// Provenance reference to the cast the frame was rendered under.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastId {
    #[serde(default)]
    pub fid: u64,
    #[serde(default)]
    pub hash: HexBytes,
}

/// The action payload inside a frame-action message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameActionBody {
    /// Frame URL the action was taken on.
    #[serde(default)]
    pub url: Base64Bytes,
    #[serde(default)]
    pub button_index: u32,
    #[serde(default)]
    pub cast_id: Option<CastId>,
    #[serde(default)]
    pub input_text: Option<Base64Bytes>,
}

/// The data section of a hub-decoded message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub fid: u64,
    /// Seconds since the Farcaster epoch.
    pub timestamp: u32,
    pub network: FarcasterNetwork,
    #[serde(default)]
    pub frame_action_body: Option<FrameActionBody>,
}

/// A message as decoded and returned by the hub.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubMessage {
    #[serde(default)]
    pub data: Option<MessageData>,
    #[serde(default)]
    pub hash: HexBytes,
    /// Ed25519 signature over the message payload.
    #[serde(default)]
    pub signature: Base64Bytes,
    /// Public key of the signer the user delegated to the client app.
    #[serde(default)]
    pub signer: HexBytes,
}

/// Reply of `/v1/validateMessage`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubValidationResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub message: Option<HubMessage>,
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("hub request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Remote oracle that decides whether a signed frame action is authentic.
pub trait FrameMessageOracle {
    fn validate(
        &self,
        raw_message: &[u8],
    ) -> impl Future<Output = Result<HubValidationResponse, HubError>> + Send;
}

/// HTTP client for a hub's validation endpoint.
#[derive(Debug, Clone)]
pub struct HttpHub {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHub {
    pub fn new(base_url: Url) -> Self {
        HttpHub {
            client: reqwest::Client::new(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        }
    }
}

impl FrameMessageOracle for HttpHub {
    #[instrument(skip_all, err)]
    async fn validate(&self, raw_message: &[u8]) -> Result<HubValidationResponse, HubError> {
        let url = format!("{}/v1/validateMessage", self.base_url);
        let response: HubValidationResponse = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(raw_message.to_vec())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALIDATE_RESPONSE: &str = r#"{
        "valid": true,
        "message": {
            "data": {
                "type": "MESSAGE_TYPE_FRAME_ACTION",
                "fid": 231775,
                "timestamp": 97829680,
                "network": "FARCASTER_NETWORK_MAINNET",
                "frameActionBody": {
                    "url": "aHR0cHM6Ly8weGZ3LnZlcmNlbC5hcHAvdjEvYWJjZA==",
                    "buttonIndex": 1,
                    "castId": {
                        "fid": 226,
                        "hash": "0x0000000000000000000000000000000000000001"
                    }
                }
            },
            "hash": "0x264e32086de5eb915e89ff23b06ceb7acfa94ef5",
            "signature": "tzU4tDQrjW9ZC26j/FnhzGRghlAkrs4JZ0r2dJ6Cp5NMXLpOE2wCraWF/htaxVMEED56QXFh577b4cZBv3XQCQ==",
            "signer": "0x31351506585341467af8e18295bbd3eea2d5ea942edaf612f915f8e9cf639419"
        }
    }"#;

    #[test]
    fn parses_validate_message_response() {
        let response: HubValidationResponse = serde_json::from_str(VALIDATE_RESPONSE).unwrap();
        assert!(response.valid);
        let message = response.message.unwrap();
        assert_eq!(message.signer.as_slice().len(), 32);
        assert_eq!(message.signature.as_slice().len(), 64);

        let data = message.data.unwrap();
        assert_eq!(data.message_type, MessageType::FrameAction);
        assert_eq!(data.message_type.proto_value(), 13);
        assert_eq!(data.network.proto_value(), 1);
        assert_eq!(data.fid, 231775);

        let body = data.frame_action_body.unwrap();
        assert_eq!(body.button_index, 1);
        assert_eq!(
            String::from_utf8(body.url.as_slice().to_vec()).unwrap(),
            "https://0xfw.vercel.app/v1/abcd"
        );
        assert_eq!(body.cast_id.unwrap().hash.as_slice().len(), 20);
    }

    #[test]
    fn unknown_message_types_do_not_fail_parsing() {
        let response: HubValidationResponse = serde_json::from_str(
            r#"{"valid": true, "message": {"data": {
                "type": "MESSAGE_TYPE_CAST_ADD", "fid": 1, "timestamp": 0,
                "network": "FARCASTER_NETWORK_MAINNET"
            }}}"#,
        )
        .unwrap();
        let data = response.message.unwrap().data.unwrap();
        assert_eq!(data.message_type, MessageType::Other);
        assert!(data.frame_action_body.is_none());
    }

    #[test]
    fn invalid_reply_defaults() {
        let response: HubValidationResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!response.valid);
        assert!(response.message.is_none());
    }
}
