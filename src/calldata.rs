//! Best-effort decoding of opaque calldata into a readable function call.
//!
//! The preview frame needs to show a user what they are about to sign. The
//! decoder pulls the 4-byte selector, unwraps the wallet's `execute()`
//! envelope when present (one level, the protocol never nests deeper), asks
//! the signature directory for candidate signatures, and tries them
//! oldest-first against the actual bytes. Nothing here can fail: input that
//! resists decoding degrades to a raw-bytes rendering.

use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::Function;

use crate::fourbyte::{SignatureDirectory, SignatureRecord};

/// Selector and signature of the smart wallet's generic execute wrapper.
pub const EXECUTE_SELECTOR: [u8; 4] = [0xb6, 0x1d, 0x27, 0xf6];
pub const EXECUTE_SIGNATURE: &str = "execute(address,uint256,bytes)";

/// A single decoded argument, stringified for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedArg {
    pub type_name: String,
    pub value: String,
}

/// Target and value recovered from an unwrapped `execute()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteContext {
    pub to: String,
    pub value: String,
}

/// Human-readable explanation of a calldata blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCall {
    /// Textual signature, or the 0x-hex selector when nothing decoded.
    pub signature: String,
    pub args: Vec<DecodedArg>,
    /// Present when the outer call was the wallet's `execute()` wrapper.
    pub execute: Option<ExecuteContext>,
}

impl DecodedCall {
    /// The function name without its parameter list.
    pub fn function_name(&self) -> &str {
        self.signature.split('(').next().unwrap_or(&self.signature)
    }
}

/// Calldata decoder backed by a signature directory.
#[derive(Debug, Clone)]
pub struct CalldataDecoder<D> {
    directory: D,
}

impl<D: SignatureDirectory> CalldataDecoder<D> {
    pub fn new(directory: D) -> Self {
        CalldataDecoder { directory }
    }

    /// Decodes `call_data` as far as possible. Never fails; undecodable
    /// input falls back to a raw-bytes argument keyed by its selector.
    pub async fn decode(&self, call_data: &[u8]) -> DecodedCall {
        if call_data.len() < 4 {
            return DecodedCall {
                signature: format!("0x{}", hex::encode(call_data)),
                args: vec![DecodedArg {
                    type_name: "raw".to_string(),
                    value: "0x".to_string(),
                }],
                execute: None,
            };
        }

        // The wallet is normally handed an execute() call; the interesting
        // selector is the one inside it. Unwrap a single level and keep the
        // target and value for display.
        let mut target = call_data.to_vec();
        let mut execute = None;
        if target[..4] == EXECUTE_SELECTOR {
            if let Some(outer) = try_signatures(&[EXECUTE_SIGNATURE.to_string()], &target) {
                if let [to, value, inner] = outer.args.as_slice() {
                    let inner_bytes = hex::decode(inner.value.trim_start_matches("0x")).ok();
                    if let Some(inner_bytes) = inner_bytes.filter(|b| b.len() >= 4) {
                        execute = Some(ExecuteContext {
                            to: to.value.clone(),
                            value: value.value.clone(),
                        });
                        target = inner_bytes;
                    }
                }
            }
        }

        let mut selector = [0u8; 4];
        selector.copy_from_slice(&target[..4]);

        match self.directory.lookup(selector).await {
            Ok(mut records) => {
                // Collisions are common; the oldest registration that fully
                // decodes the bytes wins.
                records.sort_by_key(|record| record.id);
                let signatures: Vec<String> = records
                    .into_iter()
                    .map(|record: SignatureRecord| record.text_signature)
                    .collect();
                if let Some(mut decoded) = try_signatures(&signatures, &target) {
                    decoded.execute = execute;
                    return decoded;
                }
            }
            Err(error) => {
                tracing::debug!(%error, selector = %hex::encode(selector), "signature directory lookup failed");
            }
        }

        raw_fallback(&target, execute)
    }
}

/// Tries each candidate signature in order; the first one whose full ABI
/// decode of the post-selector bytes succeeds wins.
fn try_signatures(signatures: &[String], call_data: &[u8]) -> Option<DecodedCall> {
    for signature in signatures {
        let Ok(function) = Function::parse(signature) else {
            continue;
        };
        let Ok(values) = function.abi_decode_input(&call_data[4..]) else {
            continue;
        };
        if values.len() != function.inputs.len() {
            continue;
        }
        let args = function
            .inputs
            .iter()
            .zip(values.iter())
            .map(|(input, value)| DecodedArg {
                type_name: input.ty.clone(),
                value: format_value(value),
            })
            .collect();
        return Some(DecodedCall {
            signature: signature.clone(),
            args,
            execute: None,
        });
    }
    None
}

fn raw_fallback(call_data: &[u8], execute: Option<ExecuteContext>) -> DecodedCall {
    DecodedCall {
        signature: format!("0x{}", hex::encode(&call_data[..4])),
        args: vec![DecodedArg {
            type_name: "raw".to_string(),
            value: format!("0x{}", hex::encode(&call_data[4..])),
        }],
        execute,
    }
}

/// Stringifies a decoded value the way a block explorer would.
#[allow(unreachable_patterns)]
fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(address) => address.to_string(),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", hex::encode(&word[..*size])),
        DynSolValue::Bytes(bytes) => format!("0x{}", hex::encode(bytes)),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Function(f) => format!("0x{}", hex::encode(f.as_slice())),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(","))
        }
        DynSolValue::Tuple(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("({})", inner.join(","))
        }
        _ => format!("{value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourbyte::DirectoryError;

    struct StubDirectory {
        records: Result<Vec<(u64, &'static str)>, ()>,
    }

    impl StubDirectory {
        fn with(records: Vec<(u64, &'static str)>) -> Self {
            StubDirectory {
                records: Ok(records),
            }
        }

        fn failing() -> Self {
            StubDirectory { records: Err(()) }
        }
    }

    impl SignatureDirectory for StubDirectory {
        fn lookup(
            &self,
            _selector: [u8; 4],
        ) -> impl Future<Output = Result<Vec<SignatureRecord>, DirectoryError>> + Send {
            let records = self.records.clone();
            async move {
                match records {
                    Ok(records) => Ok(records
                        .into_iter()
                        .map(|(id, text_signature)| SignatureRecord {
                            id,
                            text_signature: text_signature.to_string(),
                        })
                        .collect()),
                    Err(()) => {
                        let transport = reqwest::Client::new()
                            .get("http://127.0.0.1:0/")
                            .send()
                            .await
                            .unwrap_err();
                        Err(DirectoryError::Transport(transport))
                    }
                }
            }
        }
    }

    /// transfer(address,uint256)-shaped calldata with an arbitrary selector.
    fn two_word_calldata(selector: [u8; 4]) -> Vec<u8> {
        let mut data = selector.to_vec();
        let mut to = [0u8; 32];
        to[31] = 0xaa;
        let mut amount = [0u8; 32];
        amount[31] = 0x05;
        data.extend_from_slice(&to);
        data.extend_from_slice(&amount);
        data
    }

    /// The production execute() call: deposit() on WETH with 1 gwei attached.
    fn execute_deposit_calldata() -> Vec<u8> {
        hex::decode(concat!(
            "b61d27f6",
            "0000000000000000000000004200000000000000000000000000000000000006",
            "000000000000000000000000000000000000000000000000000000003b9aca00",
            "0000000000000000000000000000000000000000000000000000000000000060",
            "0000000000000000000000000000000000000000000000000000000000000004",
            "d0e30db000000000000000000000000000000000000000000000000000000000",
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn oldest_decodable_signature_wins() {
        // Returned newest-first; after the ascending-id sort the 3-argument
        // candidate is tried first and fails, so the 2-argument one wins.
        let decoder = CalldataDecoder::new(StubDirectory::with(vec![
            (200, "transfer(address,uint256)"),
            (100, "transferFrom(address,address,uint256)"),
        ]));
        let decoded = decoder.decode(&two_word_calldata([0xa9, 0x05, 0x9c, 0xbb])).await;
        assert_eq!(decoded.signature, "transfer(address,uint256)");
        assert_eq!(decoded.args.len(), 2);
        assert_eq!(decoded.args[0].type_name, "address");
        assert_eq!(decoded.args[1].value, "5");
        assert!(decoded.execute.is_none());
    }

    #[tokio::test]
    async fn unwraps_execute_envelope() {
        let decoder = CalldataDecoder::new(StubDirectory::with(vec![(42, "deposit()")]));
        let decoded = decoder.decode(&execute_deposit_calldata()).await;
        assert_eq!(decoded.signature, "deposit()");
        assert_eq!(decoded.function_name(), "deposit");
        assert!(decoded.args.is_empty());
        let execute = decoded.execute.expect("execute context");
        assert_eq!(execute.to, "0x4200000000000000000000000000000000000006");
        assert_eq!(execute.value, "1000000000");
    }

    #[tokio::test]
    async fn falls_back_to_raw_bytes_for_unknown_selectors() {
        let decoder = CalldataDecoder::new(StubDirectory::with(vec![]));
        let mut data = vec![0xde, 0xad, 0xbe, 0xef];
        data.extend_from_slice(&[0x01, 0x02, 0x03]);
        let decoded = decoder.decode(&data).await;
        assert_eq!(decoded.signature, "0xdeadbeef");
        assert_eq!(decoded.args.len(), 1);
        assert_eq!(decoded.args[0].type_name, "raw");
        assert_eq!(decoded.args[0].value, "0x010203");
    }

    #[tokio::test]
    async fn falls_back_when_the_directory_errors() {
        let decoder = CalldataDecoder::new(StubDirectory::failing());
        let decoded = decoder.decode(&two_word_calldata([0xa9, 0x05, 0x9c, 0xbb])).await;
        assert_eq!(decoded.signature, "0xa9059cbb");
        assert_eq!(decoded.args[0].type_name, "raw");
    }

    #[tokio::test]
    async fn keeps_execute_context_in_the_fallback() {
        // The inner selector is unknown, but to/value still render.
        let decoder = CalldataDecoder::new(StubDirectory::with(vec![]));
        let decoded = decoder.decode(&execute_deposit_calldata()).await;
        assert_eq!(decoded.signature, "0xd0e30db0");
        assert!(decoded.execute.is_some());
    }

    #[tokio::test]
    async fn short_input_degrades_gracefully() {
        let decoder = CalldataDecoder::new(StubDirectory::with(vec![]));
        let decoded = decoder.decode(&[0xab]).await;
        assert_eq!(decoded.signature, "0xab");
        assert_eq!(decoded.args[0].type_name, "raw");
    }
}
