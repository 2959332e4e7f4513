//! ERC-4337 bundler RPC client.
//!
//! Submission and gas estimation go through bundler-specific JSON-RPC
//! methods (`eth_sendUserOperation`, `eth_estimateUserOperationGas`) that
//! take the operation plus the entry-point contract address. A bundler
//! rejection is an expected outcome, not a transport fault, and is kept
//! distinguishable so the caller can render it.

use alloy_primitives::{Address, B256, U256};
use alloy_rpc_client::{ClientBuilder, RpcClient};
use alloy_transport::{RpcError, TransportErrorKind};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::userop::{EstimateUserOperation, UserOperation};

/// Gas figures returned by `eth_estimateUserOperationGas`. Fields are
/// optional because bundlers disagree on which ones they report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    #[serde(default)]
    pub call_gas_limit: Option<U256>,
    #[serde(default)]
    pub verification_gas_limit: Option<U256>,
    #[serde(default)]
    pub pre_verification_gas: Option<U256>,
}

#[derive(Debug, thiserror::Error)]
pub enum BundlerError {
    /// The bundler answered with a JSON-RPC error object.
    #[error("bundler rejected the operation: {0}")]
    Rejected(String),
    /// The call never produced a JSON-RPC response.
    #[error("bundler rpc transport failed: {0}")]
    Transport(String),
}

impl From<RpcError<TransportErrorKind>> for BundlerError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        match error {
            RpcError::ErrorResp(payload) => BundlerError::Rejected(payload.message.to_string()),
            other => BundlerError::Transport(other.to_string()),
        }
    }
}

/// Submission and estimation interface of a bundler service.
pub trait Bundler {
    fn send_user_operation(
        &self,
        op: &UserOperation,
    ) -> impl Future<Output = Result<B256, BundlerError>> + Send;

    fn estimate_user_operation_gas(
        &self,
        op: &EstimateUserOperation,
    ) -> impl Future<Output = Result<GasEstimate, BundlerError>> + Send;
}

/// JSON-RPC client for one bundler endpoint and one entry point.
#[derive(Debug, Clone)]
pub struct BundlerClient {
    client: RpcClient,
    entry_point: Address,
}

impl BundlerClient {
    pub fn new(url: Url, entry_point: Address) -> Self {
        BundlerClient {
            client: ClientBuilder::default().http(url),
            entry_point,
        }
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }
}

impl Bundler for BundlerClient {
    /// Submits the operation for on-chain execution; returns the user
    /// operation hash the bundler tracks it by.
    #[instrument(skip_all, err, fields(sender = %op.sender, nonce = %op.nonce))]
    async fn send_user_operation(&self, op: &UserOperation) -> Result<B256, BundlerError> {
        let hash: B256 = self
            .client
            .request("eth_sendUserOperation", (op.clone(), self.entry_point))
            .await?;
        tracing::info!(user_op_hash = %hash, "user operation submitted");
        Ok(hash)
    }

    #[instrument(skip_all, err, fields(sender = %op.sender))]
    async fn estimate_user_operation_gas(
        &self,
        op: &EstimateUserOperation,
    ) -> Result<GasEstimate, BundlerError> {
        let estimate: GasEstimate = self
            .client
            .request("eth_estimateUserOperationGas", (op.clone(), self.entry_point))
            .await?;
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_estimates_with_hex_quantities() {
        let estimate: GasEstimate = serde_json::from_str(
            r#"{"callGasLimit":"0x5000","verificationGasLimit":"0x40c8a","preVerificationGas":"0x98ca"}"#,
        )
        .unwrap();
        assert_eq!(estimate.call_gas_limit, Some(U256::from(0x5000u64)));
        assert_eq!(estimate.pre_verification_gas, Some(U256::from(0x98cau64)));
    }

    #[test]
    fn tolerates_partial_estimates() {
        let estimate: GasEstimate = serde_json::from_str(r#"{"callGasLimit":"0x5000"}"#).unwrap();
        assert!(estimate.verification_gas_limit.is_none());
        assert!(estimate.pre_verification_gas.is_none());
    }
}
