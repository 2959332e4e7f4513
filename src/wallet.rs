//! Smart wallet resolution against live chain state.
//!
//! A Frame Wallet address is a pure function of `(fid, signer key, salt)`,
//! computed by the wallet factory's `getAddress` view. Nonce and deployed
//! code are point-in-time reads and go stale the moment they are fetched, so
//! nothing here is cached: a stale nonce is a double-spend and stale code is
//! a wrong init-code decision.

use alloy_contract::Error as ContractError;
use alloy_primitives::aliases::U192;
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::Provider;
use alloy_provider::utils::Eip1559Estimation;
use alloy_sol_types::sol;
use alloy_transport::TransportError;
use std::future::IntoFuture;
use tracing::instrument;

sol! {
    #[sol(rpc)]
    interface IFrameWalletFactory {
        /// Deterministic counterfactual wallet address for an identity.
        function getAddress(uint256 fid, bytes signerKey, uint256 salt) external view returns (address wallet);
        /// Deploys the wallet; used inside ERC-4337 initCode.
        function createAccount(uint256 fid, bytes signerKey, uint256 salt) external returns (address wallet);
    }

    #[sol(rpc)]
    interface IEntryPoint {
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }

    #[sol(rpc)]
    interface IGasPriceOracle {
        /// L1 data-publication fee for the given payload, in wei.
        function getL1Fee(bytes data) external view returns (uint256 fee);
    }
}

/// Snapshot of a wallet's on-chain state for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletInfo {
    pub address: Address,
    /// Replay-protection counter read from the entry point.
    pub nonce: U256,
    /// Deployed bytecode; empty until the factory has run.
    pub code: Bytes,
    pub salt: U256,
}

impl WalletInfo {
    pub fn is_deployed(&self) -> bool {
        !self.code.is_empty()
    }
}

/// Current fee-market bids read from the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeData {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl From<Eip1559Estimation> for FeeData {
    fn from(estimation: Eip1559Estimation) -> Self {
        FeeData {
            max_fee_per_gas: U256::from(estimation.max_fee_per_gas),
            max_priority_fee_per_gas: U256::from(estimation.max_priority_fee_per_gas),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WalletResolveError {
    #[error("wallet factory getAddress call failed: {0}")]
    Factory(#[source] ContractError),
    #[error("entry point getNonce call failed: {0}")]
    Nonce(#[source] ContractError),
    #[error("wallet code lookup failed: {0}")]
    Code(#[source] TransportError),
}

/// Resolves wallet state for a social identity.
pub trait ResolveWallet {
    fn resolve(
        &self,
        fid: u64,
        signer_key: &[u8],
        salt: U256,
    ) -> impl Future<Output = Result<WalletInfo, WalletResolveError>> + Send;
}

/// Chain-read client owning the provider plus the factory and entry-point
/// deployments. Constructed once by the composition root and injected where
/// needed; there is deliberately no process-wide provider singleton.
#[derive(Debug, Clone)]
pub struct ChainClient<P> {
    provider: P,
    factory: Address,
    entry_point: Address,
}

impl<P> ChainClient<P> {
    pub fn new(provider: P, factory: Address, entry_point: Address) -> Self {
        ChainClient {
            provider,
            factory,
            entry_point,
        }
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }
}

impl<P> ChainClient<P>
where
    P: Provider + Clone,
{
    /// Current EIP-1559 fee estimates.
    #[instrument(skip_all, err)]
    pub async fn fee_data(&self) -> Result<FeeData, TransportError> {
        let estimation = self.provider.estimate_eip1559_fees().await?;
        Ok(estimation.into())
    }

    /// L1 data fee for `payload` according to an OP-stack gas price oracle.
    #[instrument(skip_all, err)]
    pub async fn l1_data_fee(
        &self,
        oracle: Address,
        payload: Bytes,
    ) -> Result<U256, ContractError> {
        let oracle = IGasPriceOracle::new(oracle, self.provider.clone());
        oracle.getL1Fee(payload).call().await
    }
}

impl<P> ResolveWallet for ChainClient<P>
where
    P: Provider + Clone + Send + Sync,
{
    #[instrument(skip_all, err, fields(fid = fid, salt = %salt))]
    async fn resolve(
        &self,
        fid: u64,
        signer_key: &[u8],
        salt: U256,
    ) -> Result<WalletInfo, WalletResolveError> {
        let signer_key = Bytes::copy_from_slice(signer_key);
        let factory = IFrameWalletFactory::new(self.factory, self.provider.clone());
        let address = factory
            .getAddress(U256::from(fid), signer_key, salt)
            .call()
            .await
            .map_err(WalletResolveError::Factory)?;

        // Independent reads; issued together without changing semantics.
        let entry_point = IEntryPoint::new(self.entry_point, self.provider.clone());
        let nonce_call = entry_point.getNonce(address, U192::ZERO);
        let (code, nonce) = tokio::join!(
            self.provider.get_code_at(address).into_future(),
            nonce_call.call(),
        );
        let code = code.map_err(WalletResolveError::Code)?;
        let nonce = nonce.map_err(WalletResolveError::Nonce)?;

        Ok(WalletInfo {
            address,
            nonce,
            code,
            salt,
        })
    }
}
