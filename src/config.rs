//! Configuration for the frame wallet server.
//!
//! Values come from an optional JSON config file (`--config` / `CONFIG`),
//! with serde defaults falling back to environment variables and then to
//! hardcoded defaults. The wallet factory address has no sensible default
//! and must be provided one way or the other.

use alloy_primitives::Address;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use url::Url;

use crate::userop::GasPolicy;

/// CLI arguments for the frame wallet server.
#[derive(Parser, Debug)]
#[command(name = "frame-wallet")]
#[command(about = "Frame Wallet HTTP server")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG")]
    config: Option<PathBuf>,
}

/// Server configuration.
///
/// Fields use serde defaults that fall back to environment variables,
/// then to hardcoded defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "config_defaults::port")]
    port: u16,
    #[serde(default = "config_defaults::host")]
    host: IpAddr,
    /// Public origin frames embed in their post and image URLs.
    #[serde(default = "config_defaults::base_url")]
    base_url: String,
    #[serde(default = "config_defaults::hub_url")]
    hub_url: Url,
    #[serde(default = "config_defaults::rpc_url")]
    rpc_url: Url,
    #[serde(default = "config_defaults::bundler_url")]
    bundler_url: Url,
    /// Separate estimator endpoint; falls back to the bundler.
    #[serde(default = "config_defaults::estimator_url")]
    estimator_url: Option<Url>,
    #[serde(default = "config_defaults::directory_url")]
    directory_url: Url,
    #[serde(default = "config_defaults::chain_id")]
    chain_id: u64,
    #[serde(default = "config_defaults::entry_point")]
    entry_point: Address,
    #[serde(default = "config_defaults::factory")]
    factory: Option<Address>,
    #[serde(default = "config_defaults::explorer_url")]
    explorer_url: String,
    #[serde(default = "config_defaults::image_path")]
    image_path: String,
    #[serde(default = "config_defaults::error_image_path")]
    error_image_path: String,
    #[serde(default)]
    gas: GasPolicy,
}

pub mod config_defaults {
    use alloy_primitives::{Address, address};
    use std::env;
    use std::net::IpAddr;
    use url::Url;

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_HOST: &str = "0.0.0.0";
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
    pub const DEFAULT_HUB_URL: &str = "https://nemes.farcaster.xyz:2281";
    pub const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";
    pub const DEFAULT_BUNDLER_URL: &str = "https://api.pimlico.io/v1/base/rpc";
    pub const DEFAULT_DIRECTORY_URL: &str = "https://www.4byte.directory";
    pub const DEFAULT_EXPLORER_URL: &str = "https://basescan.org";
    pub const DEFAULT_CHAIN_ID: u64 = 8453;
    /// Canonical ERC-4337 v0.6 entry point.
    pub const DEFAULT_ENTRY_POINT: Address =
        address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

    fn env_url(var: &str, default: &str) -> Url {
        env::var(var)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| default.parse().unwrap())
    }

    pub fn port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(IpAddr::V4(DEFAULT_HOST.parse().unwrap()))
    }

    pub fn base_url() -> String {
        env::var("BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
    }

    pub fn hub_url() -> Url {
        env_url("HUB_URL", DEFAULT_HUB_URL)
    }

    pub fn rpc_url() -> Url {
        env_url("RPC_URL", DEFAULT_RPC_URL)
    }

    pub fn bundler_url() -> Url {
        env_url("BUNDLER_RPC_URL", DEFAULT_BUNDLER_URL)
    }

    pub fn estimator_url() -> Option<Url> {
        env::var("GAS_ESTIMATOR_RPC_URL")
            .ok()
            .and_then(|s| s.parse().ok())
    }

    pub fn directory_url() -> Url {
        env_url("SIGNATURE_DIRECTORY_URL", DEFAULT_DIRECTORY_URL)
    }

    pub fn chain_id() -> u64 {
        env::var("CHAIN_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHAIN_ID)
    }

    pub fn entry_point() -> Address {
        env::var("ENTRY_POINT_ADDRESS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ENTRY_POINT)
    }

    pub fn factory() -> Option<Address> {
        env::var("FRAME_WALLET_FACTORY")
            .ok()
            .and_then(|s| s.parse().ok())
    }

    pub fn explorer_url() -> String {
        env::var("EXPLORER_URL").unwrap_or_else(|_| DEFAULT_EXPLORER_URL.to_string())
    }

    pub fn image_path() -> String {
        "/images/robot-check.png".to_string()
    }

    pub fn error_image_path() -> String {
        "/images/robot-error.png".to_string()
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error(
        "No wallet factory address configured (set FRAME_WALLET_FACTORY or the factory config key)"
    )]
    MissingFactory,
}

impl Config {
    /// Load configuration from CLI arguments and the optional JSON file.
    ///
    /// Resolution order: `--config <path>` / `CONFIG` env, then
    /// `./config.json` if present, then pure env/hardcoded defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        match cli_args.config {
            Some(path) => Self::load_from_path(path),
            None => {
                let default_path = Path::new("config.json");
                if default_path.exists() {
                    Self::load_from_path(default_path.to_path_buf())
                } else {
                    Ok(serde_json::from_str("{}")?)
                }
            }
        }
    }

    fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path.clone(), e))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Public origin without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn hub_url(&self) -> &Url {
        &self.hub_url
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    pub fn bundler_url(&self) -> &Url {
        &self.bundler_url
    }

    pub fn estimator_url(&self) -> Url {
        self.estimator_url
            .clone()
            .unwrap_or_else(|| self.bundler_url.clone())
    }

    pub fn directory_url(&self) -> &Url {
        &self.directory_url
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    pub fn factory(&self) -> Result<Address, ConfigError> {
        self.factory.ok_or(ConfigError::MissingFactory)
    }

    pub fn explorer_url(&self) -> &str {
        self.explorer_url.trim_end_matches('/')
    }

    /// Absolute URL of the frame preview image.
    pub fn image_url(&self) -> String {
        format!("{}{}", self.base_url(), self.image_path)
    }

    /// Absolute URL of the error frame image.
    pub fn error_image_url(&self) -> String {
        format!("{}{}", self.base_url(), self.error_image_path)
    }

    pub fn gas(&self) -> &GasPolicy {
        &self.gas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const FULL_CONFIG: &str = r#"{
        "port": 3000,
        "host": "127.0.0.1",
        "baseUrl": "https://fw.example.com/",
        "hubUrl": "https://hub.example.com:2281",
        "rpcUrl": "https://rpc.example.com",
        "bundlerUrl": "https://bundler.example.com/rpc",
        "estimatorUrl": "https://estimator.example.com/rpc",
        "directoryUrl": "https://www.4byte.directory",
        "chainId": 8453,
        "entryPoint": "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789",
        "factory": "0x0746a969b9b81CFa52086d6FeF709D3489572204",
        "explorerUrl": "https://basescan.org",
        "gas": {
            "minCallGasLimit": 120000,
            "verificationGasLimit": 4000000
        }
    }"#;

    #[test]
    fn parses_a_full_config_file() {
        let config: Config = serde_json::from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.port(), 3000);
        assert_eq!(config.base_url(), "https://fw.example.com");
        assert_eq!(
            config.factory().unwrap(),
            address!("0746a969b9b81CFa52086d6FeF709D3489572204")
        );
        assert_eq!(
            config.image_url(),
            "https://fw.example.com/images/robot-check.png"
        );
        assert_eq!(
            config.estimator_url().as_str(),
            "https://estimator.example.com/rpc"
        );
        assert_eq!(config.gas().min_call_gas_limit, 120_000);
        assert_eq!(config.gas().verification_gas_limit, 4_000_000);
        // Unset policy knobs keep their defaults.
        assert_eq!(config.gas().base_pre_verification_gas, 40_000);
    }

    #[test]
    fn estimator_falls_back_to_the_bundler() {
        let config: Config = serde_json::from_str(
            r#"{"bundlerUrl": "https://bundler.example.com/rpc", "factory": "0x0746a969b9b81CFa52086d6FeF709D3489572204"}"#,
        )
        .unwrap();
        if config.estimator_url.is_none() {
            assert_eq!(
                config.estimator_url().as_str(),
                "https://bundler.example.com/rpc"
            );
        }
    }

    #[test]
    fn missing_factory_is_an_error() {
        let config: Config = serde_json::from_str(r#"{"factory": null}"#).unwrap();
        if config.factory.is_none() {
            assert!(matches!(config.factory(), Err(ConfigError::MissingFactory)));
        }
    }
}
