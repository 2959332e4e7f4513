//! HTTP endpoints of the frame wallet server.
//!
//! The two protocol-critical flows are `/v1/generate-tx` (prepare: turn raw
//! calldata into a compressed sign URL) and `/v1/{token}` (sign: validate
//! the frame action and submit the user operation). Everything else renders
//! prompt frames or redirects to the block explorer. Every failure path
//! terminates in a renderable response; nothing here panics.

use axum::Router;
use axum::body::Bytes as BodyBytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

use alloy_primitives::{Bytes, U256};
use alloy_provider::RootProvider;

use crate::bundler::{Bundler, BundlerClient};
use crate::calldata::{CalldataDecoder, DecodedCall};
use crate::codec::PartialUserOp;
use crate::config::{Config, ConfigError};
use crate::fourbyte::FourByteDirectory;
use crate::frames::FramePage;
use crate::hub::HttpHub;
use crate::userop::{
    EstimateUserOperation, UserOperation, build_init_code, encode_frame_signature,
    estimation_dummy,
};
use crate::validator::{
    FrameSignaturePacket, FrameValidationError, ValidatedFrameAction, validate_frame_action,
    wallet_salt,
};
use crate::wallet::{ChainClient, ResolveWallet};

/// Platform soft limit on frame URLs. Exceeding it is logged, not fatal,
/// since some clients tolerate longer URLs.
pub const MAX_FRAME_URL_LEN: usize = 256;

const README_URL: &str = "https://github.com/frame-wallet/frame-wallet-rs#readme";

/// Everything a request handler needs, built once at startup and injected
/// through axum state. Clients are constructed here rather than living in
/// module-level singletons so tests and multi-network setups can swap them.
pub struct AppState {
    pub config: Config,
    pub hub: HttpHub,
    pub chain: ChainClient<RootProvider>,
    pub decoder: CalldataDecoder<FourByteDirectory>,
    pub bundler: BundlerClient,
    pub estimator: BundlerClient,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let factory = config.factory()?;
        let provider = RootProvider::new_http(config.rpc_url().clone());
        let chain = ChainClient::new(provider, factory, config.entry_point());
        let hub = HttpHub::new(config.hub_url().clone());
        let decoder = CalldataDecoder::new(FourByteDirectory::new(config.directory_url().clone()));
        let bundler = BundlerClient::new(config.bundler_url().clone(), config.entry_point());
        let estimator = BundlerClient::new(config.estimator_url(), config.entry_point());
        Ok(AppState {
            config,
            hub,
            chain,
            decoder,
            bundler,
            estimator,
        })
    }
}

/// The buttons a sign frame presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignFrameButton {
    /// Button 1: submit the prepared transaction.
    SignTransaction,
    /// Button 2: open the wallet in the block explorer.
    ViewWallet,
}

#[derive(Debug, thiserror::Error)]
#[error("Unexpected frame button index: {0}")]
pub struct UnexpectedButton(pub u32);

impl TryFrom<u32> for SignFrameButton {
    type Error = UnexpectedButton;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        match index {
            1 => Ok(SignFrameButton::SignTransaction),
            2 => Ok(SignFrameButton::ViewWallet),
            other => Err(UnexpectedButton(other)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaltQuery {
    /// Wallet salt; lets one identity run several wallets.
    #[serde(default)]
    s: Option<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/v1/generate-tx", get(generate_tx).post(generate_tx))
        .route("/v1/wallet", get(view_wallet).post(view_wallet))
        .route("/v1/{token}", get(sign_frame).post(sign_frame))
        .route("/v1/{token}/h", get(preview_transaction))
        .route(
            "/view-transaction/{tx_hash}",
            get(view_transaction).post(view_transaction),
        )
        .route(
            "/view-transaction/{tx_hash}/redirect",
            get(redirect_to_transaction).post(redirect_to_transaction),
        )
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn salt_suffix(salt: U256) -> String {
    if salt.is_zero() {
        String::new()
    } else {
        format!("?s={salt}")
    }
}

/// 500 with the stage's own description; `missing` never lands here.
fn validation_failure(error: &FrameValidationError) -> Response {
    tracing::warn!(kind = error.kind(), %error, "frame validation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("{} error: {}", error.kind(), error)),
    )
        .into_response()
}

#[instrument(skip_all)]
async fn index() -> Response {
    found(README_URL.to_string())
}

/// `GET|POST /v1/{token}`: the sign flow.
///
/// Without a signed action this renders the prompt frame. With one, the hub
/// validates it, the wallet is resolved, and the button decides between
/// submission and the explorer redirect.
#[instrument(skip_all, fields(token = %token))]
async fn sign_frame(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Query(query): Query<SaltQuery>,
    body: BodyBytes,
) -> Response {
    let salt = wallet_salt(query.s.as_deref());
    let action = match validate_frame_action(&state.hub, &state.chain, salt, &body).await {
        Ok(action) => action,
        Err(FrameValidationError::Missing { .. }) => {
            return initial_sign_frame(&state, &token, salt).into_response();
        }
        Err(error) => return validation_failure(&error),
    };

    match SignFrameButton::try_from(action.button_index()) {
        Ok(SignFrameButton::SignTransaction) => {
            submit_signed_operation(&state, &token, salt, &action).await
        }
        Ok(SignFrameButton::ViewWallet) => found(format!(
            "{}/address/{}",
            state.config.explorer_url(),
            action.wallet.address
        )),
        Err(error) => {
            tracing::warn!(%error, "sign frame dispatch rejected");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(error.to_string())).into_response()
        }
    }
}

fn initial_sign_frame(state: &AppState, token: &str, salt: U256) -> Html<String> {
    let html = FramePage::new(
        "Frame Wallet Transaction",
        state.config.image_url(),
        format!(
            "{}/v1/{token}{}",
            state.config.base_url(),
            salt_suffix(salt)
        ),
    )
    .button("Sign Transaction")
    .redirect_button("View My Frame Wallet")
    .row("Compressed Partial UserOp", token)
    .html();
    Html(html)
}

/// Assembles the full user operation from the URL token and the validated
/// action, submits it, and renders the outcome as a frame either way.
async fn submit_signed_operation(
    state: &AppState,
    token: &str,
    salt: U256,
    action: &ValidatedFrameAction,
) -> Response {
    let compressed = match hex::decode(token.trim_start_matches("0x")) {
        Ok(compressed) => compressed,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Html(format!("transaction token is not valid hex: {error}")),
            )
                .into_response();
        }
    };
    let partial = match PartialUserOp::from_token(token) {
        Ok(partial) => partial,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Html(format!("transaction token could not be decoded: {error}")),
            )
                .into_response();
        }
    };

    let signature = match encode_frame_signature(&action.message, &compressed) {
        Ok(signature) => signature,
        Err(error) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("could not rebuild the frame signature: {error}")),
            )
                .into_response();
        }
    };
    let init_code = build_init_code(
        &action.wallet,
        action.fid(),
        action.message.signer.as_slice(),
        state.chain.factory(),
    );

    let op = UserOperation {
        sender: action.wallet.address,
        nonce: action.wallet.nonce,
        init_code,
        call_data: partial.call_data,
        call_gas_limit: partial.call_gas_limit,
        verification_gas_limit: partial.verification_gas_limit,
        pre_verification_gas: partial.pre_verification_gas,
        max_fee_per_gas: partial.max_fee_per_gas,
        max_priority_fee_per_gas: partial.max_priority_fee_per_gas,
        paymaster_and_data: Bytes::new(),
        signature,
    };

    match state.bundler.send_user_operation(&op).await {
        Ok(user_op_hash) => {
            let html = FramePage::new(
                "Frame Wallet Transaction Submitted",
                state.config.image_url(),
                format!("{}/v1/wallet{}", state.config.base_url(), salt_suffix(salt)),
            )
            .redirect_button("View My Frame Wallet")
            .heading("Transaction Submitted")
            .row("UserOperation", user_op_hash.to_string())
            .html();
            Html(html).into_response()
        }
        Err(error) => {
            tracing::warn!(%error, sender = %op.sender, "user operation submission failed");
            let html = FramePage::new(
                "Frame Wallet Transaction Error",
                state.config.error_image_url(),
                format!(
                    "{}/v1/{token}{}",
                    state.config.base_url(),
                    salt_suffix(salt)
                ),
            )
            .button("Try Again")
            .redirect_button("View My Frame Wallet")
            .heading("Transaction Error")
            .row("Error", error.to_string())
            .html();
            Html(html).into_response()
        }
    }
}

/// `GET|POST /v1/generate-tx`: the prepare flow.
///
/// Turns calldata typed into the frame's text input into a compressed sign
/// URL: estimate gas with the dummy identity, read fee data, encode and
/// compress the partial op, and redirect to `/v1/{token}`.
#[instrument(skip_all)]
async fn generate_tx(State(state): State<Arc<AppState>>, body: BodyBytes) -> Response {
    let packet: Option<FrameSignaturePacket> = serde_json::from_slice(&body).ok();
    let input_text = packet
        .and_then(|packet| packet.untrusted_data)
        .and_then(|untrusted| untrusted.input_text);
    let Some(input_text) = input_text else {
        let html = FramePage::new(
            "Generate Frame Wallet Transaction URL",
            state.config.image_url(),
            format!("{}/v1/generate-tx", state.config.base_url()),
        )
        .input_text("Call data for your transaction")
        .redirect_button("Generate Frame Wallet TX URL")
        .heading("Generate Frame Wallet Transaction URL")
        .html();
        return Html(html).into_response();
    };

    let call_data = match hex::decode(input_text.trim_start_matches("0x")) {
        Ok(call_data) => Bytes::from(call_data),
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Html(format!("call data is not valid hex: {error}")),
            )
                .into_response();
        }
    };

    // The dummy identity matches the baked-in dummy signature, so simulated
    // verification proceeds far enough for the estimator to price the call.
    let dummy_wallet = match state
        .chain
        .resolve(estimation_dummy::FID, &estimation_dummy::SIGNER_KEY, U256::ZERO)
        .await
    {
        Ok(wallet) => wallet,
        Err(error) => {
            tracing::error!(%error, "dummy wallet resolution failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("wallet error: {error}")),
            )
                .into_response();
        }
    };
    let estimate_op = EstimateUserOperation {
        sender: dummy_wallet.address,
        nonce: dummy_wallet.nonce,
        init_code: build_init_code(
            &dummy_wallet,
            estimation_dummy::FID,
            &estimation_dummy::SIGNER_KEY,
            state.chain.factory(),
        ),
        call_data: call_data.clone(),
        paymaster_and_data: Bytes::new(),
        signature: estimation_dummy::SIGNATURE,
    };
    let estimated_call_gas = match state.estimator.estimate_user_operation_gas(&estimate_op).await {
        Ok(estimate) => estimate.call_gas_limit,
        Err(error) => {
            tracing::warn!(%error, "gas estimation failed, using fallback limits");
            None
        }
    };

    let fees = match state.chain.fee_data().await {
        Ok(fees) => fees,
        Err(error) => {
            tracing::error!(%error, "fee data read failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("fee data error: {error}")),
            )
                .into_response();
        }
    };

    let policy = state.config.gas();
    let l1_fee = match policy.l1_fee_oracle {
        Some(oracle) => match state.chain.l1_data_fee(oracle, call_data.clone()).await {
            Ok(fee) => Some(fee),
            Err(error) => {
                tracing::warn!(%error, "L1 fee oracle read failed, using the flat component");
                None
            }
        },
        None => None,
    };

    let partial = PartialUserOp {
        chain_id: U256::from(state.config.chain_id()),
        call_data,
        call_gas_limit: policy.call_gas_limit(estimated_call_gas),
        verification_gas_limit: policy.verification_gas_limit(),
        pre_verification_gas: policy.pre_verification_gas(l1_fee, fees.max_fee_per_gas),
        max_fee_per_gas: fees.max_fee_per_gas,
        max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
    };
    let token = match partial.to_token() {
        Ok(token) => token,
        Err(error) => {
            tracing::error!(%error, "partial op encoding failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("encoding error: {error}")),
            )
                .into_response();
        }
    };

    let sign_url = format!("{}/v1/{token}", state.config.base_url());
    if sign_url.len() > MAX_FRAME_URL_LEN {
        tracing::warn!(
            len = sign_url.len(),
            "sign URL is longer than the {MAX_FRAME_URL_LEN}-character platform limit"
        );
    }
    found(sign_url)
}

/// `GET /v1/{token}/h`: HTML preview of the transaction inside a token.
#[instrument(skip_all, fields(token = %token))]
async fn preview_transaction(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Response {
    let partial = match PartialUserOp::from_token(&token) {
        Ok(partial) => partial,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Html(format!("transaction token could not be decoded: {error}")),
            )
                .into_response();
        }
    };
    let decoded = state.decoder.decode(&partial.call_data).await;
    Html(render_preview(&partial, &decoded)).into_response()
}

fn truncate_middle(value: &str) -> String {
    if value.len() > 12 {
        format!("{}...{}", &value[..6], &value[value.len() - 4..])
    } else {
        value.to_string()
    }
}

fn render_preview(partial: &PartialUserOp, decoded: &DecodedCall) -> String {
    let args_placeholder = if decoded.args.is_empty() { "" } else { "..." };
    let mut rows = String::new();
    for arg in &decoded.args {
        rows.push_str(&format!(
            "      <tr><td>{}</td><td>{}</td></tr>\n",
            arg.type_name,
            truncate_middle(&arg.value)
        ));
    }
    if let Some(execute) = &decoded.execute {
        let value_gwei = execute
            .value
            .parse::<U256>()
            .unwrap_or(U256::ZERO)
            / U256::from(1_000_000_000u64);
        rows.push_str(&format!(
            "      <tr><td>to</td><td>{}</td></tr>\n",
            truncate_middle(&execute.to)
        ));
        rows.push_str(&format!(
            "      <tr><td>value</td><td>{value_gwei} gwei</td></tr>\n"
        ));
    }
    let total_gas = partial
        .pre_verification_gas
        .saturating_add(partial.verification_gas_limit)
        .saturating_add(partial.call_gas_limit);
    let max_fee_gwei =
        total_gas.saturating_mul(partial.max_fee_per_gas) / U256::from(1_000_000_000u64);
    rows.push_str(&format!(
        "      <tr><td>gas</td><td>{max_fee_gwei} gwei</td></tr>\n"
    ));

    format!(
        "<html>\n  <head>\n    <title>Frame Wallet Transaction</title>\n  </head>\n  <body>\n    \
         <h1>Frame Wallet</h1>\n    <h2>{}({args_placeholder})</h2>\n    <table>\n{rows}    </table>\n    \
         <p>Frame Wallet is experimental software. Use at your own risk.</p>\n  </body>\n</html>\n",
        decoded.function_name()
    )
}

/// `GET|POST /v1/wallet`: explorer redirect for the caller's own wallet.
#[instrument(skip_all)]
async fn view_wallet(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SaltQuery>,
    body: BodyBytes,
) -> Response {
    let salt = wallet_salt(query.s.as_deref());
    match validate_frame_action(&state.hub, &state.chain, salt, &body).await {
        Ok(action) => found(format!(
            "{}/address/{}",
            state.config.explorer_url(),
            action.wallet.address
        )),
        Err(FrameValidationError::Missing { .. }) => {
            let html = FramePage::new(
                "View My Frame Wallet",
                state.config.image_url(),
                format!("{}/v1/wallet{}", state.config.base_url(), salt_suffix(salt)),
            )
            .redirect_button("View My Frame Wallet")
            .heading("View My Frame Wallet")
            .html();
            Html(html).into_response()
        }
        Err(error) => validation_failure(&error),
    }
}

/// Two-step explorer redirect so frame buttons can use `post_redirect`.
#[instrument(skip_all, fields(tx_hash = %tx_hash))]
async fn view_transaction(
    State(state): State<Arc<AppState>>,
    Path(tx_hash): Path<String>,
) -> Response {
    found(format!(
        "{}/view-transaction/{tx_hash}/redirect",
        state.config.base_url()
    ))
}

#[instrument(skip_all, fields(tx_hash = %tx_hash))]
async fn redirect_to_transaction(
    State(state): State<Arc<AppState>>,
    Path(tx_hash): Path<String>,
) -> Response {
    found(format!("{}/tx/{tx_hash}", state.config.explorer_url()))
}
