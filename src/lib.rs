//! Frame Wallet: a Farcaster-frame interface to an ERC-4337 smart wallet.
//!
//! A frame is an interactive card a Farcaster client renders from meta tags.
//! This crate serves the frames and the protocol machinery behind them:
//!
//! 1. **Prepare** — raw calldata typed into a frame becomes a partial user
//!    operation: gas is estimated with a shape-valid dummy signature, the
//!    seven-parameter tuple is ABI-encoded, raw-deflated, and hex-embedded
//!    in a sign URL ([`codec`]). The URL is the only storage.
//! 2. **Sign** — a user pressing a frame button produces a signed protocol
//!    message. A Farcaster hub acts as the verification oracle ([`hub`]),
//!    the signer's deterministic wallet is resolved from live chain state
//!    ([`wallet`]), and the pipeline keeps its three failure kinds apart
//!    ([`validator`]).
//! 3. **Submit** — the validated action is re-encoded into the ABI tuple the
//!    wallet contract verifies, assembled into an ERC-4337 user operation
//!    with conditional init code ([`userop`]), and sent to a bundler
//!    ([`bundler`]).
//!
//! [`calldata`] renders a best-effort human-readable preview of what a token
//! will execute, resolving selectors through a signature directory
//! ([`fourbyte`]) and never failing harder than a raw-bytes fallback.
//!
//! The HTTP surface lives in [`handlers`]; [`config`], [`telemetry`], and
//! [`shutdown`] carry the operational plumbing.

pub mod bundler;
pub mod calldata;
pub mod codec;
pub mod config;
pub mod fourbyte;
pub mod frames;
pub mod handlers;
pub mod hub;
pub mod shutdown;
pub mod telemetry;
pub mod userop;
pub mod validator;
pub mod wallet;
