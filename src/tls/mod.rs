//! TLS layer.
//!
//! This crate terminates TLS without a "secure socket" wrapper: the
//! session state machine is driven directly. The layer splits into:
//!
//! - **`context`**: loads a certificate/key bundle into a reusable
//!   `rustls::ServerConfig`, built once per server start
//! - **`engine`**: the per-connection engine adapter exposing
//!   wrap/unwrap with explicit buffer-status outcomes, which the
//!   handshake driver and record pump consume

pub mod context;
pub mod engine;
