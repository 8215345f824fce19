//! Terminus - Asynchronous TLS-Terminating Connection Engine
//!
//! Core library: buffers, TLS engine adapter, connection pipeline, and
//! named-server lifecycle.

pub mod buffer;
pub mod config;
pub mod conn;
pub mod http;
pub mod server;
pub mod tls;
