//! Named server lifecycle.
//!
//! Servers are started and stopped by identifier through a [`registry`]
//! that holds one handle per running server. Each server runs an accept
//! loop ([`listener`]) that re-arms acceptance immediately and hands every
//! accepted socket to its own connection pipeline, so a slow connection
//! never delays subsequent accepts.

pub mod events;
pub mod listener;
pub mod registry;
