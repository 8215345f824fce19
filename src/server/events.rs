//! Lifecycle outcomes.
//!
//! Produced by the registry when servers start, stop, or fail to start.
//! Delivery is optional; the registry is fully usable without a consumer.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerOutcome {
    Started {
        id: String,
        host: String,
        /// Actual bound port (meaningful when the spec asked for port 0).
        port: u16,
        tls_enabled: bool,
    },
    Stopped {
        id: String,
    },
    Failed {
        id: String,
        error: String,
    },
}
