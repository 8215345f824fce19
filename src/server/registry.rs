//! Server registry: idempotent start/stop keyed by server identifier.
//!
//! The registry map is the only shared mutable state crossing connection
//! boundaries; everything per-connection is exclusively owned by its task.
//! Insert-if-absent and remove are atomic on the map, so concurrent starts
//! of the same id register exactly one server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::config::ServerSpec;
use crate::server::events::ServerOutcome;
use crate::server::listener;
use crate::tls::context::load_context;

/// Outcome of a start call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The server is newly running on this address.
    Started(SocketAddr),
    /// A server with this id already exists; nothing changed.
    AlreadyRunning,
}

/// Handle to one running server. Removing it from the registry and firing
/// the shutdown signal is the only way to cancel its accept loop.
pub struct ServerHandle {
    pub local_addr: SocketAddr,
    pub tls_enabled: bool,
    shutdown: oneshot::Sender<()>,
}

/// Registry of running servers. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Registry {
    servers: Arc<DashMap<String, ServerHandle>>,
    events: Option<mpsc::UnboundedSender<ServerOutcome>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            servers: Arc::new(DashMap::new()),
            events: None,
        }
    }

    /// A registry that also delivers lifecycle outcomes on a channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Self {
            servers: Arc::new(DashMap::new()),
            events: Some(tx),
        };
        (registry, rx)
    }

    /// Starts a named server.
    ///
    /// A duplicate id is a logged no-op, not an error. Bind or context
    /// failures fail the call and emit a `Failed` outcome without leaving
    /// a partial registration behind.
    pub async fn start(&self, spec: ServerSpec) -> Result<StartOutcome> {
        match self.start_inner(&spec).await {
            Ok(Some(addr)) => {
                self.emit(ServerOutcome::Started {
                    id: spec.id.clone(),
                    host: spec.host.clone(),
                    port: addr.port(),
                    tls_enabled: spec.tls_enabled(),
                });
                info!(
                    id = %spec.id,
                    scheme = if spec.tls_enabled() { "https" } else { "http" },
                    addr = %addr,
                    "server started"
                );
                Ok(StartOutcome::Started(addr))
            }
            Ok(None) => Ok(StartOutcome::AlreadyRunning),
            Err(e) => {
                self.emit(ServerOutcome::Failed {
                    id: spec.id.clone(),
                    error: format!("{e:#}"),
                });
                error!(id = %spec.id, error = %format!("{e:#}"), "server failed to start");
                Err(e)
            }
        }
    }

    async fn start_inner(&self, spec: &ServerSpec) -> Result<Option<SocketAddr>> {
        if self.servers.contains_key(&spec.id) {
            warn!(id = %spec.id, "server already running");
            return Ok(None);
        }

        let tls_context = match &spec.tls {
            Some(tls) => Some(
                load_context(tls)
                    .with_context(|| format!("failed to build TLS context for {}", spec.id))?,
            ),
            None => None,
        };

        let listener = TcpListener::bind((spec.host.as_str(), spec.port))
            .await
            .with_context(|| format!("failed to bind {}:{}", spec.host, spec.port))?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        match self.servers.entry(spec.id.clone()) {
            Entry::Occupied(_) => {
                // Lost the race to a concurrent start; drop the listener.
                warn!(id = %spec.id, "server already running");
                Ok(None)
            }
            Entry::Vacant(slot) => {
                slot.insert(ServerHandle {
                    local_addr: addr,
                    tls_enabled: spec.tls_enabled(),
                    shutdown: shutdown_tx,
                });
                tokio::spawn(listener::accept_loop(
                    listener,
                    tls_context,
                    spec.id.clone(),
                    shutdown_rx,
                ));
                Ok(Some(addr))
            }
        }
    }

    /// Stops a named server: removes its handle and closes the listener,
    /// which terminates the accept loop. Unknown ids are a logged no-op.
    pub fn stop(&self, id: &str) -> bool {
        match self.servers.remove(id) {
            None => {
                warn!(id, "no server registered to stop");
                false
            }
            Some((_, handle)) => {
                // The loop may already be gone; nothing to do then.
                let _ = handle.shutdown.send(());
                self.emit(ServerOutcome::Stopped { id: id.to_string() });
                info!(id, "server stopped");
                true
            }
        }
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.servers.contains_key(id)
    }

    pub fn stop_all(&self) {
        let ids: Vec<String> = self.servers.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.stop(&id);
        }
    }

    fn emit(&self, outcome: ServerOutcome) {
        if let Some(events) = &self.events {
            let _ = events.send(outcome);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
