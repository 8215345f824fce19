//! Accept loop.
//!
//! Accepts continuously and re-arms immediately: the newly accepted socket
//! is dispatched to its own spawned pipeline task before the loop touches
//! it further. Accept failures while the server is up are logged and the
//! loop continues; the shutdown signal ends the loop and drops (closes)
//! the listening socket.

use std::sync::Arc;

use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::conn::pipeline::Connection;
use crate::conn::pump::{PlainPump, TlsPump};
use crate::tls::engine::TlsEngine;

pub(crate) async fn accept_loop(
    listener: TcpListener,
    tls_context: Option<Arc<ServerConfig>>,
    server_id: String,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(id = %server_id, "accept loop shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    debug!(id = %server_id, %peer, "connection accepted");
                    spawn_connection(socket, peer, &tls_context, &server_id);
                }
                Err(e) => {
                    error!(id = %server_id, error = %e, "accept failed");
                }
            }
        }
    }
}

fn spawn_connection(
    socket: TcpStream,
    peer: std::net::SocketAddr,
    tls_context: &Option<Arc<ServerConfig>>,
    server_id: &str,
) {
    if let Err(e) = socket.set_nodelay(true) {
        warn!(%peer, error = %e, "failed to set TCP_NODELAY");
    }

    match tls_context {
        Some(context) => {
            let engine = match TlsEngine::new(context.clone()) {
                Ok(engine) => engine,
                Err(e) => {
                    error!(%peer, error = %e, "failed to create TLS engine");
                    return;
                }
            };
            let mut conn = Connection::new(
                socket,
                TlsPump::new(engine),
                server_id.to_string(),
                true,
            );
            tokio::spawn(async move {
                if let Err(e) = conn.run().await {
                    error!(%peer, error = %e, "tls connection error");
                }
            });
        }
        None => {
            let mut conn = Connection::new(
                socket,
                PlainPump::new(),
                server_id.to_string(),
                false,
            );
            tokio::spawn(async move {
                if let Err(e) = conn.run().await {
                    error!(%peer, error = %e, "connection error");
                }
            });
        }
    }
}
