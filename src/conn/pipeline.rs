//! Connection pipeline.
//!
//! Sequences the ordered steps for one accepted socket as an explicit
//! phase machine:
//!
//! ```text
//! Handshaking → ReadingHeaders → Writing → Closing → Closed
//! ```
//!
//! Each phase only starts after the previous one's suspending operations
//! have completed; phases never interleave for the same connection.
//! Whatever the outcome, finalization runs exactly once: the socket is
//! shut down and the pipeline (with its buffers and engine) is dropped.

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::conn::ConnectionError;
use crate::conn::pump::Pump;
use crate::http::headers::first_line;
use crate::http::response::Response;

enum Phase {
    Handshaking,
    ReadingHeaders,
    Writing(Vec<u8>),
    Closing,
    Closed,
}

/// One accepted connection: socket, transport pump, and phase machine.
/// Exclusively owned by its task; destroyed when the pipeline completes.
pub struct Connection<P: Pump> {
    stream: TcpStream,
    pump: P,
    server_id: String,
    tls_enabled: bool,
    phase: Phase,
}

impl<P: Pump> Connection<P> {
    pub fn new(stream: TcpStream, pump: P, server_id: String, tls_enabled: bool) -> Self {
        Self {
            stream,
            pump,
            server_id,
            tls_enabled,
            phase: Phase::Handshaking,
        }
    }

    /// Runs the pipeline to completion. The socket is closed exactly once
    /// regardless of which phase fails.
    pub async fn run(&mut self) -> Result<(), ConnectionError> {
        let outcome = self.drive().await;
        if !matches!(self.phase, Phase::Closed) {
            // A phase failed before the graceful close; drop the socket
            // without ceremony.
            let _ = self.stream.shutdown().await;
            self.phase = Phase::Closed;
        }
        outcome
    }

    async fn drive(&mut self) -> Result<(), ConnectionError> {
        loop {
            match &mut self.phase {
                Phase::Handshaking => {
                    self.pump.establish(&mut self.stream).await?;
                    self.phase = Phase::ReadingHeaders;
                }

                Phase::ReadingHeaders => {
                    let text = self.pump.read_headers(&mut self.stream).await?;
                    let line = first_line(&text);
                    tracing::debug!(server_id = %self.server_id, request = %line, "request received");
                    let response = Response::hello(&self.server_id, self.tls_enabled, line);
                    self.phase = Phase::Writing(response.to_bytes());
                }

                Phase::Writing(bytes) => {
                    let bytes = std::mem::take(bytes);
                    self.pump.write_all(&mut self.stream, &bytes).await?;
                    self.phase = Phase::Closing;
                }

                Phase::Closing => {
                    self.pump.close(&mut self.stream).await;
                    self.phase = Phase::Closed;
                }

                Phase::Closed => return Ok(()),
            }
        }
    }
}
