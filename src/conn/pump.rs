//! Record pumps: steady-state read and write strategies.
//!
//! The pipeline is pump-agnostic. [`TlsPump`] unwraps ciphertext through
//! the engine; [`PlainPump`] moves bytes straight off the socket. Both
//! implement the same contract: read until the header-block terminator,
//! write an application buffer fully, close gracefully.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::buffer::Buffer;
use crate::conn::{ConnectionError, read_into, write_fully};
use crate::http::headers::{MAX_HEADER_BLOCK_BYTES, find_header_end};
use crate::tls::engine::{EngineStatus, HandshakeStatus, TlsEngine};

/// One connection's transport strategy.
#[allow(async_fn_in_trait)]
pub trait Pump {
    /// Prepares the transport (TLS handshake; no-op for plain text).
    async fn establish<S>(&mut self, stream: &mut S) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin;

    /// Reads decoded text until it contains the header terminator.
    async fn read_headers<S>(&mut self, stream: &mut S) -> Result<String, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin;

    /// Writes the whole application buffer to the peer.
    async fn write_all<S>(&mut self, stream: &mut S, data: &[u8]) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin;

    /// Graceful close of the transport. Best effort; never fails the
    /// connection at this point.
    async fn close<S>(&mut self, stream: &mut S)
    where
        S: AsyncRead + AsyncWrite + Unpin;
}

/// Encrypted pump: drives the TLS engine over the network buffers.
pub struct TlsPump {
    engine: TlsEngine,
    net_in: Buffer,
    net_out: Buffer,
}

impl TlsPump {
    pub fn new(engine: TlsEngine) -> Self {
        let packet = engine.packet_buffer_size();
        Self {
            engine,
            net_in: Buffer::with_capacity(packet),
            net_out: Buffer::with_capacity(packet),
        }
    }
}

impl Pump for TlsPump {
    async fn establish<S>(&mut self, stream: &mut S) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        crate::conn::handshake::drive(&mut self.engine, stream, &mut self.net_in, &mut self.net_out)
            .await
    }

    async fn read_headers<S>(&mut self, stream: &mut S) -> Result<String, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut text = BytesMut::with_capacity(1024);
        let mut app = Buffer::with_capacity(self.engine.app_buffer_size());

        loop {
            if app.has_unread() {
                text.extend_from_slice(app.unread());
                app.clear();
                if text.len() > MAX_HEADER_BLOCK_BYTES {
                    return Err(ConnectionError::HeadersTooLarge {
                        limit: MAX_HEADER_BLOCK_BYTES,
                    });
                }
                if find_header_end(&text).is_some() {
                    return Ok(String::from_utf8_lossy(&text).into_owned());
                }
            }

            let r = self.engine.unwrap(&mut self.net_in, &mut app)?;
            match r.status {
                EngineStatus::Ok if r.produced > 0 => continue,
                EngineStatus::Ok => {
                    if r.handshake == HandshakeStatus::NeedTask {
                        self.engine.run_delegated_tasks()?;
                        continue;
                    }
                    if self.net_in.has_unread() {
                        continue;
                    }
                    let n = read_into(stream, &mut self.net_in, self.engine.packet_buffer_size())
                        .await?;
                    if n == 0 {
                        return Err(ConnectionError::PeerClosed);
                    }
                }
                EngineStatus::BufferUnderflow => {
                    self.net_in.ensure_spare(self.engine.packet_buffer_size());
                    let n = read_into(stream, &mut self.net_in, self.engine.packet_buffer_size())
                        .await?;
                    if n == 0 {
                        return Err(ConnectionError::PeerClosed);
                    }
                }
                // The plaintext destination is sized from session
                // parameters; overflow is an adapter defect, not a
                // grow-and-retry case.
                EngineStatus::BufferOverflow => {
                    return Err(ConnectionError::UnexpectedOverflow("record unwrap"));
                }
                EngineStatus::Closed => return Err(ConnectionError::PeerClosed),
            }
        }
    }

    async fn write_all<S>(&mut self, stream: &mut S, data: &[u8]) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut src = Buffer::from_slice(data);
        while src.has_unread() {
            let r = self.engine.wrap(&mut src, &mut self.net_out)?;
            match r.status {
                EngineStatus::Ok => {
                    if r.handshake == HandshakeStatus::NeedTask {
                        self.engine.run_delegated_tasks()?;
                    }
                    write_fully(stream, &mut self.net_out).await?;
                }
                // Nothing was consumed; grow the wire buffer and retry
                // the same wrap.
                EngineStatus::BufferOverflow => {
                    self.net_out.grow(self.engine.packet_buffer_size());
                }
                EngineStatus::BufferUnderflow => {
                    return Err(ConnectionError::UnexpectedUnderflow("record wrap"));
                }
                // Peer has shut down; stop without error.
                EngineStatus::Closed => return Ok(()),
            }
        }
        Ok(())
    }

    async fn close<S>(&mut self, stream: &mut S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.engine.close_outbound();
        let mut empty = Buffer::with_capacity(0);
        if let Ok(r) = self.engine.wrap(&mut empty, &mut self.net_out) {
            if r.status == EngineStatus::Closed && r.produced > 0 {
                let _ = write_fully(stream, &mut self.net_out).await;
            }
        }
        let _ = stream.shutdown().await;
    }
}

/// Plain-text pump: the same contract without encryption.
pub struct PlainPump {
    buf: Buffer,
}

impl PlainPump {
    pub fn new() -> Self {
        Self {
            buf: Buffer::with_capacity(8192),
        }
    }
}

impl Default for PlainPump {
    fn default() -> Self {
        Self::new()
    }
}

impl Pump for PlainPump {
    async fn establish<S>(&mut self, _stream: &mut S) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        Ok(())
    }

    async fn read_headers<S>(&mut self, stream: &mut S) -> Result<String, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut text = BytesMut::with_capacity(1024);
        loop {
            let n = read_into(stream, &mut self.buf, 1024).await?;
            if n == 0 {
                return Err(ConnectionError::PeerClosed);
            }
            text.extend_from_slice(self.buf.unread());
            self.buf.clear();

            if text.len() > MAX_HEADER_BLOCK_BYTES {
                return Err(ConnectionError::HeadersTooLarge {
                    limit: MAX_HEADER_BLOCK_BYTES,
                });
            }
            if find_header_end(&text).is_some() {
                return Ok(String::from_utf8_lossy(&text).into_owned());
            }
        }
    }

    async fn write_all<S>(&mut self, stream: &mut S, data: &[u8]) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut src = Buffer::from_slice(data);
        write_fully(stream, &mut src).await
    }

    async fn close<S>(&mut self, stream: &mut S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let _ = stream.shutdown().await;
    }
}
