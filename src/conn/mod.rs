//! Per-connection machinery.
//!
//! One accepted socket is handled end to end by a connection pipeline: an
//! ordered sequence of suspending steps (handshake for TLS, read the header
//! block, write the response, close) that never interleave for the same
//! connection. The only suspension points are the socket read and write
//! awaits; everything cryptographic runs synchronously between them.
//!
//! - **`handshake`**: drives the TLS engine's handshake state machine
//! - **`pump`**: steady-state encrypted/plain read and write strategies
//! - **`pipeline`**: sequences the steps and finalizes exactly once

pub mod handshake;
pub mod pipeline;
pub mod pump;

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::buffer::Buffer;
use crate::tls::engine::EngineError;

/// Errors that abort a single connection. Never escape the connection's
/// task; the accept loop and other connections are unaffected.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("peer closed during handshake")]
    HandshakeEof,
    #[error("engine closed during handshake")]
    ClosedDuringHandshake,
    #[error("peer closed before the request was complete")]
    PeerClosed,
    #[error("unexpected buffer overflow during {0}")]
    UnexpectedOverflow(&'static str),
    #[error("unexpected buffer underflow during {0}")]
    UnexpectedUnderflow(&'static str),
    #[error("header block exceeds {limit} bytes")]
    HeadersTooLarge { limit: usize },
}

/// One asynchronous socket read into the buffer's spare region, ensuring
/// at least `min_spare` bytes of room first. Returns the byte count; zero
/// means end of stream.
pub(crate) async fn read_into<S>(
    stream: &mut S,
    buf: &mut Buffer,
    min_spare: usize,
) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    buf.ensure_spare(min_spare);
    let n = stream.read(buf.spare_mut()).await?;
    buf.advance_write(n);
    Ok(n)
}

/// Writes all unread bytes to the socket, suspending as needed. May take
/// multiple partial writes. The buffer is fully drained on success.
pub(crate) async fn write_fully<S>(stream: &mut S, buf: &mut Buffer) -> Result<(), ConnectionError>
where
    S: AsyncWrite + Unpin,
{
    while buf.has_unread() {
        let n = stream.write(buf.unread()).await?;
        if n == 0 {
            return Err(ConnectionError::Transport(io::Error::new(
                io::ErrorKind::WriteZero,
                "socket closed while writing",
            )));
        }
        buf.consume(n);
    }
    Ok(())
}
