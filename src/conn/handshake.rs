//! Handshake driver.
//!
//! Loops over the engine's handshake status until it reports finished,
//! performing exactly the I/O each state asks for. Any fatal condition
//! aborts the connection; end of stream here means the peer gave up
//! mid-handshake.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::buffer::Buffer;
use crate::conn::{ConnectionError, read_into, write_fully};
use crate::tls::engine::{EngineStatus, HandshakeStatus, TlsEngine};

/// Drives the TLS handshake to completion over `stream`.
///
/// `net_in` may retain ciphertext beyond the handshake (e.g. application
/// data the client pipelined); the record pump picks it up afterwards.
pub async fn drive<S>(
    engine: &mut TlsEngine,
    stream: &mut S,
    net_in: &mut Buffer,
    net_out: &mut Buffer,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Unwrap destination during the handshake; no plaintext is expected
    // here, so anything that lands in it is discarded.
    let mut scratch = Buffer::with_capacity(engine.app_buffer_size());

    loop {
        match engine.handshake_status() {
            HandshakeStatus::Finished | HandshakeStatus::NotHandshaking => return Ok(()),

            HandshakeStatus::NeedTask => engine.run_delegated_tasks()?,

            HandshakeStatus::NeedWrap => {
                let mut empty = Buffer::with_capacity(0);
                engine.wrap(&mut empty, net_out)?;
                write_fully(stream, net_out).await?;
            }

            HandshakeStatus::NeedUnwrap => {
                if !net_in.has_unread() {
                    let n = read_into(stream, net_in, engine.packet_buffer_size()).await?;
                    if n == 0 {
                        return Err(ConnectionError::HandshakeEof);
                    }
                    continue;
                }

                let r = engine.unwrap(net_in, &mut scratch)?;
                match r.status {
                    EngineStatus::Ok => {
                        if r.handshake == HandshakeStatus::NeedTask {
                            engine.run_delegated_tasks()?;
                        }
                        scratch.clear();
                    }
                    EngineStatus::BufferUnderflow => {
                        net_in.ensure_spare(engine.packet_buffer_size());
                        let n = read_into(stream, net_in, engine.packet_buffer_size()).await?;
                        if n == 0 {
                            return Err(ConnectionError::HandshakeEof);
                        }
                    }
                    // The scratch destination is sized from the session
                    // parameters; overflowing it is an adapter defect.
                    EngineStatus::BufferOverflow => {
                        return Err(ConnectionError::UnexpectedOverflow("handshake unwrap"));
                    }
                    EngineStatus::Closed => return Err(ConnectionError::ClosedDuringHandshake),
                }
            }

            // Bytes already ingested satisfy another step; no I/O.
            HandshakeStatus::NeedUnwrapAgain => continue,
        }
    }
}
