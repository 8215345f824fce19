//! TLS engine adapter.
//!
//! Wraps a `rustls::ServerConnection` behind a wrap/unwrap interface with
//! explicit buffer-status outcomes, so the handshake driver and record pump
//! can treat encryption as a state machine over two growable buffers.
//!
//! rustls splits inbound work into two steps: `read_tls` copies ciphertext
//! into the session, and `process_new_packets` performs the CPU-bound
//! record processing (decryption, key exchange, certificate checks). The
//! adapter keeps that split visible: `unwrap` only ingests or drains, and
//! reports `NeedTask` until [`TlsEngine::run_delegated_tasks`] has run the
//! processing step. The drivers run all pending tasks before re-entering
//! their loops.

use std::io::{self, Read, Write};
use std::sync::Arc;

use rustls::{ServerConfig, ServerConnection};
use thiserror::Error;

use crate::buffer::Buffer;

/// Wire-record buffer sizing hint: one maximum TLS record (16 KiB
/// plaintext) plus header, AEAD tag, and padding allowance.
pub const PACKET_BUFFER_SIZE: usize = 18 * 1024;

/// Application buffer sizing hint: one maximum TLS plaintext fragment.
pub const APP_BUFFER_SIZE: usize = 16 * 1024;

/// Per-record framing and AEAD overhead allowance used when checking
/// whether a destination buffer can hold one wrapped chunk.
const WRAP_OVERHEAD: usize = 512;

/// Outcome class of one wrap/unwrap call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// The call made progress (possibly zero bytes; check the handshake hint).
    Ok,
    /// The source buffer holds no bytes to work with; read more from the peer.
    BufferUnderflow,
    /// The destination buffer lacks room; nothing was produced or consumed.
    BufferOverflow,
    /// The session is closed in the relevant direction. Terminal.
    Closed,
}

/// What the session needs next to make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    NotHandshaking,
    /// The handshake just completed; reported once.
    Finished,
    /// Ingested records await the synchronous processing step.
    NeedTask,
    /// The session has bytes to send; wrap and write them out.
    NeedWrap,
    /// The session needs more bytes from the peer.
    NeedUnwrap,
    /// Another unwrap will make progress without further I/O.
    NeedUnwrapAgain,
}

/// Result of one wrap or unwrap call.
///
/// `status` and the byte counts are always consistent: `BufferOverflow`
/// implies zero bytes produced and zero consumed.
#[derive(Debug, Clone, Copy)]
pub struct EngineResult {
    pub status: EngineStatus,
    pub handshake: HandshakeStatus,
    pub consumed: usize,
    pub produced: usize,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tls session error: {0}")]
    Session(#[from] rustls::Error),
    #[error("tls engine i/o: {0}")]
    Io(#[from] io::Error),
}

/// Per-connection TLS engine.
///
/// Exclusively owned by one connection pipeline; not safe for concurrent
/// mutation and never shared.
pub struct TlsEngine {
    session: ServerConnection,
    /// Ciphertext was ingested but `process_new_packets` has not run yet.
    unprocessed: bool,
    /// Decrypted plaintext buffered inside the session, per the last
    /// processing step.
    plaintext_ready: usize,
    /// Peer sent close_notify.
    peer_closed: bool,
    /// We queued close_notify via `close_outbound`.
    outbound_closed: bool,
    /// A handshake was observed in progress; used to report `Finished` once.
    finished_pending: bool,
}

impl TlsEngine {
    /// One engine instance per accepted connection, from the server's
    /// shared context. A fresh server session is already handshaking.
    pub fn new(config: Arc<ServerConfig>) -> Result<Self, EngineError> {
        let session = ServerConnection::new(config)?;
        Ok(Self {
            session,
            unprocessed: false,
            plaintext_ready: 0,
            peer_closed: false,
            outbound_closed: false,
            finished_pending: false,
        })
    }

    /// Recommended capacity for wire-facing buffers.
    pub fn packet_buffer_size(&self) -> usize {
        PACKET_BUFFER_SIZE
    }

    /// Recommended capacity for plaintext destination buffers.
    pub fn app_buffer_size(&self) -> usize {
        APP_BUFFER_SIZE
    }

    /// What the session needs next.
    ///
    /// Reports `Finished` exactly once when a handshake completes, then
    /// `NotHandshaking` (or `NeedUnwrapAgain` while decrypted bytes remain
    /// buffered in the session).
    pub fn handshake_status(&mut self) -> HandshakeStatus {
        if self.unprocessed {
            return HandshakeStatus::NeedTask;
        }
        if self.session.is_handshaking() {
            self.finished_pending = true;
            if self.session.wants_write() {
                return HandshakeStatus::NeedWrap;
            }
            return HandshakeStatus::NeedUnwrap;
        }
        if self.finished_pending {
            self.finished_pending = false;
            return HandshakeStatus::Finished;
        }
        if self.plaintext_ready > 0 {
            return HandshakeStatus::NeedUnwrapAgain;
        }
        HandshakeStatus::NotHandshaking
    }

    /// Decodes ciphertext from `src` toward plaintext in `dst`.
    ///
    /// One call performs a single step: drain decrypted plaintext if the
    /// session holds any, otherwise ingest ciphertext from `src`. Ingested
    /// records are not processed here; the result carries a `NeedTask`
    /// hint and the caller runs [`TlsEngine::run_delegated_tasks`].
    pub fn unwrap(&mut self, src: &mut Buffer, dst: &mut Buffer) -> Result<EngineResult, EngineError> {
        if self.unprocessed {
            return Ok(self.result(EngineStatus::Ok, 0, 0));
        }

        if self.plaintext_ready > 0 {
            if dst.spare() == 0 {
                return Ok(self.result(EngineStatus::BufferOverflow, 0, 0));
            }
            return match self.session.reader().read(dst.spare_mut()) {
                Ok(0) => {
                    // Clean end of stream: close_notify received and drained.
                    self.plaintext_ready = 0;
                    self.peer_closed = true;
                    Ok(self.result(EngineStatus::Closed, 0, 0))
                }
                Ok(n) => {
                    dst.advance_write(n);
                    self.plaintext_ready = self.plaintext_ready.saturating_sub(n);
                    Ok(self.result(EngineStatus::Ok, 0, n))
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    // Stale count; nothing buffered after all.
                    self.plaintext_ready = 0;
                    Ok(self.result(EngineStatus::Ok, 0, 0))
                }
                Err(e) => Err(EngineError::Io(e)),
            };
        }

        if self.peer_closed {
            return Ok(self.result(EngineStatus::Closed, 0, 0));
        }

        if !src.has_unread() {
            return Ok(self.result(EngineStatus::BufferUnderflow, 0, 0));
        }

        let consumed = {
            let mut cursor = src.unread();
            self.session.read_tls(&mut cursor)?
        };
        src.consume(consumed);
        if consumed == 0 {
            // Session-side buffer is full; processing must run first.
            self.unprocessed = true;
            return Ok(self.result(EngineStatus::Ok, 0, 0));
        }
        self.unprocessed = true;
        Ok(self.result(EngineStatus::Ok, consumed, 0))
    }

    /// Runs the pending synchronous processing step to completion.
    ///
    /// This is where decryption, key exchange computation, and certificate
    /// verification actually happen. Must run before the state machine is
    /// re-entered; kept synchronous because the session is not safe for
    /// concurrent mutation.
    pub fn run_delegated_tasks(&mut self) -> Result<(), EngineError> {
        if !self.unprocessed {
            return Ok(());
        }
        self.unprocessed = false;
        let state = self.session.process_new_packets()?;
        self.plaintext_ready = state.plaintext_bytes_to_read();
        if state.peer_has_closed() && self.plaintext_ready == 0 {
            self.peer_closed = true;
        }
        Ok(())
    }

    /// Encodes plaintext from `src` into ciphertext records in `dst`.
    ///
    /// At most one maximum-size plaintext chunk is consumed per call. If
    /// `dst` cannot hold that chunk plus record overhead, returns
    /// `BufferOverflow` without consuming anything, so the caller can grow
    /// `dst` and retry the same call. Pending session output (handshake
    /// flights, close_notify) is drained into `dst` regardless of `src`.
    pub fn wrap(&mut self, src: &mut Buffer, dst: &mut Buffer) -> Result<EngineResult, EngineError> {
        let mut consumed = 0;
        if !self.session.is_handshaking() && !self.outbound_closed && src.has_unread() {
            let chunk = src.unread_len().min(APP_BUFFER_SIZE);
            if dst.spare() < chunk + WRAP_OVERHEAD {
                return Ok(self.result(EngineStatus::BufferOverflow, 0, 0));
            }
            let n = self.session.writer().write(&src.unread()[..chunk])?;
            src.consume(n);
            consumed = n;
        }

        let mut produced = 0;
        while self.session.wants_write() && dst.spare() > 0 {
            let n = {
                let mut sink = SpareWriter { buf: dst };
                self.session.write_tls(&mut sink)?
            };
            if n == 0 {
                break;
            }
            produced += n;
        }

        let status = if self.outbound_closed {
            EngineStatus::Closed
        } else {
            EngineStatus::Ok
        };
        Ok(self.result(status, consumed, produced))
    }

    /// Signals outbound close: queues a close_notify record. The next
    /// `wrap` call reports `Closed` and produces the record bytes.
    pub fn close_outbound(&mut self) {
        if !self.outbound_closed {
            self.outbound_closed = true;
            self.session.send_close_notify();
        }
    }

    fn result(&mut self, status: EngineStatus, consumed: usize, produced: usize) -> EngineResult {
        EngineResult {
            status,
            handshake: self.handshake_status(),
            consumed,
            produced,
        }
    }
}

/// `io::Write` adapter that fills a buffer's spare region and accepts
/// partial writes, letting the session keep the remainder queued.
struct SpareWriter<'a> {
    buf: &'a mut Buffer,
}

impl Write for SpareWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let n = data.len().min(self.buf.spare());
        self.buf.spare_mut()[..n].copy_from_slice(&data[..n]);
        self.buf.advance_write(n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
