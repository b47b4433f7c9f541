//! Per-connection transport session.
//!
//! Wraps one accepted connection into the first duplex stream of a pipeline:
//! readable readiness drains the socket into a reassembly buffer and decoded
//! frames are delivered to the configured sink; outbound frames are
//! length-prefixed into a pending buffer and flushed on writable readiness.
//!
//! A decode failure is connection-fatal: there is no valid recovery frame to
//! send on a transport whose framing is broken.

use std::io::{Read, Write};

use bytes::BytesMut;
use mio::net::TcpStream;
use mio::Token;

use crate::binding::SinkHandle;
use crate::error::{GatewireError, Result};
use crate::protocol::{Frame, FrameBuffer, LENGTH_PREFIX_SIZE};

/// Read chunk size per readable event.
const READ_CHUNK: usize = 64 * 1024;

/// One connection carrying length-prefixed frames.
pub struct TransportSession {
    stream: TcpStream,
    token: Token,
    frames_in: FrameBuffer,
    pending_out: BytesMut,
    sink: SinkHandle,
}

impl TransportSession {
    /// Wrap an accepted connection; decoded inbound frames go to `sink`.
    pub fn new(stream: TcpStream, token: Token, sink: SinkHandle) -> Self {
        Self {
            stream,
            token,
            frames_in: FrameBuffer::new(),
            pending_out: BytesMut::new(),
            sink,
        }
    }

    /// Registration token of the underlying connection.
    pub fn token(&self) -> Token {
        self.token
    }

    /// The underlying connection, for reactor registration changes.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Bytes queued but not yet written; writable interest is needed while
    /// this is true.
    pub fn wants_write(&self) -> bool {
        !self.pending_out.is_empty()
    }

    /// Drain readable bytes and deliver every complete frame to the sink.
    ///
    /// Returns false once the peer has closed the connection. Malformed
    /// framing surfaces as an error the caller must treat as fatal for this
    /// session.
    pub fn handle_readable(&mut self) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    for body in self.frames_in.push(&chunk[..n])? {
                        let frame = Frame::decode(&body, 0, body.len())?;
                        self.sink.borrow_mut().on_frame(&frame);
                    }
                }
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => return Ok(true),
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Queue one frame for the peer and opportunistically flush.
    pub fn queue_frame(&mut self, frame: &Frame<'_>) -> Result<()> {
        let body_len = frame.encoded_len();
        let at = self.pending_out.len();
        self.pending_out
            .resize(at + LENGTH_PREFIX_SIZE + body_len, 0);
        self.pending_out[at..at + LENGTH_PREFIX_SIZE]
            .copy_from_slice(&(body_len as u32).to_le_bytes());
        frame.encode(&mut self.pending_out, at + LENGTH_PREFIX_SIZE);

        self.flush()
    }

    /// Flush pending bytes on writable readiness.
    pub fn handle_writable(&mut self) -> Result<()> {
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        while !self.pending_out.is_empty() {
            match self.stream.write(&self.pending_out) {
                Ok(0) => {
                    return Err(GatewireError::Io(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "connection wrote zero bytes",
                    )))
                }
                Ok(n) => {
                    let _ = self.pending_out.split_to(n);
                }
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }
}
