//! Frame reassembly for byte-stream transports.
//!
//! On the wire each frame is preceded by a `u32` Little Endian length. This
//! buffer accumulates partial reads and yields complete frame bodies, using
//! `bytes::BytesMut` so extraction is a zero-copy split:
//! - `WaitingForLength`: need 4 bytes
//! - `WaitingForFrame`: length parsed, need N more bytes
//!
//! # Example
//!
//! ```
//! use gatewire::protocol::{Frame, FrameBuffer, Reset, FrameHeader};
//!
//! let reset = Frame::Reset(Reset { header: FrameHeader::default() });
//! let mut wire = (reset.encoded_len() as u32).to_le_bytes().to_vec();
//! wire.extend_from_slice(&reset.to_vec());
//!
//! let mut buffer = FrameBuffer::new();
//! let frames = buffer.push(&wire).unwrap();
//! assert_eq!(frames.len(), 1);
//! assert!(Frame::decode(&frames[0], 0, frames[0].len()).is_ok());
//! ```

use bytes::{Bytes, BytesMut};

use crate::error::{GatewireError, Result};

/// Size of the transport length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame size accepted off the wire (16 MB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// State machine for frame reassembly.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for the 4-byte length prefix.
    WaitingForLength,
    /// Length parsed, waiting for the frame body.
    WaitingForFrame { remaining: u32 },
}

/// Buffer accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed frame size.
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with a custom maximum frame size.
    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForLength,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frame bodies.
    ///
    /// Partial data is retained for the next push. A declared frame length
    /// of zero, below the smallest fixed prefix, or above the configured
    /// maximum fails with [`GatewireError::MalformedFrame`]; the caller must
    /// treat that as fatal for the transport session.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            State::WaitingForLength => {
                if self.buffer.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }

                let length =
                    u32::from_le_bytes(self.buffer[..LENGTH_PREFIX_SIZE].try_into().unwrap());

                if length < super::HEADER_SIZE as u32 {
                    return Err(GatewireError::MalformedFrame(format!(
                        "declared frame length {length} below fixed header size"
                    )));
                }
                if length > self.max_frame_size {
                    return Err(GatewireError::MalformedFrame(format!(
                        "declared frame length {length} exceeds maximum {}",
                        self.max_frame_size
                    )));
                }

                let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);
                self.state = State::WaitingForFrame { remaining: length };

                self.try_extract_one()
            }

            State::WaitingForFrame { remaining } => {
                let remaining = remaining as usize;
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let frame = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForLength;
                Ok(Some(frame))
            }
        }
    }

    /// Number of buffered bytes not yet extracted.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepend the transport length prefix to an encoded frame.
pub fn prefix_frame(frame: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(LENGTH_PREFIX_SIZE + frame.len());
    wire.extend_from_slice(&(frame.len() as u32).to_le_bytes());
    wire.extend_from_slice(frame);
    wire
}
