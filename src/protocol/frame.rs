//! Typed frame views with zero-copy decode and scratch-buffer encode.
//!
//! A [`Frame`] borrows payload and extension bytes from the buffer it was
//! decoded from; it is valid only for the duration of the call that produced
//! it. Receivers copy whatever they need to keep.
//!
//! # Example
//!
//! ```
//! use gatewire::protocol::{Begin, Frame, FrameHeader};
//!
//! let begin = Begin {
//!     header: FrameHeader { stream_id: 0x11, maximum: 8192, ..Default::default() },
//!     affinity: 0,
//!     extension: b"ctx",
//! };
//!
//! let mut scratch = [0u8; 128];
//! let range = Frame::Begin(begin).encode(&mut scratch, 0);
//! let frame = Frame::decode(&scratch, range.start, range.len()).unwrap();
//! assert_eq!(frame.header().stream_id, 0x11);
//! ```

use std::ops::Range;

use super::wire_format::{
    get_u32, get_u64, offsets, peek_kind, put_u32, put_u64, FrameHeader, FrameKind,
};
use crate::error::{GatewireError, Result};

/// Begin frame: opens a half-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Begin<'a> {
    /// Common header.
    pub header: FrameHeader,
    /// Pins the logical stream to one worker for its lifetime.
    pub affinity: u64,
    /// Protocol-specific context, opaque to the core.
    pub extension: &'a [u8],
}

/// Data frame: carries payload within the granted window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Data<'a> {
    /// Common header.
    pub header: FrameHeader,
    /// Fragmentation flags, carried verbatim.
    pub flags: u8,
    /// Shared credit pool id; 0 = stream window only.
    pub budget_id: u64,
    /// Credit bytes this frame consumes (payload length + padding).
    pub reserved: u32,
    /// Payload bytes.
    pub payload: &'a [u8],
    /// Protocol-specific context following the payload.
    pub extension: &'a [u8],
}

/// Flush frame: signal without payload advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flush<'a> {
    /// Common header.
    pub header: FrameHeader,
    /// Shared credit pool id; 0 = stream window only.
    pub budget_id: u64,
    /// Credit bytes reserved by the signal.
    pub reserved: u32,
    /// Protocol-specific context.
    pub extension: &'a [u8],
}

/// End frame: graceful half-stream close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct End<'a> {
    /// Common header.
    pub header: FrameHeader,
    /// Protocol-specific context.
    pub extension: &'a [u8],
}

/// Abort frame: abnormal half-stream close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort<'a> {
    /// Common header.
    pub header: FrameHeader,
    /// Protocol-specific context.
    pub extension: &'a [u8],
}

/// Window frame: credit grant flowing from receiver back to sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Common header; `maximum` is the updated window ceiling.
    pub header: FrameHeader,
    /// Shared credit pool id; 0 = stream window only.
    pub budget_id: u64,
    /// Minimum frame size the sender should produce.
    pub minimum: u32,
    /// Reservation overhead the sender adds to `reserved`.
    pub padding: u32,
    /// Receiver capability bits, opaque to the core.
    pub capabilities: u8,
}

/// Reset frame: receiver refuses further input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reset {
    /// Common header.
    pub header: FrameHeader,
}

/// A decoded frame of any kind, borrowing from the decode buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Opens a half-stream.
    Begin(Begin<'a>),
    /// Carries payload.
    Data(Data<'a>),
    /// Graceful close.
    End(End<'a>),
    /// Abnormal close.
    Abort(Abort<'a>),
    /// Signal without payload advance.
    Flush(Flush<'a>),
    /// Receiver refusal.
    Reset(Reset),
    /// Credit grant.
    Window(Window),
}

impl<'a> Frame<'a> {
    /// The kind of this frame.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Begin(_) => FrameKind::Begin,
            Frame::Data(_) => FrameKind::Data,
            Frame::End(_) => FrameKind::End,
            Frame::Abort(_) => FrameKind::Abort,
            Frame::Flush(_) => FrameKind::Flush,
            Frame::Reset(_) => FrameKind::Reset,
            Frame::Window(_) => FrameKind::Window,
        }
    }

    /// The common header of this frame.
    pub fn header(&self) -> &FrameHeader {
        match self {
            Frame::Begin(f) => &f.header,
            Frame::Data(f) => &f.header,
            Frame::End(f) => &f.header,
            Frame::Abort(f) => &f.header,
            Frame::Flush(f) => &f.header,
            Frame::Reset(f) => &f.header,
            Frame::Window(f) => &f.header,
        }
    }

    /// Mutable access to the common header.
    pub fn header_mut(&mut self) -> &mut FrameHeader {
        match self {
            Frame::Begin(f) => &mut f.header,
            Frame::Data(f) => &mut f.header,
            Frame::End(f) => &mut f.header,
            Frame::Abort(f) => &mut f.header,
            Frame::Flush(f) => &mut f.header,
            Frame::Reset(f) => &mut f.header,
            Frame::Window(f) => &mut f.header,
        }
    }

    /// True if this frame closes its half-stream (End, Abort, or Reset).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::End(_) | Frame::Abort(_) | Frame::Reset(_))
    }

    /// Total encoded size of this frame in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            Frame::Begin(f) => FrameKind::Begin.fixed_size() + f.extension.len(),
            Frame::Data(f) => {
                FrameKind::Data.fixed_size() + f.payload.len() + f.extension.len()
            }
            Frame::End(f) => FrameKind::End.fixed_size() + f.extension.len(),
            Frame::Abort(f) => FrameKind::Abort.fixed_size() + f.extension.len(),
            Frame::Flush(f) => FrameKind::Flush.fixed_size() + f.extension.len(),
            Frame::Reset(_) => FrameKind::Reset.fixed_size(),
            Frame::Window(_) => FrameKind::Window.fixed_size(),
        }
    }

    /// Encode this frame into `buf` starting at `offset`.
    ///
    /// Returns the occupied byte range. The caller owns the buffer; the
    /// encoded bytes are valid until the caller reuses it.
    ///
    /// # Panics
    ///
    /// Panics if `buf[offset..]` is shorter than [`Frame::encoded_len`].
    pub fn encode(&self, buf: &mut [u8], offset: usize) -> Range<usize> {
        let len = self.encoded_len();
        assert!(
            buf.len() >= offset + len,
            "scratch buffer too small: need {} at {}, have {}",
            len,
            offset,
            buf.len()
        );

        self.header().encode_into(self.kind(), buf, offset);

        match self {
            Frame::Begin(f) => {
                put_u64(buf, offset + offsets::BEGIN_AFFINITY, f.affinity);
                let at = offset + offsets::BEGIN_EXTENSION;
                buf[at..at + f.extension.len()].copy_from_slice(f.extension);
            }
            Frame::Data(f) => {
                buf[offset + offsets::DATA_FLAGS] = f.flags;
                put_u64(buf, offset + offsets::DATA_BUDGET_ID, f.budget_id);
                put_u32(buf, offset + offsets::DATA_RESERVED, f.reserved);
                put_u32(buf, offset + offsets::DATA_LENGTH, f.payload.len() as u32);
                let at = offset + offsets::DATA_PAYLOAD;
                buf[at..at + f.payload.len()].copy_from_slice(f.payload);
                let at = at + f.payload.len();
                buf[at..at + f.extension.len()].copy_from_slice(f.extension);
            }
            Frame::End(f) => {
                let at = offset + offsets::TERMINAL_EXTENSION;
                buf[at..at + f.extension.len()].copy_from_slice(f.extension);
            }
            Frame::Abort(f) => {
                let at = offset + offsets::TERMINAL_EXTENSION;
                buf[at..at + f.extension.len()].copy_from_slice(f.extension);
            }
            Frame::Flush(f) => {
                put_u64(buf, offset + offsets::FLUSH_BUDGET_ID, f.budget_id);
                put_u32(buf, offset + offsets::FLUSH_RESERVED, f.reserved);
                let at = offset + offsets::FLUSH_EXTENSION;
                buf[at..at + f.extension.len()].copy_from_slice(f.extension);
            }
            Frame::Reset(_) => {}
            Frame::Window(f) => {
                put_u64(buf, offset + offsets::WINDOW_BUDGET_ID, f.budget_id);
                put_u32(buf, offset + offsets::WINDOW_MINIMUM, f.minimum);
                put_u32(buf, offset + offsets::WINDOW_PADDING, f.padding);
                buf[offset + offsets::WINDOW_CAPABILITIES] = f.capabilities;
            }
        }

        offset..offset + len
    }

    /// Encode this frame into a fresh vector (tests and demos).
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        self.encode(&mut buf, 0);
        buf
    }

    /// Decode the frame occupying `buf[offset..offset + length]`.
    ///
    /// Payload and extension are zero-copy sub-slices of `buf`. Fails with
    /// [`GatewireError::MalformedFrame`] if `length` does not cover the
    /// kind's fixed prefix, the kind tag is unknown, or the declared Data
    /// payload does not fit. No semantic validation is performed here.
    pub fn decode(buf: &'a [u8], offset: usize, length: usize) -> Result<Frame<'a>> {
        if buf.len() < offset + length {
            return Err(GatewireError::MalformedFrame(format!(
                "buffer holds {} bytes, frame claims {} at {}",
                buf.len(),
                length,
                offset
            )));
        }

        let kind = peek_kind(buf, offset, length)?;
        if length < kind.fixed_size() {
            return Err(GatewireError::MalformedFrame(format!(
                "{kind:?} needs {} bytes, got {length}",
                kind.fixed_size()
            )));
        }

        let header = FrameHeader::decode_from(buf, offset);
        let end = offset + length;

        let frame = match kind {
            FrameKind::Begin => Frame::Begin(Begin {
                header,
                affinity: get_u64(buf, offset + offsets::BEGIN_AFFINITY),
                extension: &buf[offset + offsets::BEGIN_EXTENSION..end],
            }),
            FrameKind::Data => {
                let payload_len = get_u32(buf, offset + offsets::DATA_LENGTH) as usize;
                let payload_at = offset + offsets::DATA_PAYLOAD;
                if payload_at + payload_len > end {
                    return Err(GatewireError::MalformedFrame(format!(
                        "Data payload of {payload_len} bytes exceeds frame length {length}"
                    )));
                }
                Frame::Data(Data {
                    header,
                    flags: buf[offset + offsets::DATA_FLAGS],
                    budget_id: get_u64(buf, offset + offsets::DATA_BUDGET_ID),
                    reserved: get_u32(buf, offset + offsets::DATA_RESERVED),
                    payload: &buf[payload_at..payload_at + payload_len],
                    extension: &buf[payload_at + payload_len..end],
                })
            }
            FrameKind::End => Frame::End(End {
                header,
                extension: &buf[offset + offsets::TERMINAL_EXTENSION..end],
            }),
            FrameKind::Abort => Frame::Abort(Abort {
                header,
                extension: &buf[offset + offsets::TERMINAL_EXTENSION..end],
            }),
            FrameKind::Flush => Frame::Flush(Flush {
                header,
                budget_id: get_u64(buf, offset + offsets::FLUSH_BUDGET_ID),
                reserved: get_u32(buf, offset + offsets::FLUSH_RESERVED),
                extension: &buf[offset + offsets::FLUSH_EXTENSION..end],
            }),
            FrameKind::Reset => Frame::Reset(Reset { header }),
            FrameKind::Window => Frame::Window(Window {
                header,
                budget_id: get_u64(buf, offset + offsets::WINDOW_BUDGET_ID),
                minimum: get_u32(buf, offset + offsets::WINDOW_MINIMUM),
                padding: get_u32(buf, offset + offsets::WINDOW_PADDING),
                capabilities: buf[offset + offsets::WINDOW_CAPABILITIES],
            }),
        };

        Ok(frame)
    }
}
