//! Wire format: frame kinds, fixed field offsets, and the common header.
//!
//! Every frame starts with a `u32` kind tag followed by the 68-byte common
//! header, then kind-specific fields at packed fixed offsets:
//! ```text
//! ┌──────┬──────────┬──────────┬──────────┬──────────┬─────────────┬─────────┐
//! │ kind │ originId │ routedId │ streamId │ sequence │ acknowledge │ maximum │
//! │ u32  │ u64      │ u64      │ u64      │ i64      │ i64         │ u32     │
//! ├──────┴──┬───────┴──┬───────┴──────┬───┴──────────┴─────────────┴─────────┘
//! │timestamp│ traceId  │ authorization│ ...kind-specific fields...
//! │ u64     │ u64      │ u64          │
//! └─────────┴──────────┴──────────────┘
//! ```
//!
//! All multi-byte integers are Little Endian. There is no padding; frame size
//! is the offset of the last declared field plus its width, plus any payload
//! and extension bytes.

use crate::error::{GatewireError, Result};

/// Size of the common header in bytes (kind tag included).
pub const HEADER_SIZE: usize = 72;

/// Byte offsets of the common header fields.
pub mod offsets {
    /// Kind tag (`u32`).
    pub const KIND: usize = 0;
    /// Identity of the binding the frame came from (`u64`).
    pub const ORIGIN_ID: usize = 4;
    /// Identity of the binding the frame is routed to (`u64`).
    pub const ROUTED_ID: usize = 12;
    /// Half-stream identifier; odd = initial, even = reply (`u64`).
    pub const STREAM_ID: usize = 20;
    /// Monotonic sent-byte counter (`i64`).
    pub const SEQUENCE: usize = 28;
    /// Monotonic acknowledged-byte counter (`i64`).
    pub const ACKNOWLEDGE: usize = 36;
    /// Window ceiling granted by the receiver (`u32`).
    pub const MAXIMUM: usize = 44;
    /// Origin clock, opaque to the core (`u64`).
    pub const TIMESTAMP: usize = 48;
    /// End-to-end trace correlation id (`u64`).
    pub const TRACE_ID: usize = 56;
    /// Opaque capability token (`u64`).
    pub const AUTHORIZATION: usize = 64;

    /// Begin: stream affinity (`u64`), then extension bytes.
    pub const BEGIN_AFFINITY: usize = 72;
    /// Begin: extension bytes to frame end.
    pub const BEGIN_EXTENSION: usize = 80;

    /// Data: fragmentation flags (`u8`).
    pub const DATA_FLAGS: usize = 72;
    /// Data: shared credit pool id, 0 = none (`u64`).
    pub const DATA_BUDGET_ID: usize = 73;
    /// Data: credit bytes this frame consumes, payload + padding (`u32`).
    pub const DATA_RESERVED: usize = 81;
    /// Data: payload length (`u32`), payload bytes follow.
    pub const DATA_LENGTH: usize = 85;
    /// Data: first payload byte; extension bytes follow the payload.
    pub const DATA_PAYLOAD: usize = 89;

    /// Flush: shared credit pool id (`u64`).
    pub const FLUSH_BUDGET_ID: usize = 72;
    /// Flush: reserved credit bytes (`u32`).
    pub const FLUSH_RESERVED: usize = 80;
    /// Flush: extension bytes to frame end.
    pub const FLUSH_EXTENSION: usize = 84;

    /// End/Abort: extension bytes to frame end.
    pub const TERMINAL_EXTENSION: usize = 72;

    /// Window: shared credit pool id (`u64`).
    pub const WINDOW_BUDGET_ID: usize = 72;
    /// Window: minimum frame size the sender should produce (`u32`).
    pub const WINDOW_MINIMUM: usize = 80;
    /// Window: per-frame reservation overhead (`u32`).
    pub const WINDOW_PADDING: usize = 84;
    /// Window: receiver capability bits (`u8`).
    pub const WINDOW_CAPABILITIES: usize = 88;
}

/// Data frame fragmentation flags, carried verbatim by the core.
pub mod flags {
    /// Final fragment of a message.
    pub const FIN: u8 = 0x01;
    /// Initial fragment of a message.
    pub const INIT: u8 = 0x02;
    /// Fragment is incomplete (continuation follows).
    pub const INCOMPLETE: u8 = 0x04;
    /// Fragment should be skipped by payload interpreters.
    pub const SKIP: u8 = 0x08;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// The seven frame kinds of the duplex-stream protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FrameKind {
    /// Opens a half-stream.
    Begin = 0x0000_0001,
    /// Carries payload within the granted window.
    Data = 0x0000_0002,
    /// Graceful half-stream close.
    End = 0x0000_0003,
    /// Abnormal half-stream close.
    Abort = 0x0000_0004,
    /// Signal without payload advance.
    Flush = 0x0000_0005,
    /// Receiver refuses further input.
    Reset = 0x4000_0001,
    /// Flow-control credit grant, receiver to sender.
    Window = 0x4000_0002,
}

impl FrameKind {
    /// Decode a kind tag.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0x0000_0001 => Some(Self::Begin),
            0x0000_0002 => Some(Self::Data),
            0x0000_0003 => Some(Self::End),
            0x0000_0004 => Some(Self::Abort),
            0x0000_0005 => Some(Self::Flush),
            0x4000_0001 => Some(Self::Reset),
            0x4000_0002 => Some(Self::Window),
            _ => None,
        }
    }

    /// The wire tag for this kind.
    #[inline]
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Size of the fixed-layout prefix for this kind.
    ///
    /// A buffer shorter than this cannot hold a valid frame of the kind.
    pub fn fixed_size(self) -> usize {
        match self {
            Self::Begin => offsets::BEGIN_EXTENSION,
            Self::Data => offsets::DATA_PAYLOAD,
            Self::End | Self::Abort => offsets::TERMINAL_EXTENSION,
            Self::Flush => offsets::FLUSH_EXTENSION,
            Self::Reset => HEADER_SIZE,
            Self::Window => offsets::WINDOW_CAPABILITIES + 1,
        }
    }

    /// True for Window: the one kind that flows from consumer back to
    /// producer, opposite to every other kind.
    #[inline]
    pub fn flows_upstream(self) -> bool {
        self == Self::Window
    }
}

/// Common header present on every frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    /// Identity of the binding the frame came from.
    pub origin_id: u64,
    /// Identity of the binding the frame is routed to.
    pub routed_id: u64,
    /// Half-stream identifier; odd = initial, even = reply.
    pub stream_id: u64,
    /// Monotonic sent-byte counter.
    pub sequence: i64,
    /// Monotonic acknowledged-byte counter.
    pub acknowledge: i64,
    /// Window ceiling granted by the receiver.
    pub maximum: u32,
    /// Origin clock, opaque to the core.
    pub timestamp: u64,
    /// End-to-end trace correlation id.
    pub trace_id: u64,
    /// Opaque capability token.
    pub authorization: u64,
}

impl FrameHeader {
    /// True if this frame belongs to an initial half-stream.
    #[inline]
    pub fn is_initial(&self) -> bool {
        self.stream_id & 1 != 0
    }

    /// Write the kind tag and common header fields at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `buf[offset..]` is shorter than [`HEADER_SIZE`].
    pub(super) fn encode_into(&self, kind: FrameKind, buf: &mut [u8], offset: usize) {
        put_u32(buf, offset + offsets::KIND, kind.tag());
        put_u64(buf, offset + offsets::ORIGIN_ID, self.origin_id);
        put_u64(buf, offset + offsets::ROUTED_ID, self.routed_id);
        put_u64(buf, offset + offsets::STREAM_ID, self.stream_id);
        put_i64(buf, offset + offsets::SEQUENCE, self.sequence);
        put_i64(buf, offset + offsets::ACKNOWLEDGE, self.acknowledge);
        put_u32(buf, offset + offsets::MAXIMUM, self.maximum);
        put_u64(buf, offset + offsets::TIMESTAMP, self.timestamp);
        put_u64(buf, offset + offsets::TRACE_ID, self.trace_id);
        put_u64(buf, offset + offsets::AUTHORIZATION, self.authorization);
    }

    /// Read the common header fields at `offset`; the kind tag has already
    /// been consumed by the caller.
    pub(super) fn decode_from(buf: &[u8], offset: usize) -> Self {
        Self {
            origin_id: get_u64(buf, offset + offsets::ORIGIN_ID),
            routed_id: get_u64(buf, offset + offsets::ROUTED_ID),
            stream_id: get_u64(buf, offset + offsets::STREAM_ID),
            sequence: get_i64(buf, offset + offsets::SEQUENCE),
            acknowledge: get_i64(buf, offset + offsets::ACKNOWLEDGE),
            maximum: get_u32(buf, offset + offsets::MAXIMUM),
            timestamp: get_u64(buf, offset + offsets::TIMESTAMP),
            trace_id: get_u64(buf, offset + offsets::TRACE_ID),
            authorization: get_u64(buf, offset + offsets::AUTHORIZATION),
        }
    }
}

/// Peek the kind tag of an encoded frame.
///
/// Fails with [`GatewireError::MalformedFrame`] on a truncated or unknown tag.
pub fn peek_kind(buf: &[u8], offset: usize, length: usize) -> Result<FrameKind> {
    if length < 4 || buf.len() < offset + 4 {
        return Err(GatewireError::MalformedFrame(
            "buffer too short for kind tag".to_string(),
        ));
    }
    let tag = get_u32(buf, offset + offsets::KIND);
    FrameKind::from_tag(tag)
        .ok_or_else(|| GatewireError::MalformedFrame(format!("unknown kind tag 0x{tag:08x}")))
}

#[inline]
pub(super) fn get_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

#[inline]
pub(super) fn get_u64(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

#[inline]
pub(super) fn get_i64(buf: &[u8], at: usize) -> i64 {
    i64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

#[inline]
pub(super) fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(super) fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(super) fn put_i64(buf: &mut [u8], at: usize, value: i64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}
