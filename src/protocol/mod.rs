//! Protocol module - frame wire format, typed views, and reassembly.
//!
//! This module implements the internal duplex-stream protocol:
//! - Fixed-layout binary encoding of the seven frame kinds
//! - Zero-copy decode views over caller-supplied buffers
//! - Type-tagged Begin extension rewriting across protocol boundaries
//! - Reassembly buffer for byte-stream transports

mod extension;
mod frame;
mod frame_buffer;
mod wire_format;

pub use extension::{BeginEx, BEGIN_EX_FIXED_SIZE};
pub use frame::{Abort, Begin, Data, End, Flush, Frame, Reset, Window};
pub use frame_buffer::{prefix_frame, FrameBuffer, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};
pub use wire_format::{flags, offsets, peek_kind, FrameHeader, FrameKind, HEADER_SIZE};
