//! # gatewire
//!
//! Core of a declarative network gateway: independently pluggable protocol
//! bindings are wired into pipelines that translate one wire protocol into
//! another while preserving end-to-end backpressure and lifecycle semantics.
//! Every pipeline stage communicates over a single internal duplex-stream
//! protocol of fixed-layout binary frames.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): the seven frame kinds, zero-copy codec
//!   views, extension rewriting, and reassembly for byte-stream transports.
//! - **Streams** ([`stream`]): per-stream flow-control state machines and
//!   worker-local shared credit pools.
//! - **Bindings** ([`binding`]): the adapter pattern translating frames
//!   between an origin and a routed protocol, flow control propagated
//!   symmetrically.
//! - **Transport** ([`transport`]): single-threaded reactor, capacity-bounded
//!   connection admission, and per-connection sessions.
//!
//! The crate is a library consumed by an embedding engine: configuration
//! loading, catalog clients, TLS, and per-protocol payload semantics stay
//! outside, interacting only through frames and the types in [`config`].
//!
//! ## Example
//!
//! ```
//! use gatewire::protocol::{Begin, Frame, FrameHeader};
//!
//! let begin = Frame::Begin(Begin {
//!     header: FrameHeader { stream_id: 0x11, maximum: 8192, ..Default::default() },
//!     affinity: 0,
//!     extension: &[],
//! });
//!
//! let mut scratch = [0u8; 128];
//! let range = begin.encode(&mut scratch, 0);
//! let decoded = Frame::decode(&scratch, range.start, range.len()).unwrap();
//! assert_eq!(decoded.header().maximum, 8192);
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod protocol;
pub mod stream;
pub mod transport;

pub use error::{GatewireError, Result};
