//! Transport module - reactor, admission control, and connection sessions.
//!
//! The reactor is a single-threaded poller; one runs per worker and owns a
//! disjoint partition of connections. The admission controller bounds
//! concurrent accepts against a capacity and applies backpressure by
//! deregistering accept readiness. Sessions wrap accepted connections into
//! the first duplex stream of a pipeline.

mod admission;
mod reactor;
mod session;

pub use admission::AdmissionController;
pub use reactor::{Readiness, Reactor};
pub use session::TransportSession;

// Reactor-facing poller types, re-exported for embedding engines.
pub use mio::{Interest, Token};
