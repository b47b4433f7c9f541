//! Binding module - the adapter contract between protocol bindings.
//!
//! Bindings exchange frames through [`FrameSink`] handles; a binding that
//! accepts new streams implements [`StreamFactory`]. Adapters compose by
//! holding two sink handles (origin and routed) rather than subclassing a
//! stream type.
//!
//! All types here are worker-local: one worker thread owns a disjoint
//! partition of streams, so handles are `Rc<RefCell<..>>` and the `RefCell`
//! enforces the adapter contract that the two directions of one adapter are
//! never entered concurrently.

mod adapter;
mod route;

use std::cell::RefCell;
use std::rc::Rc;

use crate::protocol::{Begin, Frame};
use crate::stream::BudgetRegistry;

pub use adapter::{Adapter, AdapterBinding};
pub use route::{ResolvedRoute, RouteResolver, TableResolver};

/// Accepts one frame. The frame borrows the caller's scratch buffer and is
/// only valid for the duration of the call; implementations copy whatever
/// they keep.
pub trait FrameSink {
    /// Deliver one frame.
    fn on_frame(&mut self, frame: &Frame<'_>);
}

/// Shared handle to a frame sink, worker-local.
pub type SinkHandle = Rc<RefCell<dyn FrameSink>>;

/// Creates streams for accepted Begins.
pub trait StreamFactory {
    /// Create a stream for `begin`, or None if no route resolves (the
    /// dropped Begin is itself the signal; no error is raised).
    ///
    /// `sender` receives the frames the new stream emits back toward its
    /// origin: reply-direction frames plus Window and Reset. The caller
    /// delivers `begin` through the returned sink itself.
    fn new_stream(&mut self, begin: &Begin<'_>, sender: SinkHandle) -> Option<SinkHandle>;
}

/// Sink that drops every frame, standing in before a stream exists or after
/// it closed.
pub struct NullSink;

impl FrameSink for NullSink {
    fn on_frame(&mut self, _frame: &Frame<'_>) {}
}

/// Create a shared handle to a null sink.
pub fn null_sink() -> SinkHandle {
    Rc::new(RefCell::new(NullSink))
}

/// Derive the reply half-stream id from an initial half-stream id.
///
/// Pure and stable: the reply id is the initial id with the parity bit
/// cleared, so initial ids are odd and reply ids even.
#[inline]
pub fn supply_reply_id(initial_id: u64) -> u64 {
    initial_id & !1
}

/// Monotonic per-worker id generation for streams and traces.
///
/// Ids are unique within the owning worker's lifetime; cross-worker
/// uniqueness comes from the worker index seeding the high bits.
#[derive(Debug)]
pub struct IdAllocator {
    next_stream: u64,
    next_trace: u64,
}

impl IdAllocator {
    /// Create an allocator seeded for the given worker index.
    pub fn new(worker_index: u8) -> Self {
        let base = u64::from(worker_index) << 56;
        Self {
            next_stream: base,
            next_trace: base,
        }
    }

    /// Supply a fresh odd initial half-stream id.
    pub fn supply_initial_id(&mut self) -> u64 {
        self.next_stream += 2;
        self.next_stream | 1
    }

    /// Supply a fresh trace id.
    pub fn supply_trace_id(&mut self) -> u64 {
        self.next_trace += 1;
        self.next_trace
    }
}

/// Worker-local state shared by the bindings of one worker: id generation
/// and shared credit pools. Created on worker start, passed by handle to
/// each binding; never shared across workers.
#[derive(Debug)]
pub struct WorkerContext {
    /// Stream and trace id generation.
    pub ids: IdAllocator,
    /// Shared credit pools keyed by budget id.
    pub budgets: BudgetRegistry,
}

impl WorkerContext {
    /// Create the context for the given worker index.
    pub fn new(worker_index: u8) -> Self {
        Self {
            ids: IdAllocator::new(worker_index),
            budgets: BudgetRegistry::new(),
        }
    }
}

/// Shared handle to a worker context.
pub type ContextHandle = Rc<RefCell<WorkerContext>>;

/// Create a shared worker context handle.
pub fn worker_context(worker_index: u8) -> ContextHandle {
    Rc::new(RefCell::new(WorkerContext::new(worker_index)))
}
