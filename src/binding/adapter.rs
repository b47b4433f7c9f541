//! The generic binding adapter: translates frames between an origin-side
//! protocol and a routed-side protocol while running one flow-control state
//! machine per side and keeping both synchronized.
//!
//! One [`AdapterBinding`] exists per configured binding; it resolves a route
//! for each arriving Begin and creates one [`Adapter`] per accepted stream.
//! Frame counters are forwarded verbatim, so the two sides share sequence
//! and acknowledge values; lifecycle state is tracked independently per side
//! because drain timing differs.
//!
//! Every frame kind is forwarded in its own direction; Window is the one
//! kind that flows opposite to all others, because credit travels from
//! consumer back to producer.
//!
//! Handlers are entered through `RefCell` borrows, which enforces the
//! contract that one adapter is never entered from both directions at once.
//! A binding that wants to respond to a frame must do so from a fresh
//! reactor event, never synchronously from inside the delivery call, and
//! binding graphs must be acyclic.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::BindingConfig;
use crate::error::GatewireError;
use crate::protocol::{
    Abort, Begin, BeginEx, Data, End, Flush, Frame, FrameHeader, Reset, Window,
};
use crate::stream::{HalfState, StreamFlow};

use super::route::{ResolvedRoute, RouteResolver, TableResolver};
use super::{supply_reply_id, ContextHandle, FrameSink, SinkHandle, StreamFactory};

/// One attached binding: resolves routes and owns the adapters of its
/// accepted streams. Implements [`StreamFactory`] toward its origin side.
pub struct AdapterBinding {
    binding_id: u64,
    type_id: u32,
    resolver: Box<dyn RouteResolver>,
    downstream: Rc<RefCell<dyn StreamFactory>>,
    context: ContextHandle,
    streams: HashMap<u64, Rc<RefCell<Adapter>>>,
}

impl AdapterBinding {
    /// Attach a binding using its configured routes for resolution.
    pub fn attach(
        config: &BindingConfig,
        downstream: Rc<RefCell<dyn StreamFactory>>,
        context: ContextHandle,
    ) -> Self {
        let resolver = Box::new(TableResolver::new(config.routes.clone()));
        Self::attach_with_resolver(config, resolver, downstream, context)
    }

    /// Attach a binding with an injected route resolver.
    pub fn attach_with_resolver(
        config: &BindingConfig,
        resolver: Box<dyn RouteResolver>,
        downstream: Rc<RefCell<dyn StreamFactory>>,
        context: ContextHandle,
    ) -> Self {
        Self {
            binding_id: config.id,
            type_id: config.type_id,
            resolver,
            downstream,
            context,
            streams: HashMap::new(),
        }
    }

    /// Number of streams currently tracked by this binding.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Detach the binding, synchronously cancelling all its streams.
    /// Partially drained Closing-state streams are force-closed.
    pub fn detach(&mut self) {
        for (_, adapter) in self.streams.drain() {
            adapter.borrow_mut().force_close();
        }
    }
}

impl StreamFactory for AdapterBinding {
    fn new_stream(&mut self, begin: &Begin<'_>, sender: SinkHandle) -> Option<SinkHandle> {
        if begin.header.routed_id != self.binding_id {
            tracing::warn!(
                routed_id = begin.header.routed_id,
                binding_id = self.binding_id,
                "Begin routed to a different binding, dropping"
            );
            return None;
        }

        let route = match self.resolver.resolve(begin.header.authorization) {
            Some(route) => route,
            None => {
                tracing::debug!(
                    stream_id = begin.header.stream_id,
                    authorization = begin.header.authorization,
                    "no route resolved, dropping Begin"
                );
                return None;
            }
        };

        // Closed streams linger until the next accept; sweep them here.
        self.streams.retain(|_, a| !a.borrow().is_closed());

        let adapter = Rc::new(RefCell::new(Adapter::attach(
            route,
            self.binding_id,
            self.type_id,
            begin,
            sender,
            self.downstream.clone(),
            self.context.clone(),
        )));

        let entry = Rc::new(RefCell::new(RoutedSink(adapter.clone())));
        adapter.borrow_mut().routed_entry = Some(entry);

        self.streams
            .insert(begin.header.stream_id, adapter.clone());

        Some(Rc::new(RefCell::new(OriginSink(adapter))))
    }
}

/// Entry point for frames arriving from the origin side.
struct OriginSink(Rc<RefCell<Adapter>>);

impl FrameSink for OriginSink {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        self.0.borrow_mut().on_origin_frame(frame);
    }
}

/// Entry point for frames arriving from the routed side.
struct RoutedSink(Rc<RefCell<Adapter>>);

impl FrameSink for RoutedSink {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        self.0.borrow_mut().on_routed_frame(frame);
    }
}

/// Adapter for one logical stream: an origin-side stream record and a
/// routed-side stream record with independent lifecycle but shared counters.
pub struct Adapter {
    // Origin side, fixed at attach.
    origin_id: u64,
    binding_id: u64,
    origin_initial_id: u64,
    origin_reply_id: u64,
    affinity: u64,
    authorization: u64,
    sender: SinkHandle,

    // Routed side.
    route_id: u64,
    type_id: u32,
    api_id: u64,
    operation_id: String,
    routed_initial_id: u64,
    routed_reply_id: u64,
    downstream: Rc<RefCell<dyn StreamFactory>>,
    receiver: Option<SinkHandle>,
    routed_entry: Option<SinkHandle>,

    origin_flow: StreamFlow,
    routed_flow: StreamFlow,

    context: ContextHandle,
    scratch: Vec<u8>,
}

impl Adapter {
    /// Bind a resolved route to a freshly allocated pair of routed-side
    /// stream identifiers.
    pub fn attach(
        route: ResolvedRoute,
        binding_id: u64,
        type_id: u32,
        begin: &Begin<'_>,
        sender: SinkHandle,
        downstream: Rc<RefCell<dyn StreamFactory>>,
        context: ContextHandle,
    ) -> Self {
        let routed_initial_id = context.borrow_mut().ids.supply_initial_id();
        let routed_reply_id = supply_reply_id(routed_initial_id);

        Self {
            origin_id: begin.header.origin_id,
            binding_id,
            origin_initial_id: begin.header.stream_id,
            origin_reply_id: supply_reply_id(begin.header.stream_id),
            affinity: begin.affinity,
            authorization: begin.header.authorization,
            sender,
            route_id: route.route_id,
            type_id,
            api_id: route.api_id,
            operation_id: route.operation_id,
            routed_initial_id,
            routed_reply_id,
            downstream,
            receiver: None,
            routed_entry: None,
            origin_flow: StreamFlow::default(),
            routed_flow: StreamFlow::default(),
            context,
            scratch: Vec::new(),
        }
    }

    /// The allocated routed-side initial stream id.
    pub fn routed_initial_id(&self) -> u64 {
        self.routed_initial_id
    }

    /// The derived routed-side reply stream id.
    pub fn routed_reply_id(&self) -> u64 {
        self.routed_reply_id
    }

    /// Both logical streams have fully closed.
    pub fn is_closed(&self) -> bool {
        self.origin_flow.is_closed() && self.routed_flow.is_closed()
    }

    /// Handle one frame arriving from the origin side.
    pub fn on_origin_frame(&mut self, frame: &Frame<'_>) {
        let header = *frame.header();
        let expected = match frame {
            Frame::Window(_) | Frame::Reset(_) => self.origin_reply_id,
            _ => self.origin_initial_id,
        };
        if header.stream_id != expected {
            self.origin_fault(
                GatewireError::ProtocolViolation(format!(
                    "frame for unknown stream {:#x}, expected {:#x}",
                    header.stream_id, expected
                )),
                &header,
            );
            return;
        }

        match frame {
            Frame::Begin(begin) => self.on_origin_begin(begin),
            Frame::Data(data) => self.on_origin_data(data),
            Frame::Flush(flush) => self.on_origin_flush(flush),
            Frame::End(end) => self.on_origin_end(end),
            Frame::Abort(abort) => self.on_origin_abort(abort),
            Frame::Window(window) => self.on_origin_window(window),
            Frame::Reset(reset) => self.on_origin_reset(reset),
        }
    }

    /// Handle one frame arriving from the routed side.
    pub fn on_routed_frame(&mut self, frame: &Frame<'_>) {
        let header = *frame.header();
        let expected = match frame {
            Frame::Window(_) | Frame::Reset(_) => self.routed_initial_id,
            _ => self.routed_reply_id,
        };
        if header.stream_id != expected {
            self.routed_fault(
                GatewireError::ProtocolViolation(format!(
                    "frame for unknown stream {:#x}, expected {:#x}",
                    header.stream_id, expected
                )),
                &header,
            );
            return;
        }

        match frame {
            Frame::Begin(begin) => self.on_routed_begin(begin),
            Frame::Data(data) => self.on_routed_data(data),
            Frame::Flush(flush) => self.on_routed_flush(flush),
            Frame::End(end) => self.on_routed_end(end),
            Frame::Abort(abort) => self.on_routed_abort(abort),
            Frame::Window(window) => self.on_routed_window(window),
            Frame::Reset(reset) => self.on_routed_reset(reset),
        }
    }

    // ------------------------------------------------------------------
    // Origin-side handlers (initial direction in, reply credit out)
    // ------------------------------------------------------------------

    fn on_origin_begin(&mut self, begin: &Begin<'_>) {
        if let Err(error) = self.origin_flow.initial.on_begin(&begin.header) {
            self.origin_fault(error, &begin.header);
            return;
        }

        // First-Begin policy: the routed stream is created lazily here and
        // must not exist yet. Double-open is a programming error.
        assert!(
            self.receiver.is_none() && self.routed_flow.initial.lifecycle() == HalfState::Idle,
            "routed stream re-created while non-Idle"
        );

        let routed_header = self.routed_header(self.routed_initial_id, &begin.header);
        self.routed_flow
            .initial
            .on_begin(&routed_header)
            .expect("mirrored Begin");

        // Rewrite the extension: routed protocol context wrapping the
        // original bytes so a downstream stage can recover them.
        let rewrite = BeginEx {
            type_id: self.type_id,
            api_id: self.api_id,
            operation_id: &self.operation_id,
            origin_extension: begin.extension,
        };
        if self.scratch.len() < rewrite.encoded_len() {
            self.scratch.resize(rewrite.encoded_len(), 0);
        }
        let ext_len = rewrite.encode(&mut self.scratch, 0);

        let routed_begin = Begin {
            header: routed_header,
            affinity: self.affinity,
            extension: &self.scratch[..ext_len],
        };

        let entry = self.routed_entry.take().expect("routed entry consumed once");
        let created = self
            .downstream
            .borrow_mut()
            .new_stream(&routed_begin, entry);

        match created {
            Some(receiver) => {
                receiver.borrow_mut().on_frame(&Frame::Begin(routed_begin));
                self.receiver = Some(receiver);
            }
            None => {
                // No downstream stream came to exist; refuse the origin half
                // and retire the stream record.
                let header = begin.header;
                self.routed_flow.initial.on_reset();
                self.routed_flow.reply.on_reset();
                self.origin_flow.reply.on_reset();
                if self.origin_flow.initial.on_reset() {
                    let reset = Frame::Reset(Reset {
                        header: self.origin_header(self.origin_initial_id, &header),
                    });
                    self.sender.clone().borrow_mut().on_frame(&reset);
                }
                self.maybe_release();
            }
        }
    }

    fn on_origin_data(&mut self, data: &Data<'_>) {
        if let Err(error) = self.origin_flow.initial.on_data(data) {
            self.origin_fault(error, &data.header);
            return;
        }

        if data.budget_id != 0
            && !self
                .context
                .borrow_mut()
                .budgets
                .debit(data.budget_id, i64::from(data.reserved))
        {
            self.origin_fault(
                GatewireError::ProtocolViolation(format!(
                    "budget {:#x} has insufficient credit for {} bytes",
                    data.budget_id, data.reserved
                )),
                &data.header,
            );
            return;
        }

        let out = Data {
            header: self.routed_header(self.routed_initial_id, &data.header),
            ..*data
        };
        let applied = self.routed_flow.initial.on_data(&out);
        debug_assert!(applied.is_ok());

        if let Some(receiver) = self.receiver.clone() {
            receiver.borrow_mut().on_frame(&Frame::Data(out));
        }
    }

    fn on_origin_flush(&mut self, flush: &Flush<'_>) {
        if let Err(error) = self.origin_flow.initial.on_flush(flush) {
            self.origin_fault(error, &flush.header);
            return;
        }

        let out = Flush {
            header: self.routed_header(self.routed_initial_id, &flush.header),
            ..*flush
        };
        let applied = self.routed_flow.initial.on_flush(&out);
        debug_assert!(applied.is_ok());

        if let Some(receiver) = self.receiver.clone() {
            receiver.borrow_mut().on_frame(&Frame::Flush(out));
        }
    }

    fn on_origin_end(&mut self, end: &End<'_>) {
        if !self.origin_flow.initial.on_end() {
            return;
        }

        if !self.routed_flow.initial.state.is_closed() {
            let out = End {
                header: self.routed_header(self.routed_initial_id, &end.header),
                extension: end.extension,
            };
            if let Some(receiver) = self.receiver.clone() {
                receiver.borrow_mut().on_frame(&Frame::End(out));
            }
            self.routed_flow.initial.on_end();
            self.routed_flow.initial.mark_drained();
        }

        self.origin_flow.initial.mark_drained();
        self.maybe_release();
    }

    fn on_origin_abort(&mut self, abort: &Abort<'_>) {
        if !self.origin_flow.initial.on_abort() {
            return;
        }

        if !self.routed_flow.initial.state.is_closed() {
            let out = Abort {
                header: self.routed_header(self.routed_initial_id, &abort.header),
                extension: abort.extension,
            };
            if let Some(receiver) = self.receiver.clone() {
                receiver.borrow_mut().on_frame(&Frame::Abort(out));
            }
            self.routed_flow.initial.on_abort();
            self.routed_flow.initial.mark_drained();
        }

        self.origin_flow.initial.mark_drained();
        self.maybe_release();
    }

    fn on_origin_window(&mut self, window: &Window) {
        // Origin grants credit for the reply direction; the producer is the
        // routed side, so the grant flows downstream.
        let acknowledged = self.origin_flow.reply.window.acknowledge;
        if let Err(error) = self.origin_flow.reply.on_window(window) {
            self.routed_fault(error, &window.header);
            return;
        }

        if window.budget_id != 0 {
            let freed = window.header.acknowledge - acknowledged;
            if freed > 0 {
                self.context.borrow_mut().budgets.credit(window.budget_id, freed);
            }
        }

        let out = Window {
            header: self.routed_header(self.routed_reply_id, &window.header),
            ..*window
        };
        let applied = self.routed_flow.reply.on_window(&out);
        debug_assert!(applied.is_ok());

        if let Some(receiver) = self.receiver.clone() {
            receiver.borrow_mut().on_frame(&Frame::Window(out));
        }
    }

    fn on_origin_reset(&mut self, reset: &Reset) {
        // Origin refuses further reply data.
        if !self.origin_flow.reply.on_reset() {
            return;
        }

        if !self.routed_flow.reply.state.is_closed() {
            self.routed_flow.reply.on_reset();
            let out = Reset {
                header: self.routed_header(self.routed_reply_id, &reset.header),
            };
            if let Some(receiver) = self.receiver.clone() {
                receiver.borrow_mut().on_frame(&Frame::Reset(out));
            }
        }

        self.maybe_release();
    }

    // ------------------------------------------------------------------
    // Routed-side handlers (reply direction in, initial credit out)
    // ------------------------------------------------------------------

    fn on_routed_begin(&mut self, begin: &Begin<'_>) {
        if let Err(error) = self.routed_flow.reply.on_begin(&begin.header) {
            self.routed_fault(error, &begin.header);
            return;
        }

        let origin_header = self.origin_header(self.origin_reply_id, &begin.header);
        self.origin_flow
            .reply
            .on_begin(&origin_header)
            .expect("mirrored Begin");

        // Unwrap a rewritten extension from our own protocol; anything else
        // passes through untouched.
        let extension = match BeginEx::decode(begin.extension) {
            Ok(rewritten) if rewritten.type_id == self.type_id => rewritten.origin_extension,
            _ => begin.extension,
        };

        let out = Begin {
            header: origin_header,
            affinity: self.affinity,
            extension,
        };
        self.sender.clone().borrow_mut().on_frame(&Frame::Begin(out));
    }

    fn on_routed_data(&mut self, data: &Data<'_>) {
        if let Err(error) = self.routed_flow.reply.on_data(data) {
            self.routed_fault(error, &data.header);
            return;
        }

        if data.budget_id != 0
            && !self
                .context
                .borrow_mut()
                .budgets
                .debit(data.budget_id, i64::from(data.reserved))
        {
            self.routed_fault(
                GatewireError::ProtocolViolation(format!(
                    "budget {:#x} has insufficient credit for {} bytes",
                    data.budget_id, data.reserved
                )),
                &data.header,
            );
            return;
        }

        let out = Data {
            header: self.origin_header(self.origin_reply_id, &data.header),
            ..*data
        };
        let applied = self.origin_flow.reply.on_data(&out);
        debug_assert!(applied.is_ok());

        self.sender.clone().borrow_mut().on_frame(&Frame::Data(out));
    }

    fn on_routed_flush(&mut self, flush: &Flush<'_>) {
        if let Err(error) = self.routed_flow.reply.on_flush(flush) {
            self.routed_fault(error, &flush.header);
            return;
        }

        let out = Flush {
            header: self.origin_header(self.origin_reply_id, &flush.header),
            ..*flush
        };
        let applied = self.origin_flow.reply.on_flush(&out);
        debug_assert!(applied.is_ok());

        self.sender.clone().borrow_mut().on_frame(&Frame::Flush(out));
    }

    fn on_routed_end(&mut self, end: &End<'_>) {
        if !self.routed_flow.reply.on_end() {
            return;
        }

        if self.origin_flow.reply.state.is_opening() && !self.origin_flow.reply.state.is_closed() {
            let out = End {
                header: self.origin_header(self.origin_reply_id, &end.header),
                extension: end.extension,
            };
            self.sender.clone().borrow_mut().on_frame(&Frame::End(out));
            self.origin_flow.reply.on_end();
            self.origin_flow.reply.mark_drained();
        }

        self.routed_flow.reply.mark_drained();
        self.maybe_release();
    }

    fn on_routed_abort(&mut self, abort: &Abort<'_>) {
        if !self.routed_flow.reply.on_abort() {
            return;
        }

        if self.origin_flow.reply.state.is_opening() && !self.origin_flow.reply.state.is_closed() {
            let out = Abort {
                header: self.origin_header(self.origin_reply_id, &abort.header),
                extension: abort.extension,
            };
            self.sender.clone().borrow_mut().on_frame(&Frame::Abort(out));
            self.origin_flow.reply.on_abort();
            self.origin_flow.reply.mark_drained();
        }

        self.routed_flow.reply.mark_drained();
        self.maybe_release();
    }

    fn on_routed_window(&mut self, window: &Window) {
        // The routed side grants credit for the initial direction; the
        // producer is the origin, so the grant flows upstream.
        let acknowledged = self.routed_flow.initial.window.acknowledge;
        if let Err(error) = self.routed_flow.initial.on_window(window) {
            self.origin_fault(error, &window.header);
            return;
        }

        if window.budget_id != 0 {
            let freed = window.header.acknowledge - acknowledged;
            if freed > 0 {
                self.context.borrow_mut().budgets.credit(window.budget_id, freed);
            }
        }

        let out = Window {
            header: self.origin_header(self.origin_initial_id, &window.header),
            ..*window
        };
        let applied = self.origin_flow.initial.on_window(&out);
        debug_assert!(applied.is_ok());

        self.sender.clone().borrow_mut().on_frame(&Frame::Window(out));
    }

    fn on_routed_reset(&mut self, reset: &Reset) {
        // The routed side refuses further initial data; the whole routed
        // stream is done and no further Data is forwarded either way.
        if !self.routed_flow.initial.on_reset() {
            return;
        }
        self.routed_flow.reply.on_reset();

        if self.origin_flow.initial.on_reset() {
            let out = Reset {
                header: self.origin_header(self.origin_initial_id, &reset.header),
            };
            self.sender.clone().borrow_mut().on_frame(&Frame::Reset(out));
        }

        if self.origin_flow.reply.state.is_opening() && !self.origin_flow.reply.state.is_closed() {
            let out = Abort {
                header: self.origin_header(self.origin_reply_id, &reset.header),
                extension: &[],
            };
            self.sender.clone().borrow_mut().on_frame(&Frame::Abort(out));
        }
        self.origin_flow.reply.on_reset();

        self.maybe_release();
    }

    // ------------------------------------------------------------------
    // Faults and teardown
    // ------------------------------------------------------------------

    /// Answer a violation on the initial direction: Reset toward the origin
    /// initial half, Abort toward the routed initial half.
    fn origin_fault(&mut self, error: GatewireError, header: &FrameHeader) {
        tracing::warn!(
            error = %error,
            stream_id = header.stream_id,
            "initial direction violation, resetting stream"
        );

        if self.origin_flow.initial.on_reset() {
            let out = Reset {
                header: self.origin_header(self.origin_initial_id, header),
            };
            self.sender.clone().borrow_mut().on_frame(&Frame::Reset(out));
        }

        if !self.routed_flow.initial.state.is_closed() {
            if self.routed_flow.initial.state.is_opening() {
                let out = Abort {
                    header: self.routed_header(self.routed_initial_id, header),
                    extension: &[],
                };
                if let Some(receiver) = self.receiver.clone() {
                    receiver.borrow_mut().on_frame(&Frame::Abort(out));
                }
            }
            self.routed_flow.initial.on_abort();
            self.routed_flow.initial.mark_drained();
        }

        self.maybe_release();
    }

    /// Answer a violation on the reply direction: Reset toward the routed
    /// reply half, Abort toward the origin reply half.
    fn routed_fault(&mut self, error: GatewireError, header: &FrameHeader) {
        tracing::warn!(
            error = %error,
            stream_id = header.stream_id,
            "reply direction violation, aborting stream"
        );

        if self.routed_flow.reply.on_reset() {
            let out = Reset {
                header: self.routed_header(self.routed_reply_id, header),
            };
            if let Some(receiver) = self.receiver.clone() {
                receiver.borrow_mut().on_frame(&Frame::Reset(out));
            }
        }

        if self.origin_flow.reply.state.is_opening() && !self.origin_flow.reply.state.is_closed() {
            let out = Abort {
                header: self.origin_header(self.origin_reply_id, header),
                extension: &[],
            };
            self.sender.clone().borrow_mut().on_frame(&Frame::Abort(out));
        }
        self.origin_flow.reply.on_reset();

        self.maybe_release();
    }

    /// Force-close every half that is still open, in both directions.
    pub fn force_close(&mut self) {
        let trace_id = self.context.borrow_mut().ids.supply_trace_id();
        let header = FrameHeader {
            origin_id: self.origin_id,
            routed_id: self.binding_id,
            stream_id: self.origin_initial_id,
            sequence: self.origin_flow.initial.window.sequence,
            acknowledge: self.origin_flow.initial.window.acknowledge,
            maximum: self.origin_flow.initial.window.maximum,
            timestamp: 0,
            trace_id,
            authorization: self.authorization,
        };

        if self.origin_flow.initial.on_reset() {
            let out = Reset {
                header: self.origin_header(self.origin_initial_id, &header),
            };
            self.sender.clone().borrow_mut().on_frame(&Frame::Reset(out));
        }

        if self.origin_flow.reply.state.is_opening() && !self.origin_flow.reply.state.is_closed() {
            let out = Abort {
                header: self.origin_header(self.origin_reply_id, &header),
                extension: &[],
            };
            self.sender.clone().borrow_mut().on_frame(&Frame::Abort(out));
        }
        self.origin_flow.reply.on_reset();

        if !self.routed_flow.initial.state.is_closed() {
            if self.routed_flow.initial.state.is_opening() {
                let out = Abort {
                    header: self.routed_header(self.routed_initial_id, &header),
                    extension: &[],
                };
                if let Some(receiver) = self.receiver.clone() {
                    receiver.borrow_mut().on_frame(&Frame::Abort(out));
                }
            }
            self.routed_flow.initial.on_abort();
            self.routed_flow.initial.mark_drained();
        }

        if self.routed_flow.reply.on_reset() {
            let out = Reset {
                header: self.routed_header(self.routed_reply_id, &header),
            };
            if let Some(receiver) = self.receiver.clone() {
                receiver.borrow_mut().on_frame(&Frame::Reset(out));
            }
        }

        self.maybe_release();
    }

    /// Drop the downstream handle once both streams have closed, so the
    /// worker-local reference cycle between adapter and routed stream
    /// unwinds.
    fn maybe_release(&mut self) {
        if self.is_closed() {
            self.receiver = None;
            self.routed_entry = None;
        }
    }

    fn origin_header(&self, stream_id: u64, src: &FrameHeader) -> FrameHeader {
        FrameHeader {
            origin_id: self.origin_id,
            routed_id: self.binding_id,
            stream_id,
            ..*src
        }
    }

    fn routed_header(&self, stream_id: u64, src: &FrameHeader) -> FrameHeader {
        FrameHeader {
            origin_id: self.binding_id,
            routed_id: self.route_id,
            stream_id,
            ..*src
        }
    }
}
