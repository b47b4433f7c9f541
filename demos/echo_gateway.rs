//! Echo gateway demo.
//!
//! Wires an origin onto an adapter binding whose routed side is a tiny echo
//! binding: every Data received on the initial direction is queued and
//! played back on the reply direction. Responses are pumped from the demo
//! loop rather than emitted inside the delivery call, the way a real binding
//! re-enters through a fresh reactor event.
//!
//! Run with: `cargo run --example echo_gateway`

use std::cell::RefCell;
use std::rc::Rc;

use gatewire::binding::{
    supply_reply_id, worker_context, AdapterBinding, FrameSink, SinkHandle, StreamFactory,
};
use gatewire::config::{BindingConfig, BindingKind, RouteConfig};
use gatewire::protocol::{Begin, BeginEx, Data, End, Frame, FrameHeader, Window};

/// One echo stream: grants a window for the initial half and echoes Data on
/// the reply half. All emissions happen from `pump`, never from inside a
/// delivery call.
struct EchoStream {
    sender: SinkHandle,
    header: FrameHeader,
    initial_id: u64,
    reply_id: u64,
    credit_pending: bool,
    queued: Vec<Vec<u8>>,
    reply_open: bool,
    reply_sequence: i64,
    finished: bool,
}

impl EchoStream {
    /// Grant pending credit and play back queued payloads on the reply half.
    fn pump(&mut self) {
        if self.credit_pending {
            self.credit_pending = false;
            let window = Window {
                header: FrameHeader {
                    stream_id: self.initial_id,
                    ..self.header
                },
                budget_id: 0,
                minimum: 0,
                padding: 0,
                capabilities: 0,
            };
            self.sender.borrow_mut().on_frame(&Frame::Window(window));
        }

        if self.queued.is_empty() && !self.finished {
            return;
        }

        if !self.reply_open {
            let begin = Begin {
                header: self.reply_header(),
                affinity: 0,
                extension: &[],
            };
            self.sender.borrow_mut().on_frame(&Frame::Begin(begin));
            self.reply_open = true;
        }

        for payload in std::mem::take(&mut self.queued) {
            let data = Data {
                header: FrameHeader {
                    sequence: self.reply_sequence,
                    ..self.reply_header()
                },
                flags: 0x03,
                budget_id: 0,
                reserved: payload.len() as u32,
                payload: &payload,
                extension: &[],
            };
            self.sender.borrow_mut().on_frame(&Frame::Data(data));
            self.reply_sequence += payload.len() as i64;
        }

        if self.finished {
            let end = End {
                header: FrameHeader {
                    sequence: self.reply_sequence,
                    ..self.reply_header()
                },
                extension: &[],
            };
            self.sender.borrow_mut().on_frame(&Frame::End(end));
        }
    }

    fn reply_header(&self) -> FrameHeader {
        FrameHeader {
            stream_id: self.reply_id,
            sequence: 0,
            acknowledge: 0,
            maximum: 65536,
            ..self.header
        }
    }
}

impl FrameSink for EchoStream {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        match frame {
            Frame::Begin(begin) => {
                if let Ok(rewritten) = BeginEx::decode(begin.extension) {
                    tracing::info!(
                        api_id = rewritten.api_id,
                        operation_id = rewritten.operation_id,
                        original = %String::from_utf8_lossy(rewritten.origin_extension),
                        "echo stream opened"
                    );
                }
                self.credit_pending = true;
            }
            Frame::Data(data) => {
                tracing::info!(bytes = data.payload.len(), "echo queued payload");
                self.queued.push(data.payload.to_vec());
            }
            Frame::End(_) => self.finished = true,
            other => tracing::debug!(kind = ?other.kind(), "echo ignoring frame"),
        }
    }
}

/// Terminal binding that spawns one [`EchoStream`] per accepted Begin.
#[derive(Default)]
struct EchoBinding {
    streams: Vec<Rc<RefCell<EchoStream>>>,
}

impl StreamFactory for EchoBinding {
    fn new_stream(&mut self, begin: &Begin<'_>, sender: SinkHandle) -> Option<SinkHandle> {
        let stream = Rc::new(RefCell::new(EchoStream {
            sender,
            header: begin.header,
            initial_id: begin.header.stream_id,
            reply_id: supply_reply_id(begin.header.stream_id),
            credit_pending: false,
            queued: Vec::new(),
            reply_open: false,
            reply_sequence: 0,
            finished: false,
        }));
        self.streams.push(stream.clone());
        let handle: SinkHandle = stream;
        Some(handle)
    }
}

/// Origin-side sink printing everything that comes back.
struct PrintingSink;

impl FrameSink for PrintingSink {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        match frame {
            Frame::Window(window) => {
                tracing::info!(
                    stream_id = window.header.stream_id,
                    maximum = window.header.maximum,
                    "origin received credit"
                );
            }
            Frame::Data(data) => {
                tracing::info!(
                    stream_id = data.header.stream_id,
                    payload = %String::from_utf8_lossy(data.payload),
                    "origin received echo"
                );
            }
            other => {
                tracing::info!(kind = ?other.kind(), "origin received frame");
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let context = worker_context(0);
    let echo = Rc::new(RefCell::new(EchoBinding::default()));
    let downstream: Rc<RefCell<dyn StreamFactory>> = echo.clone();

    let config = BindingConfig {
        id: 0xB1,
        kind: BindingKind::Proxy,
        type_id: 0x0A,
        routes: vec![RouteConfig {
            route_id: 0xEC,
            authorized: 0,
            api_id: 42,
            operation_id: "echo".to_string(),
        }],
        options: None,
    };
    let mut gateway = AdapterBinding::attach(&config, downstream, context);

    // Origin opens the initial half.
    let origin: SinkHandle = Rc::new(RefCell::new(PrintingSink));
    let begin = Begin {
        header: FrameHeader {
            origin_id: 0xA0,
            routed_id: 0xB1,
            stream_id: 0x21,
            maximum: 65536,
            ..Default::default()
        },
        affinity: 0,
        extension: b"hello-gateway",
    };
    let entry = gateway
        .new_stream(&begin, origin)
        .expect("echo route resolves");
    entry.borrow_mut().on_frame(&Frame::Begin(begin));

    // Pump once: the echo binding grants credit for the initial half.
    let streams: Vec<_> = echo.borrow().streams.clone();
    for stream in &streams {
        stream.borrow_mut().pump();
    }

    // Origin sends payload within the granted window.
    entry.borrow_mut().on_frame(&Frame::Data(Data {
        header: FrameHeader {
            origin_id: 0xA0,
            routed_id: 0xB1,
            stream_id: 0x21,
            sequence: 0,
            ..Default::default()
        },
        flags: 0x03,
        budget_id: 0,
        reserved: 12,
        payload: b"echo me back",
        extension: &[],
    }));
    entry.borrow_mut().on_frame(&Frame::End(End {
        header: FrameHeader {
            origin_id: 0xA0,
            routed_id: 0xB1,
            stream_id: 0x21,
            sequence: 12,
            ..Default::default()
        },
        extension: &[],
    }));

    // Pump echo responses, as a reactor would on its next event.
    for stream in &streams {
        stream.borrow_mut().pump();
    }
}
