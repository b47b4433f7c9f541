//! Single-threaded reactor over the OS poller.
//!
//! One reactor per worker: channels are registered with an interest and a
//! token, `poll` returns the ready set, and the owning worker loop invokes
//! the matching handler synchronously. Handlers must not block; anything
//! blocking is delegated to collaborators outside the core and re-enters
//! via a new reactor event.

use std::io;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};

/// Default event capacity per poll call.
const EVENTS_CAPACITY: usize = 256;

/// One readiness event returned by [`Reactor::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Registration token of the ready channel.
    pub token: Token,
    /// Channel is ready for reading (or accepting).
    pub readable: bool,
    /// Channel is ready for writing.
    pub writable: bool,
}

/// Poller wrapper owning token assignment for one worker.
pub struct Reactor {
    poll: Poll,
    events: Events,
    next_token: usize,
}

impl Reactor {
    /// Create a reactor with its own OS poller.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENTS_CAPACITY),
            next_token: 0,
        })
    }

    /// Register a channel for `interest`, returning its token.
    pub fn register(&mut self, source: &mut dyn Source, interest: Interest) -> io::Result<Token> {
        let token = Token(self.next_token);
        self.next_token += 1;
        self.poll.registry().register(source, token, interest)?;
        Ok(token)
    }

    /// Change the interest set of a registered channel.
    pub fn reregister(
        &mut self,
        source: &mut dyn Source,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        self.poll.registry().reregister(source, token, interest)
    }

    /// Remove a channel from the poller. Events already queued for it may
    /// still surface once; callers look the token up before acting.
    pub fn deregister(&mut self, source: &mut dyn Source) -> io::Result<()> {
        self.poll.registry().deregister(source)
    }

    /// Wait for readiness, at most `timeout`, and return the ready set.
    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Readiness>> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }

        Ok(self
            .events
            .iter()
            .map(|event| Readiness {
                token: event.token(),
                readable: event.is_readable(),
                writable: event.is_writable(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::net::TcpListener;

    #[test]
    fn test_register_assigns_distinct_tokens() {
        let mut reactor = Reactor::new().unwrap();

        let mut first = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let mut second = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();

        let t1 = reactor.register(&mut first, Interest::READABLE).unwrap();
        let t2 = reactor.register(&mut second, Interest::READABLE).unwrap();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_poll_times_out_when_idle() {
        let mut reactor = Reactor::new().unwrap();
        let ready = reactor.poll(Some(Duration::from_millis(10))).unwrap();
        assert!(ready.is_empty());
    }

    #[test]
    fn test_accept_readiness_surfaces() {
        let mut reactor = Reactor::new().unwrap();

        let mut listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let token = reactor.register(&mut listener, Interest::READABLE).unwrap();

        let _client = std::net::TcpStream::connect(addr).unwrap();

        let mut ready = Vec::new();
        for _ in 0..50 {
            ready = reactor.poll(Some(Duration::from_millis(100))).unwrap();
            if !ready.is_empty() {
                break;
            }
        }

        assert!(ready.iter().any(|r| r.token == token && r.readable));
    }

    #[test]
    fn test_deregistered_listener_goes_quiet() {
        let mut reactor = Reactor::new().unwrap();

        let mut listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        reactor.register(&mut listener, Interest::READABLE).unwrap();
        reactor.deregister(&mut listener).unwrap();

        let _client = std::net::TcpStream::connect(addr).unwrap();

        let ready = reactor.poll(Some(Duration::from_millis(50))).unwrap();
        assert!(ready.is_empty());
    }
}
