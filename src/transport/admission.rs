//! Connection admission control.
//!
//! Bounds concurrently accepted transport connections against a configured
//! capacity. Backpressure is applied by deregistering accept readiness: when
//! capacity is exhausted every server-kind binding is unbound from the
//! reactor so the poller stops waking for new connections; nothing is
//! rejected. Releasing a connection restores registration.
//!
//! Invariant: `0 <= available <= capacity`; no connection is accepted while
//! `available == 0`; a binding is registered exactly while `available > 0`
//! and the binding is attached.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};

use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Token};

use crate::config::{BindingConfig, BindingKind, ServerOptions};
use crate::error::{GatewireError, Result};

use super::reactor::Reactor;

/// One bound listening channel and its registration token.
struct Listener {
    channel: TcpListener,
    token: Token,
}

/// One attached server binding and its bound listeners. The listener set is
/// empty while the binding is deregistered.
struct ServerBinding {
    config: BindingConfig,
    listeners: Vec<Listener>,
}

/// Capacity-bounded connection acceptor.
pub struct AdmissionController {
    capacity: usize,
    available: usize,
    bindings: HashMap<u64, ServerBinding>,
    tokens: HashMap<Token, u64>,
}

impl AdmissionController {
    /// Create a controller admitting at most `capacity` concurrent
    /// connections.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            available: capacity,
            bindings: HashMap::new(),
            tokens: HashMap::new(),
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Connections that can still be admitted.
    pub fn available(&self) -> usize {
        self.available
    }

    /// Ports currently bound across all registered listeners. Engines that
    /// configure port 0 recover the chosen ports here.
    pub fn listen_ports(&self) -> Vec<u16> {
        self.bindings
            .values()
            .flat_map(|binding| &binding.listeners)
            .filter_map(|listener| listener.channel.local_addr().ok())
            .map(|addr| addr.port())
            .collect()
    }

    /// True while the binding's listeners are registered with the reactor.
    pub fn is_registered(&self, binding_id: u64) -> bool {
        self.bindings
            .get(&binding_id)
            .is_some_and(|binding| !binding.listeners.is_empty())
    }

    /// Attach a binding: bind one listening channel per configured port with
    /// address reuse and register each for accept readiness, capacity
    /// permitting.
    pub fn attach(&mut self, reactor: &mut Reactor, config: BindingConfig) -> Result<()> {
        let mut binding = ServerBinding {
            config,
            listeners: Vec::new(),
        };

        if self.available > 0 {
            if let Err(error) = Self::register(reactor, &mut binding, &mut self.tokens) {
                Self::unregister(reactor, &mut binding, &mut self.tokens);
                return Err(error);
            }
        }

        self.bindings.insert(binding.config.id, binding);
        Ok(())
    }

    /// Detach a binding, deregistering and closing its listening channels.
    pub fn detach(&mut self, reactor: &mut Reactor, binding_id: u64) {
        if let Some(mut binding) = self.bindings.remove(&binding_id) {
            Self::unregister(reactor, &mut binding, &mut self.tokens);
        }
    }

    /// Accept one pending connection on the listener behind `token`.
    ///
    /// Returns None while capacity is exhausted, for stale tokens, and when
    /// no connection is actually pending; exhaustion is the expected
    /// backpressure state, not an error. Accepting the last available slot
    /// deregisters every server binding.
    pub fn accept(
        &mut self,
        reactor: &mut Reactor,
        token: Token,
    ) -> Result<Option<(TcpStream, SocketAddr)>> {
        let Some(&binding_id) = self.tokens.get(&token) else {
            return Ok(None);
        };

        let mut accepted = None;

        if self.available > 0 {
            let Some(binding) = self.bindings.get_mut(&binding_id) else {
                return Ok(None);
            };
            let Some(listener) = binding
                .listeners
                .iter_mut()
                .find(|listener| listener.token == token)
            else {
                return Ok(None);
            };

            accepted = match listener.channel.accept() {
                Ok(connection) => Some(connection),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => None,
                Err(error) => return Err(error.into()),
            };

            if accepted.is_some() {
                self.available -= 1;
            }
        }

        if accepted.is_some() && self.available == 0 {
            tracing::debug!(capacity = self.capacity, "capacity exhausted, deregistering");
            for binding in self.bindings.values_mut() {
                if binding.config.kind == BindingKind::Server {
                    Self::unregister(reactor, binding, &mut self.tokens);
                }
            }
        }

        debug_assert!(self.available <= self.capacity);
        Ok(accepted)
    }

    /// Release a closed connection's slot. On the transition out of
    /// exhaustion every server binding is re-bound and re-registered.
    pub fn close(&mut self, reactor: &mut Reactor, connection: TcpStream) {
        drop(connection);

        if self.available == 0 {
            tracing::debug!(capacity = self.capacity, "capacity restored, re-registering");
            for binding in self.bindings.values_mut() {
                if binding.config.kind == BindingKind::Server {
                    if let Err(error) = Self::register(reactor, binding, &mut self.tokens) {
                        tracing::warn!(
                            error = %error,
                            binding_id = binding.config.id,
                            "failed to re-register listener"
                        );
                    }
                }
            }
        }

        self.available += 1;
        debug_assert!(self.available <= self.capacity);
    }

    fn register(
        reactor: &mut Reactor,
        binding: &mut ServerBinding,
        tokens: &mut HashMap<Token, u64>,
    ) -> Result<()> {
        if binding.config.kind != BindingKind::Server || !binding.listeners.is_empty() {
            return Ok(());
        }

        let options = binding.config.options.as_ref().ok_or_else(|| {
            GatewireError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "server binding without listener options",
            ))
        })?;

        for addr in Self::listen_addrs(options)? {
            // mio listeners bind with address reuse and non-blocking mode.
            let mut channel = TcpListener::bind(addr)?;
            let token = reactor.register(&mut channel, Interest::READABLE)?;
            tokens.insert(token, binding.config.id);
            binding.listeners.push(Listener { channel, token });
        }

        Ok(())
    }

    fn unregister(
        reactor: &mut Reactor,
        binding: &mut ServerBinding,
        tokens: &mut HashMap<Token, u64>,
    ) {
        for mut listener in binding.listeners.drain(..) {
            tokens.remove(&listener.token);
            if let Err(error) = reactor.deregister(&mut listener.channel) {
                tracing::warn!(error = %error, "failed to deregister listener");
            }
        }
    }

    fn listen_addrs(options: &ServerOptions) -> Result<Vec<SocketAddr>> {
        let host: IpAddr = options.host.parse().map_err(|_| {
            GatewireError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("listen host must be an address: {}", options.host),
            ))
        })?;

        Ok(options
            .ports
            .iter()
            .map(|&port| SocketAddr::new(host, port))
            .collect())
    }
}
