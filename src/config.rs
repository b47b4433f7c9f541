//! Configuration boundary types.
//!
//! Configuration loading and validation belong to the embedding engine; the
//! core only consumes these already-validated shapes. They derive serde so
//! an engine can hand them over as JSON.
//!
//! # Example
//!
//! ```
//! use gatewire::config::BindingConfig;
//!
//! let config: BindingConfig = serde_json::from_str(
//!     r#"{
//!         "id": 1,
//!         "kind": "server",
//!         "type_id": 11,
//!         "options": { "host": "127.0.0.1", "ports": [8080] }
//!     }"#,
//! )
//! .unwrap();
//! assert_eq!(config.options.unwrap().ports, vec![8080]);
//! ```

use serde::{Deserialize, Serialize};

/// Default listener backlog.
pub const DEFAULT_BACKLOG: u32 = 128;

/// Role of a binding within a gateway configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    /// Accepts transport connections; subject to admission control.
    Server,
    /// Initiates transport connections.
    Client,
    /// Translates between two other bindings.
    Proxy,
}

/// Listener options for a server-kind binding: one listening channel is
/// bound per port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerOptions {
    /// Host or address to bind.
    pub host: String,
    /// Ports to bind, one listener each.
    pub ports: Vec<u16>,
    /// Listen backlog.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}

/// One configured route: matched in order, first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Identity of the target binding.
    pub route_id: u64,
    /// Capability bits that must all be present in a stream's
    /// `authorization`; 0 = unguarded.
    #[serde(default)]
    pub authorized: u64,
    /// Composite api identifier resolved for this route.
    #[serde(default)]
    pub api_id: u64,
    /// Operation identifier resolved for this route.
    #[serde(default)]
    pub operation_id: String,
}

/// One configured binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Binding identity, unique within the configuration.
    pub id: u64,
    /// Role of the binding.
    pub kind: BindingKind,
    /// Type tag of the binding's protocol, written into rewritten Begin
    /// extensions.
    #[serde(default)]
    pub type_id: u32,
    /// Routes toward downstream bindings.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Listener options; required for server-kind bindings.
    #[serde(default)]
    pub options: Option<ServerOptions>,
}
