//! Route resolution at the adapter boundary.
//!
//! Route matching itself belongs to a collaborator; the core only consumes
//! the opaque outcome: given the `authorization` token of an arriving Begin,
//! either a resolved route or nothing. No route means the Begin is dropped
//! silently; the absence of a downstream stream is itself the signal.

use crate::config::RouteConfig;

/// Outcome of route resolution, consumed when an adapter attaches a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Identity of the binding the routed side targets.
    pub route_id: u64,
    /// Resolved composite api identifier, carried in the rewritten Begin
    /// extension.
    pub api_id: u64,
    /// Resolved operation identifier, carried alongside `api_id`.
    pub operation_id: String,
}

/// Resolves a route for an arriving stream, or none.
pub trait RouteResolver {
    /// Resolve against the `authorization` capability token.
    fn resolve(&self, authorization: u64) -> Option<ResolvedRoute>;
}

impl<F> RouteResolver for F
where
    F: Fn(u64) -> Option<ResolvedRoute>,
{
    fn resolve(&self, authorization: u64) -> Option<ResolvedRoute> {
        self(authorization)
    }
}

/// First-match resolver over configured routes: a route matches when its
/// required capability bits are all present in `authorization`.
#[derive(Debug, Clone, Default)]
pub struct TableResolver {
    routes: Vec<RouteConfig>,
}

impl TableResolver {
    /// Build a resolver from configured routes, first match wins.
    pub fn new(routes: Vec<RouteConfig>) -> Self {
        Self { routes }
    }
}

impl RouteResolver for TableResolver {
    fn resolve(&self, authorization: u64) -> Option<ResolvedRoute> {
        self.routes
            .iter()
            .find(|route| authorization & route.authorized == route.authorized)
            .map(|route| ResolvedRoute {
                route_id: route.route_id,
                api_id: route.api_id,
                operation_id: route.operation_id.clone(),
            })
    }
}
