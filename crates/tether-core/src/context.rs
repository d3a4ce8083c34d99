//! Per-request context types.
//!
//! A [`RequestContext`] is created by the server for every inbound upgrade
//! request and travels through the middleware chain, the handler builder and
//! the connection engine. The [`RequestHead`] is the read-only view of the
//! request that middleware receives before the protocol switch.

use std::net::SocketAddr;
use std::time::Instant;

use http::{HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cancel::CancelScope;

/// A unique identifier for each inbound request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes request IDs sortable in logs and
/// cheap to correlate across the read and write loops of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context created per inbound request and owned by the connection for its
/// whole lifetime.
///
/// The context is deliberately small and cheaply cloneable: the connection
/// engine hands one clone to each of the two loops.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request / connection.
    request_id: RequestId,

    /// The matched route path (e.g. `/ws`).
    path: String,

    /// Peer address, when known.
    remote_addr: Option<SocketAddr>,

    /// Cancellation scope the request lives under. The server installs its
    /// shutdown scope here so explicit shutdown reaches every connection.
    scope: CancelScope,

    /// When the request started processing.
    started_at: Instant,
}

impl RequestContext {
    /// Creates a new context for a request on `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            path: path.into(),
            remote_addr: None,
            scope: CancelScope::new(),
            started_at: Instant::now(),
        }
    }

    /// Attaches the peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Attaches the cancellation scope this request lives under.
    #[must_use]
    pub fn with_scope(mut self, scope: CancelScope) -> Self {
        self.scope = scope;
        self
    }

    /// Creates a context for testing purposes.
    #[must_use]
    pub fn mock() -> Self {
        Self::new("/test")
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the matched route path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the peer address, if known.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Returns the cancellation scope this request lives under.
    #[must_use]
    pub fn scope(&self) -> &CancelScope {
        &self.scope
    }

    /// Returns how long this request has been alive.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

/// Read-only view of an upgrade request, handed to pre-upgrade middleware.
///
/// Middleware runs strictly before the protocol switch and must not consume
/// the request body, so it only ever sees this head.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestHead {
    /// Captures the head of an HTTP request.
    pub fn of<B>(request: &http::Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        }
    }

    /// Builds a head from raw parts. Mostly useful in tests.
    #[must_use]
    pub fn from_parts(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the URI path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns all request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn request_id_display_matches_uuid() {
        let uuid = Uuid::now_v7();
        let id = RequestId::from_uuid(uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn context_carries_path_and_addr() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let ctx = RequestContext::new("/ws").with_remote_addr(addr);
        assert_eq!(ctx.path(), "/ws");
        assert_eq!(ctx.remote_addr(), Some(addr));
    }

    #[test]
    fn head_exposes_headers() {
        let request = http::Request::builder()
            .method(Method::GET)
            .uri("/ws?room=1")
            .header("x-client", "tests")
            .body(())
            .unwrap();
        let head = RequestHead::of(&request);
        assert_eq!(head.method(), Method::GET);
        assert_eq!(head.path(), "/ws");
        assert_eq!(head.header("x-client"), Some("tests"));
        assert_eq!(head.header("missing"), None);
    }
}
