//! Request type for fieldlog

use bytes::Bytes;
use http::{request::Parts, Extensions, HeaderMap, Method, Uri, Version};

/// HTTP Request wrapper
///
/// Holds the request head, the fully buffered body and the connection facts
/// (peer address, TLS) the logging layer reports on. The body is kept as
/// [`Bytes`], so reading it never consumes it: a layer that inspects the body
/// leaves the same bytes for the handler behind it.
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) body: Bytes,
    pub(crate) remote_addr: String,
    pub(crate) tls: bool,
}

impl Request {
    /// Create a new request from parts
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self {
            parts,
            body,
            remote_addr: String::new(),
            tls: false,
        }
    }

    /// Build a request from an `http::Request` head and a body
    pub fn from_http_request(req: http::Request<()>, body: Bytes) -> Self {
        let (parts, _) = req.into_parts();
        Self::new(parts, body)
    }

    /// Set the peer address, as reported by the connection (`host:port`)
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    /// Mark the request as received over a TLS-terminated connection
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Get the HTTP method
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Get the URI
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Path plus query, as sent in the request line
    pub fn request_uri(&self) -> &str {
        self.parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.parts.uri.path())
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.parts.version
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Get request extensions
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Get mutable extensions
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Get the body bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replace the body bytes
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Peer address (`host:port`), empty when unknown
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// Whether the connection was TLS-terminated
    pub fn is_tls(&self) -> bool {
        self.tls
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("version", &self.parts.version)
            .field("remote_addr", &self.remote_addr)
            .field("tls", &self.tls)
            .finish()
    }
}
