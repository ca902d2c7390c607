//! Request id propagation
//!
//! Reuses the id a client or proxy sent in `x-request-id`, or generates a
//! UUID v4. The id is stored in the request extensions, where logging layers
//! further in pick it up, and echoed on the response.

use super::layer::{BoxFuture, BoxedNext, MiddlewareLayer};
use crate::request::Request;
use http::HeaderValue;

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id stored in the request extensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap an existing id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh UUID v4 id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Middleware that assigns a [`RequestId`] to every request
#[derive(Clone)]
pub struct RequestIdLayer {
    trust_incoming: bool,
}

impl RequestIdLayer {
    /// Create a layer that reuses incoming ids
    pub fn new() -> Self {
        Self {
            trust_incoming: true,
        }
    }

    /// Always generate a new id, ignoring `x-request-id` on the request
    pub fn always_generate() -> Self {
        Self {
            trust_incoming: false,
        }
    }
}

impl Default for RequestIdLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareLayer for RequestIdLayer {
    fn call(&self, mut req: Request, next: BoxedNext) -> BoxFuture {
        let incoming = if self.trust_incoming {
            req.headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(RequestId::new)
        } else {
            None
        };
        let id = incoming.unwrap_or_else(RequestId::generate);
        req.extensions_mut().insert(id.clone());

        Box::pin(async move {
            let mut response = next(req).await;
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            response
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}
