//! Panic recovery middleware
//!
//! Turns a panic anywhere further down the chain into a generic `500` JSON
//! response and a single ERROR event carrying the request's fields.

use crate::fields::RequestFields;
use crate::sink::LOG_TARGET;
use bytes::Bytes;
use fieldlog_core::{BoxFuture, BoxedNext, MiddlewareLayer, Request, Response};
use futures_util::FutureExt;
use http::{header, StatusCode};
use http_body_util::Full;
use std::any::Any;
use std::panic::AssertUnwindSafe;

const INTERNAL_ERROR_BODY: &str = r#"{"error":"Internal Server Error"}"#;

/// Middleware converting panics into `500 Internal Server Error`.
///
/// Place it outside [`LoggingLayer`](crate::LoggingLayer) so the logging
/// layer records the failed request before the panic reaches this layer.
#[derive(Clone, Debug, Default)]
pub struct RecoverLayer;

impl RecoverLayer {
    /// Create a recovery layer
    pub fn new() -> Self {
        Self
    }
}

impl MiddlewareLayer for RecoverLayer {
    fn call(&self, mut req: Request, next: BoxedNext) -> BoxFuture {
        let fields = match req.extensions().get::<RequestFields>() {
            Some(existing) => existing.clone(),
            None => {
                let fresh = RequestFields::new();
                req.extensions_mut().insert(fresh.clone());
                fresh
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(next(req)).catch_unwind().await {
                Ok(response) => response,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    let rendered = serde_json::to_string(&fields.snapshot()).unwrap_or_default();
                    tracing::error!(target: LOG_TARGET, fields = %rendered, "{}", message);
                    internal_error()
                }
            }
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn internal_error() -> Response {
    let mut response = http::Response::new(Full::new(Bytes::from_static(INTERNAL_ERROR_BODY.as_bytes())));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
    response
}
