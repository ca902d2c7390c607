//! Request/response logging middleware
//!
//! [`LoggingLayer`] wraps the rest of the chain and emits either one
//! combined event per request or a request event followed by a response
//! event:
//!
//! | method        | `separate` | events                                   |
//! |---------------|------------|------------------------------------------|
//! | GET, DELETE   | any        | `"GET /uri"` after the handler           |
//! | other         | `false`    | `"POST /uri"` after the handler          |
//! | other         | `true`     | `"Request POST /uri"` before, `"Response POST /uri"` after |
//!
//! Requests whose URI ends with a configured skip suffix, or arriving while
//! logging is disabled, pass through untouched.
//!
//! # Example
//!
//! ```ignore
//! use fieldlog::{LogConfig, LoggingLayer};
//! use fieldlog::mask::{mask, FieldMasker};
//!
//! let config = LogConfig::builder()
//!     .separate(true)
//!     .request("request")
//!     .response("response")
//!     .extract("username", "user.name")
//!     .mask_field("username")
//!     .build();
//!
//! let layer = LoggingLayer::new(config)
//!     .masker(|_: &str, v: &str| mask(v, 1, 1, '*'))
//!     .request_mask(FieldMasker::new(["password"], |_: &str, v: &str| mask(v, 0, 0, '*')));
//! ```

use crate::config::LogConfig;
use crate::extract::{extract_fields, Masker};
use crate::fields::{build_fields, Fields, RequestFields};
use crate::mask::{mask_body_value, BodyMasker};
use crate::producer::{LogRecord, Producer};
use crate::sink::{LogSink, TracingSink};
use bytes::Bytes;
use chrono::Utc;
use fieldlog_core::{buffer_body, BoxFuture, BoxedNext, MiddlewareLayer, Request};
use futures_util::FutureExt;
use http::Method;
use http_body_util::Full;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use std::time::Instant;

/// Middleware that logs requests and responses with extracted and masked
/// fields.
#[derive(Clone)]
pub struct LoggingLayer {
    config: Arc<LogConfig>,
    sink: Option<Arc<dyn LogSink>>,
    producer: Option<Producer>,
    masker: Option<Arc<dyn Masker>>,
    request_mask: Option<Arc<dyn BodyMasker>>,
    response_mask: Option<Arc<dyn BodyMasker>>,
    checked: Arc<Once>,
}

impl LoggingLayer {
    /// Create a layer logging through [`TracingSink`]
    pub fn new(config: LogConfig) -> Self {
        Self {
            config: Arc::new(config),
            sink: Some(Arc::new(TracingSink::new())),
            producer: None,
            masker: None,
            request_mask: None,
            response_mask: None,
            checked: Arc::new(Once::new()),
        }
    }

    /// Log through `sink` instead
    pub fn sink(mut self, sink: impl LogSink) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Emit no local events; only the producer receives records
    pub fn without_sink(mut self) -> Self {
        self.sink = None;
        self
    }

    /// Also ship every event through `producer`.
    ///
    /// Payloads use the level, time and message key names of this layer's
    /// [`LogConfig`].
    pub fn producer(mut self, producer: Producer) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Mask extracted fields listed in `masks`
    pub fn masker(mut self, masker: impl Masker + 'static) -> Self {
        self.masker = Some(Arc::new(masker));
        self
    }

    /// Mask the logged request body
    pub fn request_mask(mut self, masker: impl BodyMasker + 'static) -> Self {
        self.request_mask = Some(Arc::new(masker));
        self
    }

    /// Mask the logged response body
    pub fn response_mask(mut self, masker: impl BodyMasker + 'static) -> Self {
        self.response_mask = Some(Arc::new(masker));
        self
    }

    /// The configuration in use
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    fn is_active(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        match &self.sink {
            Some(sink) => sink.enabled(),
            None => self.producer.is_some(),
        }
    }

    fn warn_misconfiguration(&self) {
        if !self.config.masks.is_empty() && self.masker.is_none() {
            tracing::warn!(
                fields = ?self.config.masks,
                "Mask fields are configured without a masker; they will be logged unmasked"
            );
        }
    }

    async fn emit(&self, message: String, fields: Fields) {
        if let Some(sink) = &self.sink {
            sink.log(&message, &fields);
        }
        if let Some(producer) = &self.producer {
            let record = LogRecord::new(message, fields);
            let payload = match record.to_payload(&self.config.key_map(), Utc::now()) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::error!(error = %err, message = %record.message, "Failed to serialize log record");
                    return;
                }
            };
            if let Err(err) = producer.produce(Bytes::from(payload), None).await {
                tracing::warn!(error = %err, message = %record.message, "Failed to deliver log record");
            }
        }
    }
}

impl std::fmt::Debug for LoggingLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingLayer")
            .field("config", &self.config)
            .field("producer", &self.producer)
            .finish_non_exhaustive()
    }
}

impl MiddlewareLayer for LoggingLayer {
    fn call(&self, mut req: Request, next: BoxedNext) -> BoxFuture {
        self.checked.call_once(|| self.warn_misconfiguration());

        let uri = req.request_uri().to_string();
        if !self.is_active() || self.config.skips_uri(&uri) {
            return next(req);
        }

        let start = Instant::now();
        let layer = self.clone();
        let config = self.config.clone();
        let method = req.method().clone();
        let read_only = method == Method::GET || method == Method::DELETE;
        let single = !config.separate || read_only;

        let accumulator = match req.extensions().get::<RequestFields>() {
            Some(existing) => existing.clone(),
            None => {
                let fresh = RequestFields::new();
                req.extensions_mut().insert(fresh.clone());
                fresh
            }
        };
        if !config.map.is_empty() {
            if let Ok(body) = serde_json::from_slice::<Value>(req.body()) {
                accumulator.extend(extract_fields(
                    &body,
                    &config.map,
                    &config.masks,
                    self.masker.as_deref(),
                ));
            }
        }

        let base = build_fields(&config, &req);
        let mut request_fields = base.clone();
        request_fields.extend(accumulator.snapshot());
        if !read_only && !config.request.is_empty() {
            let raw = String::from_utf8_lossy(req.body());
            request_fields.insert(
                config.request.clone(),
                mask_body_value(&raw, self.request_mask.as_deref(), config.string_format),
            );
        }

        Box::pin(async move {
            if !single {
                layer
                    .emit(format!("Request {} {}", method, uri), request_fields.clone())
                    .await;
            }

            let outcome = AssertUnwindSafe(next(req)).catch_unwind().await;

            let mut fields = if single {
                let mut fields = request_fields;
                fields.extend(accumulator.snapshot());
                fields
            } else {
                // The request moved into the handler; its head is unchanged, so
                // `base` is the rebuilt bag and the accumulator supplies the rest.
                let mut fields = base;
                fields.extend(accumulator.snapshot());
                fields
            };
            let message = if single {
                format!("{} {}", method, uri)
            } else {
                format!("Response {} {}", method, uri)
            };

            match outcome {
                Ok(response) => {
                    let (parts, body) = buffer_body(response).await;
                    if !config.response.is_empty() {
                        let raw = String::from_utf8_lossy(&body);
                        fields.insert(
                            config.response.clone(),
                            mask_body_value(&raw, layer.response_mask.as_deref(), config.string_format),
                        );
                    }
                    response_fields(&config, &mut fields, parts.status.as_u16(), body.len(), start);
                    layer.emit(message, fields).await;
                    http::Response::from_parts(parts, Full::new(body))
                }
                Err(panic) => {
                    response_fields(&config, &mut fields, 500, 0, start);
                    layer.emit(message, fields).await;
                    std::panic::resume_unwind(panic)
                }
            }
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}

fn response_fields(config: &LogConfig, fields: &mut Fields, status: u16, size: usize, start: Instant) {
    if !config.status.is_empty() {
        fields.insert(config.status.clone(), Value::from(status));
    }
    if !config.duration.is_empty() {
        let millis = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        fields.insert(config.duration.clone(), Value::from(millis));
    }
    if !config.size.is_empty() {
        fields.insert(config.size.clone(), Value::from(size));
    }
}
