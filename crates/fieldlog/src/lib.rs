//! # fieldlog
//!
//! HTTP request/response logging middleware with JSON field extraction,
//! field-level masking, and retrying delivery to an external log sink.
//!
//! ## Overview
//!
//! - [`LoggingLayer`] logs each request either as one combined event or as a
//!   request event followed by a response event, skipping URIs by suffix.
//! - [`extract`] pulls fields out of JSON request bodies by dotted path
//!   (`"user.profile.email"`) into a request-scoped [`RequestFields`] bag.
//! - [`mask`] hides sensitive values, either single strings or whole bodies
//!   by field name.
//! - [`producer`] ships finished records to an HTTP endpoint with a backoff
//!   schedule, inline or from a bounded pool of background workers.
//! - [`RecoverLayer`] turns panics into a generic `500` response.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fieldlog::{LogConfig, LoggingLayer, RecoverLayer};
//! use fieldlog::mask::{mask, FieldMasker};
//! use fieldlog_core::{BoxFuture, BoxedNext, LayerStack, Request, RequestIdLayer, Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = LogConfig::builder()
//!         .separate(true)
//!         .request("request")
//!         .skip("/health")
//!         .build();
//!
//!     let mut layers = LayerStack::new();
//!     layers.push(Box::new(RecoverLayer::new()));
//!     layers.push(Box::new(RequestIdLayer::new()));
//!     layers.push(Box::new(
//!         LoggingLayer::new(config)
//!             .request_mask(FieldMasker::new(["password"], |_: &str, v: &str| mask(v, 0, 0, '*'))),
//!     ));
//!
//!     let handler: BoxedNext = Arc::new(|_req: Request| {
//!         Box::pin(async { http::Response::new(http_body_util::Full::new(bytes::Bytes::from("ok"))) })
//!             as BoxFuture
//!     });
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     Server::new(layers, handler).serve(listener).await
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Configuration
pub mod config;

// Error types
pub mod error;

// Dotted-path extraction
pub mod extract;

// Field bags
pub mod fields;

// Masking primitives and body masking
pub mod mask;

// Log sinks
pub mod sink;

// Logging middleware
pub mod layer;

// Delivery to external sinks
pub mod producer;

// Panic recovery middleware
pub mod recover;

pub use config::{FieldSpec, KeyMap, LogConfig, LogConfigBuilder, MaskSet, Overflow, ProducerConfig};
pub use error::{ConfigError, DeliveryError};
pub use extract::{extract_fields, value_of, Masker};
pub use fields::{build_fields, Fields, RequestFields};
pub use layer::LoggingLayer;
pub use mask::{mask_body_value, BodyMasker, FieldMasker};
pub use producer::{LogRecord, Producer};
pub use recover::RecoverLayer;
pub use sink::{LogEvent, LogSink, MemorySink, TracingSink};
