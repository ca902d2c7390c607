//! # fieldlog-core
//!
//! HTTP plumbing shared by the fieldlog crates.
//!
//! This crate is not meant to be used directly for logging. It provides the
//! request and response types, the middleware chain that `fieldlog`'s layers
//! plug into, request id propagation, and a small hyper server that drives a
//! [`LayerStack`].

pub mod middleware;
mod request;
mod response;
mod server;

// Public API
pub use middleware::{BoxFuture, BoxedNext, LayerStack, MiddlewareLayer, RequestId, RequestIdLayer};
pub use request::Request;
pub use response::{buffer_body, Response};
pub use server::Server;
