//! Middleware infrastructure for fieldlog
//!
//! Layers wrap the application handler and run outermost first on the way
//! in, innermost first on the way out.
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldlog_core::{LayerStack, RequestIdLayer};
//!
//! let mut stack = LayerStack::new();
//! stack.push(Box::new(RequestIdLayer::new()));
//! let response = stack.execute(request, handler).await;
//! ```

mod layer;
mod request_id;

pub use layer::{BoxFuture, BoxedNext, LayerStack, MiddlewareLayer};
pub use request_id::{RequestId, RequestIdLayer, REQUEST_ID_HEADER};
