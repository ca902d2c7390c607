//! Layer chain used by every fieldlog middleware

use crate::request::Request;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a middleware or handler
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// A boxed next function for middleware chains
pub type BoxedNext = Arc<dyn Fn(Request) -> BoxFuture + Send + Sync>;

/// Trait for middleware that can wrap a handler
pub trait MiddlewareLayer: Send + Sync + 'static {
    /// Apply this middleware to a request, calling `next` to continue the chain
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture;

    /// Clone this middleware into a boxed trait object
    fn clone_box(&self) -> Box<dyn MiddlewareLayer>;
}

impl Clone for Box<dyn MiddlewareLayer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Ordered middleware around a final handler.
///
/// The first layer pushed sees the request first and the response last.
#[derive(Clone, Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn MiddlewareLayer>>,
}

impl LayerStack {
    /// An empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `layer` inside the layers already present
    pub fn push(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.push(layer);
    }

    /// Insert `layer` outside every layer already present
    pub fn prepend(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.insert(0, layer);
    }

    /// Whether no layer was added
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Run `req` through every layer and finally `handler`
    pub fn execute(&self, req: Request, handler: BoxedNext) -> BoxFuture {
        let chain = self
            .layers
            .iter()
            .rev()
            .fold(handler, |inner, layer| wrap(layer.clone_box(), inner));
        chain(req)
    }
}

fn wrap(layer: Box<dyn MiddlewareLayer>, inner: BoxedNext) -> BoxedNext {
    let layer: Arc<dyn MiddlewareLayer> = Arc::from(layer);
    Arc::new(move |req: Request| layer.call(req, inner.clone()))
}
