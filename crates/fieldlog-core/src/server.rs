//! HTTP server driving a [`LayerStack`]

use crate::middleware::{BoxedNext, LayerStack};
use crate::request::Request;
use crate::response::Response;
use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Minimal HTTP/1.1 server.
///
/// Each accepted connection is served on its own task. Request bodies are
/// collected before the stack runs, and the peer address is recorded on the
/// [`Request`].
#[derive(Clone)]
pub struct Server {
    layers: Arc<LayerStack>,
    handler: BoxedNext,
}

impl Server {
    /// Create a server that runs `layers` around `handler`
    pub fn new(layers: LayerStack, handler: BoxedNext) -> Self {
        Self {
            layers: Arc::new(layers),
            handler,
        }
    }

    /// Serve connections from `listener` until an accept error occurs
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serve connections until `signal` resolves
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        if let Ok(addr) = listener.local_addr() {
            info!("fieldlog server listening on http://{}", addr);
        }
        tokio::pin!(signal);

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut signal => {
                    debug!("shutdown signal received");
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let layers = self.layers.clone();
            let handler = self.handler.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<Incoming>| {
                    let layers = layers.clone();
                    let handler = handler.clone();
                    async move {
                        let response = handle_request(layers, handler, req, remote_addr).await;
                        Ok::<_, Infallible>(response)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Connection error: {}", err);
                }
            });
        }
    }
}

async fn handle_request(
    layers: Arc<LayerStack>,
    handler: BoxedNext,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Response {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            error!(error = %err, "failed to read request body");
            let mut response = http::Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return response;
        }
    };

    let request = Request::new(parts, body).with_remote_addr(remote_addr.to_string());
    layers.execute(request, handler).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::BoxFuture;

    #[tokio::test]
    async fn serves_handler_with_peer_address_and_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler: BoxedNext = Arc::new(|req: Request| {
            Box::pin(async move {
                let text = format!(
                    "{} {} {}",
                    req.method(),
                    req.remote_addr().starts_with("127.0.0.1:"),
                    String::from_utf8_lossy(req.body())
                );
                http::Response::new(Full::new(Bytes::from(text)))
            }) as BoxFuture
        });

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = Server::new(LayerStack::new(), handler);
        let task = tokio::spawn(server.serve_with_shutdown(listener, async {
            let _ = rx.await;
        }));

        let text = reqwest::Client::new()
            .post(format!("http://{}/echo", addr))
            .body("hello")
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(text, "POST true hello");

        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
    }
}
