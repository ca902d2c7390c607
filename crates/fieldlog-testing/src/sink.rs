use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Notify};

type GenericError = Box<dyn std::error::Error + Send + Sync>;

/// A mock log collector.
///
/// Records every request it receives and answers with a scripted sequence of
/// statuses, then with the default status (`200 OK`) once the script runs
/// out. Stops when dropped.
pub struct MockSink {
    addr: SocketAddr,
    state: Arc<Mutex<SinkState>>,
    notify: Arc<Notify>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

struct SinkState {
    script: VecDeque<StatusCode>,
    default_status: StatusCode,
    ack: Bytes,
    requests: Vec<RecordedRequest>,
}

/// A request received by [`MockSink`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method
    pub method: http::Method,
    /// Request path
    pub path: String,
    /// Request headers
    pub headers: http::HeaderMap,
    /// Request body
    pub body: Bytes,
    /// Status the sink answered with
    pub status: StatusCode,
}

impl RecordedRequest {
    /// Decode the body as JSON
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    /// Value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl MockSink {
    /// Start a collector on a random local port
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(Mutex::new(SinkState {
            script: VecDeque::new(),
            default_status: StatusCode::OK,
            ack: Bytes::from_static(b"ok"),
            requests: Vec::new(),
        }));
        let notify = Arc::new(Notify::new());

        let state_clone = state.clone();
        let notify_clone = notify.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut stop_future = shutdown_rx;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let state = state_clone.clone();
                                let notify = notify_clone.clone();

                                tokio::spawn(async move {
                                    let service = service_fn(move |req| {
                                        handle_request(req, state.clone(), notify.clone())
                                    });
                                    if let Err(err) = hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        tracing::debug!(error = ?err, "mock sink connection error");
                                    }
                                });
                            }
                            Err(e) => tracing::debug!(error = %e, "mock sink accept error"),
                        }
                    }
                    _ = &mut stop_future => {
                        break;
                    }
                }
            }
        });

        Ok(Self {
            addr,
            state,
            notify,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Base URL of the collector
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of `path` on the collector
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Answer the next requests with `statuses`, in order
    pub fn respond_with_sequence(&self, statuses: impl IntoIterator<Item = StatusCode>) -> &Self {
        self.lock().script.extend(statuses);
        self
    }

    /// Answer the next `times` requests with `status`
    pub fn fail_times(&self, times: usize, status: StatusCode) -> &Self {
        self.respond_with_sequence(std::iter::repeat(status).take(times))
    }

    /// Status used once the script is exhausted
    pub fn default_status(&self, status: StatusCode) -> &Self {
        self.lock().default_status = status;
        self
    }

    /// Body returned with successful answers
    pub fn ack(&self, body: impl Into<Bytes>) -> &Self {
        self.lock().ack = body.into();
        self
    }

    /// All requests received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests received so far
    pub fn received(&self) -> usize {
        self.lock().requests.len()
    }

    /// Bodies of the successfully answered requests, decoded as JSON
    pub fn accepted_json(&self) -> Vec<serde_json::Value> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.status.is_success())
            .filter_map(|r| r.json().ok())
            .collect()
    }

    /// Wait until at least `count` requests arrived, or `timeout` elapsed.
    ///
    /// Returns whether the count was reached.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if self.received() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Assert that exactly `count` requests were received
    pub fn verify_received(&self, count: usize) {
        let received = self.received();
        assert_eq!(
            received, count,
            "MockSink expected {} requests, got {}",
            count, received
        );
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<Mutex<SinkState>>,
    notify: Arc<Notify>,
) -> Result<Response<Full<Bytes>>, GenericError> {
    let (parts, body) = req.into_parts();
    let body_bytes = body.collect().await?.to_bytes();

    let (status, ack) = {
        let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
        let status = state.script.pop_front().unwrap_or(state.default_status);
        state.requests.push(RecordedRequest {
            method: parts.method,
            path: parts.uri.path().to_string(),
            headers: parts.headers,
            body: body_bytes,
            status,
        });
        let ack = if status.is_success() {
            state.ack.clone()
        } else {
            Bytes::from(status.to_string())
        };
        (status, ack)
    };
    notify.notify_waiters();

    Ok(Response::builder().status(status).body(Full::new(ack))?)
}
