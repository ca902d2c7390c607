//! Logging layer behind a real HTTP server

use fieldlog::mask::{mask, FieldMasker};
use fieldlog::{LogConfig, LoggingLayer, MemorySink, RecoverLayer, RequestFields};
use fieldlog_core::{BoxFuture, BoxedNext, LayerStack, Request, RequestIdLayer, Server};
use http_body_util::Full;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Running {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for Running {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn spawn(layers: LayerStack, handler: BoxedNext) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(Server::new(layers, handler).serve_with_shutdown(listener, async {
        let _ = stopped.await;
    }));
    Running {
        addr,
        stop: Some(stop),
    }
}

fn echo_handler() -> BoxedNext {
    Arc::new(|req: Request| {
        Box::pin(async move {
            if req.uri().path() == "/panic" {
                panic!("handler exploded");
            }
            if let Some(fields) = req.extensions().get::<RequestFields>() {
                fields.insert("handled_by", "echo");
            }
            let body = req.body().clone();
            http::Response::builder()
                .status(201)
                .header("content-type", "application/json")
                .body(Full::new(body))
                .unwrap()
        }) as BoxFuture
    })
}

fn stack(sink: &MemorySink, config: LogConfig) -> LayerStack {
    let mut layers = LayerStack::new();
    layers.push(Box::new(RecoverLayer::new()));
    layers.push(Box::new(RequestIdLayer::new()));
    layers.push(Box::new(
        LoggingLayer::new(config)
            .sink(sink.clone())
            .masker(|_: &str, v: &str| mask(v, 1, 1, '*'))
            .request_mask(FieldMasker::new(["password"], |_: &str, v: &str| {
                mask(v, 0, 0, '*')
            }))
            .response_mask(FieldMasker::new(["password"], |_: &str, v: &str| {
                mask(v, 0, 0, '*')
            })),
    ));
    layers
}

#[tokio::test]
async fn separate_mode_over_http() {
    let sink = MemorySink::new();
    let config = LogConfig::builder()
        .separate(true)
        .request("request")
        .response("response")
        .extract("login", "credentials.user")
        .mask_field("login")
        .skip("/health")
        .build();
    let server = spawn(stack(&sink, config), echo_handler()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/api/login?src=web", server.addr))
        .header("x-request-id", "req-42")
        .header("user-agent", "it-test")
        .body(r#"{"credentials":{"user":"alice"},"password":"hunter2"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(resp.headers()["x-request-id"], "req-42");
    // The handler saw the original body, not the masked copy.
    let echoed: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(echoed["password"], "hunter2");

    let events = sink.events();
    assert_eq!(events.len(), 2);

    let request = &events[0];
    assert_eq!(request.message, "Request POST /api/login?src=web");
    assert_eq!(request.fields["request_id"], "req-42");
    assert_eq!(request.fields["user_agent"], "it-test");
    assert_eq!(request.fields["remote_ip"], "127.0.0.1");
    assert_eq!(request.fields["scheme"], "http");
    assert_eq!(request.fields["login"], "a***e");
    assert_eq!(
        request.fields["request"],
        json!({"credentials": {"user": "alice"}, "password": "*******"})
    );

    let response = &events[1];
    assert_eq!(response.message, "Response POST /api/login?src=web");
    assert_eq!(response.fields["status"], 201);
    assert_eq!(response.fields["handled_by"], "echo");
    assert_eq!(response.fields["login"], "a***e");
    assert_eq!(response.fields["response"]["password"], "*******");
    assert!(response.fields["size"].as_u64().unwrap() > 0);

    client
        .get(format!("http://{}/internal/health", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn get_is_single_event_over_http() {
    let sink = MemorySink::new();
    let config = LogConfig::builder().separate(true).response("response").build();
    let server = spawn(stack(&sink, config), echo_handler()).await;

    reqwest::Client::new()
        .get(format!("http://{}/items", server.addr))
        .send()
        .await
        .unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "GET /items");
    assert_eq!(events[0].fields["status"], 201);
    assert_eq!(events[0].fields["proto"], "HTTP/1.1");
    assert!(events[0].fields["request_id"].as_str().is_some());
}

#[tokio::test]
async fn panic_is_logged_and_recovered() {
    let sink = MemorySink::new();
    let server = spawn(stack(&sink, LogConfig::default()), echo_handler()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/panic", server.addr))
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    assert_eq!(
        resp.text().await.unwrap(),
        r#"{"error":"Internal Server Error"}"#
    );
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "POST /panic");
    assert_eq!(events[0].fields["status"], 500);
}
