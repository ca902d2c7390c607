//! Response type for fieldlog

use bytes::Bytes;
use http::response::Parts;
use http_body_util::{BodyExt, Full};

/// HTTP Response type
pub type Response = http::Response<Full<Bytes>>;

/// Split a response into its head and its body bytes.
///
/// Status, size and content of what the handler produced become observable
/// here; rebuild with `http::Response::from_parts(parts, Full::new(bytes))`.
pub async fn buffer_body(response: Response) -> (Parts, Bytes) {
    let (parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };
    (parts, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffer_body_returns_head_and_bytes() {
        let response = http::Response::builder()
            .status(201)
            .header("x-test", "1")
            .body(Full::new(Bytes::from("created")))
            .unwrap();

        let (parts, bytes) = buffer_body(response).await;
        assert_eq!(parts.status, 201);
        assert_eq!(parts.headers["x-test"], "1");
        assert_eq!(bytes, Bytes::from("created"));
    }
}
