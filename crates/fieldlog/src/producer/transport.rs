//! Outbound delivery of serialized records

use crate::config::ProducerConfig;
use crate::error::{ConfigError, DeliveryError};
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use std::collections::HashMap;
use std::time::Duration;

/// Delivers one serialized record to the log sink.
///
/// Returns the sink's acknowledgement on success. Implement this to ship
/// records somewhere other than an HTTP endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send `payload`, with optional `attributes` as metadata
    async fn post(
        &self,
        payload: Bytes,
        attributes: Option<&HashMap<String, String>>,
    ) -> Result<String, DeliveryError>;
}

/// Transport that POSTs JSON records to a URL.
///
/// Attributes become request headers. A 503 answer is reported as
/// [`DeliveryError::ServiceUnavailable`] and any other non-success status
/// as [`DeliveryError::Status`]; the acknowledgement is the response body.
///
/// # Example
///
/// ```ignore
/// use fieldlog::producer::HttpTransport;
///
/// let transport = HttpTransport::new("https://logs.example.com/ingest");
/// ```
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    /// Create a transport with a default client
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Create a transport using an existing client
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Create a transport from the URL and timeout in `config`
    pub fn from_config(config: &ProducerConfig) -> Result<Self, ConfigError> {
        if config.url.is_empty() {
            return Err(ConfigError::Invalid("producer url is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client: {e}")))?;
        Ok(Self::with_client(client, config.url.clone()))
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        payload: Bytes,
        attributes: Option<&HashMap<String, String>>,
    ) -> Result<String, DeliveryError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(payload);

        if let Some(attributes) = attributes {
            for (name, value) in attributes {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(DeliveryError::ServiceUnavailable);
        }
        if !status.is_success() {
            return Err(DeliveryError::Status(status));
        }
        Ok(response.text().await?)
    }
}
