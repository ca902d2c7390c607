//! Error types for fieldlog

use http::StatusCode;

/// Error returned when a log record cannot be delivered to the sink.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The HTTP call itself failed (connect, timeout, body).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The sink answered 503.
    #[error("503 Service Unavailable")]
    ServiceUnavailable,

    /// The sink answered with another non-success status.
    #[error("sink returned status {0}")]
    Status(StatusCode),

    /// The record could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Every attempt of the backoff schedule failed.
    #[error("after {attempts} attempts, last error: {last}")]
    Exhausted {
        /// Total attempts made, the initial one included.
        attempts: usize,
        /// Error of the final attempt.
        last: Box<DeliveryError>,
    },

    /// The detached queue is full and the producer drops on overflow.
    #[error("delivery queue is full")]
    QueueFull,

    /// The producer was shut down.
    #[error("producer is closed")]
    Closed,

    /// Failure reported by a custom transport.
    #[error("{0}")]
    Other(String),
}

impl DeliveryError {
    /// Number of attempts behind this error (1 unless retries were exhausted).
    pub fn attempts(&self) -> usize {
        match self {
            DeliveryError::Exhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

/// Error raised while building a layer or producer from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variables could not be deserialized.
    #[error("configuration error: {0}")]
    Env(#[from] envy::Error),

    /// Detached delivery needs a running tokio runtime to spawn its workers.
    #[error("detached delivery requires a tokio runtime")]
    NoRuntime,

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
