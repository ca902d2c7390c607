//! Delivery with a fixed backoff schedule

use super::transport::Transport;
use crate::error::DeliveryError;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Ordered waits between delivery attempts.
///
/// The first attempt is unconditional; each entry allows one more attempt
/// after sleeping for it. An empty schedule means a single attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackoffSchedule(Vec<Duration>);

impl BackoffSchedule {
    /// Create a schedule from explicit waits
    pub fn new(delays: Vec<Duration>) -> Self {
        Self(delays)
    }

    /// A schedule that never retries
    pub fn none() -> Self {
        Self::default()
    }

    /// Create a schedule from waits in milliseconds
    pub fn from_millis(delays: &[u64]) -> Self {
        Self(delays.iter().map(|ms| Duration::from_millis(*ms)).collect())
    }

    /// Number of retries after the first attempt
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the schedule allows no retry
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Upper bound on attempts, the first one included
    pub fn max_attempts(&self) -> usize {
        self.0.len() + 1
    }

    /// Iterate over the waits in order
    pub fn iter(&self) -> impl Iterator<Item = &Duration> {
        self.0.iter()
    }
}

impl From<Vec<Duration>> for BackoffSchedule {
    fn from(delays: Vec<Duration>) -> Self {
        Self(delays)
    }
}

/// Delivery outcome reported to a [`DeliveryHook`]
#[derive(Debug)]
pub enum DeliveryEvent<'a> {
    /// A retry finished; `error` is `None` when it succeeded
    Retried {
        /// Retry number, starting at 1
        retry: usize,
        /// Failure of this retry, if any
        error: Option<&'a DeliveryError>,
    },
    /// Every attempt failed
    Exhausted {
        /// Attempts made, the first one included
        attempts: usize,
        /// The aggregated error
        error: &'a DeliveryError,
    },
    /// The only attempt of a detached delivery failed
    Failed {
        /// The failure
        error: &'a DeliveryError,
    },
    /// A detached record was rejected because the queue was full
    Dropped,
}

/// Callback observing delivery outcomes together with the payload concerned
pub type DeliveryHook = Arc<dyn Fn(&DeliveryEvent<'_>, &[u8]) + Send + Sync>;

/// Wrap a closure into a [`DeliveryHook`]
pub fn delivery_hook<F>(f: F) -> DeliveryHook
where
    F: Fn(&DeliveryEvent<'_>, &[u8]) + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn report(hook: Option<&DeliveryHook>, event: DeliveryEvent<'_>, payload: &[u8]) {
    match hook {
        Some(hook) => hook(&event, payload),
        None => tracing::debug!(event = ?event, "log delivery event"),
    }
}

/// Send `payload` through `transport`, retrying per `schedule`.
///
/// Each retry outcome and a final exhaustion are reported to `hook`. With an
/// empty schedule the single attempt's error is returned as is; otherwise
/// exhaustion yields [`DeliveryError::Exhausted`] carrying the total number
/// of attempts and the last error.
pub async fn deliver_with_retry(
    transport: &dyn Transport,
    payload: Bytes,
    attributes: Option<&HashMap<String, String>>,
    schedule: &BackoffSchedule,
    hook: Option<&DeliveryHook>,
) -> Result<String, DeliveryError> {
    let mut last = match transport.post(payload.clone(), attributes).await {
        Ok(ack) => return Ok(ack),
        Err(err) => err,
    };
    if schedule.is_empty() {
        return Err(last);
    }

    for (index, delay) in schedule.iter().enumerate() {
        let retry = index + 1;
        let backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(retry, backoff_ms, "Waiting before log delivery retry");
        tokio::time::sleep(*delay).await;

        match transport.post(payload.clone(), attributes).await {
            Ok(ack) => {
                tracing::info!(retry, "Log delivered after retry");
                report(hook, DeliveryEvent::Retried { retry, error: None }, &payload);
                return Ok(ack);
            }
            Err(err) => {
                tracing::warn!(retry, max_retries = schedule.len(), error = %err, "Log delivery retry failed");
                report(
                    hook,
                    DeliveryEvent::Retried {
                        retry,
                        error: Some(&err),
                    },
                    &payload,
                );
                last = err;
            }
        }
    }

    let attempts = schedule.max_attempts();
    let error = DeliveryError::Exhausted {
        attempts,
        last: Box::new(last),
    };
    report(
        hook,
        DeliveryEvent::Exhausted {
            attempts,
            error: &error,
        },
        &payload,
    );
    Err(error)
}
