//! Asynchronous delivery of log records to an external sink
//!
//! A [`Producer`] serializes [`LogRecord`]s and posts them through a
//! [`Transport`], retrying per its [`BackoffSchedule`]. It runs in one of two
//! modes:
//!
//! - **inline**: `deliver` awaits the whole retry loop and returns its result
//! - **detached**: `deliver` only enqueues onto a bounded queue drained by a
//!   fixed pool of worker tasks, so sink latency never reaches the caller
//!
//! # Example
//!
//! ```rust,no_run
//! use fieldlog::producer::{LogRecord, Producer};
//! use fieldlog::{Fields, ProducerConfig};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProducerConfig::new("http://localhost:9000/logs")
//!     .retries([Duration::from_millis(200), Duration::from_secs(1)])
//!     .detached(true);
//! let producer = Producer::builder(config).build()?;
//!
//! producer.deliver(&LogRecord::new("GET /", Fields::new())).await?;
//! producer.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod record;
mod retry;
mod transport;

pub use record::LogRecord;
pub use retry::{delivery_hook, deliver_with_retry, BackoffSchedule, DeliveryEvent, DeliveryHook};
pub use transport::{HttpTransport, Transport};

use crate::config::{KeyMap, Overflow, ProducerConfig};
use crate::error::{ConfigError, DeliveryError};
use bytes::Bytes;
use retry::report;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Job {
    payload: Bytes,
    attributes: Option<HashMap<String, String>>,
}

struct Delivery {
    transport: Arc<dyn Transport>,
    schedule: BackoffSchedule,
    hook: Option<DeliveryHook>,
}

impl Delivery {
    async fn run_detached(&self, job: Job) {
        let result = deliver_with_retry(
            self.transport.as_ref(),
            job.payload.clone(),
            job.attributes.as_ref(),
            &self.schedule,
            self.hook.as_ref(),
        )
        .await;

        // Exhaustion was already reported by the retry loop.
        if let Err(error) = result {
            if self.schedule.is_empty() {
                report(self.hook.as_ref(), DeliveryEvent::Failed { error: &error }, &job.payload);
            }
        }
    }
}

struct Queue {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    overflow: Overflow,
}

struct Inner {
    delivery: Arc<Delivery>,
    keys: KeyMap,
    queue: Option<Queue>,
}

/// Ships log records to an external sink.
///
/// Cheap to clone; clones share the transport and, in detached mode, the
/// queue and its workers.
#[derive(Clone)]
pub struct Producer {
    inner: Arc<Inner>,
}

impl Producer {
    /// Start building a producer from `config`
    pub fn builder(config: ProducerConfig) -> ProducerBuilder {
        ProducerBuilder {
            config,
            transport: None,
            keys: KeyMap::default(),
            hook: None,
        }
    }

    /// Whether records are delivered by background workers
    pub fn is_detached(&self) -> bool {
        self.inner.queue.is_some()
    }

    /// Key names used for level, time and message
    pub fn keys(&self) -> &KeyMap {
        &self.inner.keys
    }

    /// Serialize `record` and deliver it.
    ///
    /// Inline mode returns the sink's acknowledgement or the delivery error.
    /// Detached mode returns an empty acknowledgement once the record is
    /// queued; outcomes then only reach the delivery hook.
    pub async fn deliver(&self, record: &LogRecord) -> Result<String, DeliveryError> {
        let payload = record.to_payload(&self.inner.keys, chrono::Utc::now())?;
        self.produce(Bytes::from(payload), None).await
    }

    /// Deliver an already serialized payload with optional attributes
    pub async fn produce(
        &self,
        payload: Bytes,
        attributes: Option<HashMap<String, String>>,
    ) -> Result<String, DeliveryError> {
        let Some(queue) = &self.inner.queue else {
            let delivery = &self.inner.delivery;
            return deliver_with_retry(
                delivery.transport.as_ref(),
                payload,
                attributes.as_ref(),
                &delivery.schedule,
                delivery.hook.as_ref(),
            )
            .await;
        };

        let sender = {
            let guard = queue.sender.lock().unwrap_or_else(|p| p.into_inner());
            guard.clone().ok_or(DeliveryError::Closed)?
        };
        let job = Job {
            payload,
            attributes,
        };

        match queue.overflow {
            Overflow::Block => sender.send(job).await.map_err(|_| DeliveryError::Closed)?,
            Overflow::Drop => match sender.try_send(job) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(job)) => {
                    tracing::warn!("Log delivery queue full, dropping record");
                    report(
                        self.inner.delivery.hook.as_ref(),
                        DeliveryEvent::Dropped,
                        &job.payload,
                    );
                    return Err(DeliveryError::QueueFull);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(DeliveryError::Closed),
            },
        }
        Ok(String::new())
    }

    /// Stop accepting records and wait for queued ones to be delivered.
    ///
    /// A no-op in inline mode. Later calls to `deliver` fail with
    /// [`DeliveryError::Closed`].
    pub async fn shutdown(&self) {
        let Some(queue) = &self.inner.queue else {
            return;
        };
        queue.sender.lock().unwrap_or_else(|p| p.into_inner()).take();
        let workers = std::mem::take(&mut *queue.workers.lock().unwrap_or_else(|p| p.into_inner()));
        for worker in workers {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "Log delivery worker failed");
            }
        }
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("detached", &self.is_detached())
            .field("schedule", &self.inner.delivery.schedule)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Producer`]
pub struct ProducerBuilder {
    config: ProducerConfig,
    transport: Option<Arc<dyn Transport>>,
    keys: KeyMap,
    hook: Option<DeliveryHook>,
}

impl ProducerBuilder {
    /// Use a custom transport instead of HTTP to `config.url`
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use these key names for level, time and message
    pub fn keys(mut self, keys: KeyMap) -> Self {
        self.keys = keys;
        self
    }

    /// Observe retries, exhaustion, failures and drops
    pub fn on_event<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeliveryEvent<'_>, &[u8]) + Send + Sync + 'static,
    {
        self.hook = Some(delivery_hook(hook));
        self
    }

    /// Build the producer.
    ///
    /// Detached mode spawns its workers on the current tokio runtime and
    /// fails with [`ConfigError::NoRuntime`] outside one.
    pub fn build(self) -> Result<Producer, ConfigError> {
        self.config.validate()?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_config(&self.config)?),
        };
        let delivery = Arc::new(Delivery {
            transport,
            schedule: BackoffSchedule::new(self.config.schedule()),
            hook: self.hook,
        });

        let queue = if self.config.detached {
            let handle = tokio::runtime::Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
            let (sender, receiver) = mpsc::channel::<Job>(self.config.queue_capacity);
            let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

            let workers = (0..self.config.workers)
                .map(|worker| {
                    let receiver = receiver.clone();
                    let delivery = delivery.clone();
                    handle.spawn(async move {
                        loop {
                            let job = receiver.lock().await.recv().await;
                            let Some(job) = job else { break };
                            delivery.run_detached(job).await;
                        }
                        tracing::debug!(worker, "Log delivery worker stopped");
                    })
                })
                .collect();

            tracing::debug!(
                workers = self.config.workers,
                capacity = self.config.queue_capacity,
                "Started log delivery workers"
            );
            Some(Queue {
                sender: Mutex::new(Some(sender)),
                workers: Mutex::new(workers),
                overflow: self.config.overflow,
            })
        } else {
            None
        };

        Ok(Producer {
            inner: Arc::new(Inner {
                delivery,
                keys: self.keys,
                queue,
            }),
        })
    }
}
