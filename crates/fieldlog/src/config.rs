//! Configuration for the logging layer and the producer.
//!
//! Both configurations are plain immutable values. Build them in code with
//! the builders, deserialize them with serde from whatever source the
//! application uses, or read them from `FIELDLOG_*` environment variables.
//!
//! # Example
//!
//! ```ignore
//! use fieldlog::LogConfig;
//!
//! let config = LogConfig::builder()
//!     .separate(true)
//!     .request("request")
//!     .response("response")
//!     .skip("/health")
//!     .extract("username", "user.name")
//!     .mask_field("username")
//!     .build();
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Output field name -> dotted source path in the request body.
pub type FieldSpec = HashMap<String, String>;

/// Output field names whose values are masked.
pub type MaskSet = HashSet<String>;

/// Logging layer configuration.
///
/// Every `String` naming an output field turns that field off when empty.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Master switch; when off every request passes through untouched
    pub enabled: bool,
    /// Populate the base request fields (uri, method, scheme, ...)
    pub build: bool,
    /// Log request and response as two events instead of one
    pub separate: bool,
    /// Log masked bodies as JSON strings instead of nested objects
    pub string_format: bool,
    /// Output name for the request URI
    pub uri: String,
    /// Output name for the HTTP method
    pub method: String,
    /// Output name for the scheme (`http`/`https`)
    pub scheme: String,
    /// Output name for the protocol version
    pub proto: String,
    /// Output name for the user agent
    pub user_agent: String,
    /// Output name for the raw peer address
    pub remote_addr: String,
    /// Output name for the peer IP
    pub remote_ip: String,
    /// Output name for the propagated request id
    pub request_id: String,
    /// Output name for the duration in milliseconds
    pub duration: String,
    /// Output name for the response size in bytes
    pub size: String,
    /// Output name for the response status
    pub status: String,
    /// Output name for the request body
    pub request: String,
    /// Output name for the response body
    pub response: String,
    /// URI suffixes that bypass logging
    pub skips: Vec<String>,
    /// Fields extracted from the request body
    pub map: FieldSpec,
    /// Fields masked when present
    pub masks: MaskSet,
    /// Key under which the producer writes the level
    pub level_key: String,
    /// Key under which the producer writes the timestamp
    pub time_key: String,
    /// Key under which the producer writes the message
    pub msg_key: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            build: true,
            separate: false,
            string_format: false,
            uri: "uri".to_string(),
            method: "method".to_string(),
            scheme: "scheme".to_string(),
            proto: "proto".to_string(),
            user_agent: "user_agent".to_string(),
            remote_addr: "remote_addr".to_string(),
            remote_ip: "remote_ip".to_string(),
            request_id: "request_id".to_string(),
            duration: "duration".to_string(),
            size: "size".to_string(),
            status: "status".to_string(),
            request: String::new(),
            response: String::new(),
            skips: Vec::new(),
            map: FieldSpec::new(),
            masks: MaskSet::new(),
            level_key: "level".to_string(),
            time_key: "time".to_string(),
            msg_key: "msg".to_string(),
        }
    }
}

impl LogConfig {
    /// Create a new builder for LogConfig
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    /// A configuration with every output name cleared and base fields off.
    ///
    /// Useful as a starting point when only a handful of fields are wanted.
    pub fn bare() -> Self {
        Self {
            build: false,
            uri: String::new(),
            method: String::new(),
            scheme: String::new(),
            proto: String::new(),
            user_agent: String::new(),
            remote_addr: String::new(),
            remote_ip: String::new(),
            request_id: String::new(),
            duration: String::new(),
            size: String::new(),
            status: String::new(),
            ..Default::default()
        }
    }

    /// Load from `FIELDLOG_*` environment variables (after reading `.env`).
    ///
    /// Lists such as `FIELDLOG_SKIPS` and `FIELDLOG_MASKS` are comma
    /// separated. The extraction map has no flat form and stays empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::prefixed("FIELDLOG_").from_env::<Self>()?)
    }

    /// Output keys the producer uses for level, time and message
    pub fn key_map(&self) -> KeyMap {
        KeyMap {
            level: self.level_key.clone(),
            time: self.time_key.clone(),
            msg: self.msg_key.clone(),
        }
    }

    /// Whether `uri` ends with any configured skip suffix
    pub fn skips_uri(&self, uri: &str) -> bool {
        self.skips
            .iter()
            .any(|suffix| !suffix.is_empty() && uri.ends_with(suffix.as_str()))
    }
}

/// Builder for LogConfig
#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    /// Start from an existing configuration
    pub fn from_config(config: LogConfig) -> Self {
        Self { config }
    }

    /// Enable or disable logging entirely
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Populate base request fields
    pub fn build_fields(mut self, build: bool) -> Self {
        self.config.build = build;
        self
    }

    /// Log request and response separately
    pub fn separate(mut self, separate: bool) -> Self {
        self.config.separate = separate;
        self
    }

    /// Log masked bodies as JSON strings
    pub fn string_format(mut self, string_format: bool) -> Self {
        self.config.string_format = string_format;
        self
    }

    /// Set the URI field name
    pub fn uri(mut self, name: impl Into<String>) -> Self {
        self.config.uri = name.into();
        self
    }

    /// Set the method field name
    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.config.method = name.into();
        self
    }

    /// Set the scheme field name
    pub fn scheme(mut self, name: impl Into<String>) -> Self {
        self.config.scheme = name.into();
        self
    }

    /// Set the protocol field name
    pub fn proto(mut self, name: impl Into<String>) -> Self {
        self.config.proto = name.into();
        self
    }

    /// Set the user agent field name
    pub fn user_agent(mut self, name: impl Into<String>) -> Self {
        self.config.user_agent = name.into();
        self
    }

    /// Set the remote address field name
    pub fn remote_addr(mut self, name: impl Into<String>) -> Self {
        self.config.remote_addr = name.into();
        self
    }

    /// Set the remote IP field name
    pub fn remote_ip(mut self, name: impl Into<String>) -> Self {
        self.config.remote_ip = name.into();
        self
    }

    /// Set the request id field name
    pub fn request_id(mut self, name: impl Into<String>) -> Self {
        self.config.request_id = name.into();
        self
    }

    /// Set the duration field name
    pub fn duration(mut self, name: impl Into<String>) -> Self {
        self.config.duration = name.into();
        self
    }

    /// Set the response size field name
    pub fn size(mut self, name: impl Into<String>) -> Self {
        self.config.size = name.into();
        self
    }

    /// Set the response status field name
    pub fn status(mut self, name: impl Into<String>) -> Self {
        self.config.status = name.into();
        self
    }

    /// Log the request body under `name`
    pub fn request(mut self, name: impl Into<String>) -> Self {
        self.config.request = name.into();
        self
    }

    /// Log the response body under `name`
    pub fn response(mut self, name: impl Into<String>) -> Self {
        self.config.response = name.into();
        self
    }

    /// Add a URI suffix that bypasses logging
    pub fn skip(mut self, suffix: impl Into<String>) -> Self {
        self.config.skips.push(suffix.into());
        self
    }

    /// Extract `path` from the request body into the field `name`
    pub fn extract(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.config.map.insert(name.into(), path.into());
        self
    }

    /// Mask the field `name` when present
    pub fn mask_field(mut self, name: impl Into<String>) -> Self {
        self.config.masks.insert(name.into());
        self
    }

    /// Set the level/time/message keys used in delivered payloads
    pub fn keys(
        mut self,
        level: impl Into<String>,
        time: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        self.config.level_key = level.into();
        self.config.time_key = time.into();
        self.config.msg_key = msg.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Key names for the level, time and message entries of a delivered record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyMap {
    /// Level key
    pub level: String,
    /// Timestamp key
    pub time: String,
    /// Message key
    pub msg: String,
}

impl Default for KeyMap {
    fn default() -> Self {
        LogConfig::default().key_map()
    }
}

/// What a detached producer does when its queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    /// Wait for room; nothing is lost
    #[default]
    Block,
    /// Reject the record with `DeliveryError::QueueFull`
    Drop,
}

/// Producer configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Endpoint records are POSTed to
    pub url: String,
    /// Backoff schedule in milliseconds; its length bounds the retries
    pub retries: Vec<u64>,
    /// Deliver from background workers instead of the caller's task
    pub detached: bool,
    /// Number of background workers in detached mode
    pub workers: usize,
    /// Queue capacity in detached mode
    pub queue_capacity: usize,
    /// Behaviour when the detached queue is full
    pub overflow: Overflow,
    /// Per-request timeout of the HTTP transport, in milliseconds
    pub timeout_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            retries: Vec::new(),
            detached: false,
            workers: 4,
            queue_capacity: 1024,
            overflow: Overflow::Block,
            timeout_ms: 10_000,
        }
    }
}

impl ProducerConfig {
    /// Create a configuration posting to `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Load from `FIELDLOG_PRODUCER_*` environment variables (after reading `.env`)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::prefixed("FIELDLOG_PRODUCER_").from_env::<Self>()?)
    }

    /// Set the backoff schedule
    pub fn retries(mut self, schedule: impl IntoIterator<Item = Duration>) -> Self {
        self.retries = schedule
            .into_iter()
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .collect();
        self
    }

    /// Deliver from background workers
    pub fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }

    /// Set the number of background workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the overflow behaviour
    pub fn overflow(mut self, overflow: Overflow) -> Self {
        self.overflow = overflow;
        self
    }

    /// Set the transport timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The backoff schedule as durations
    pub fn schedule(&self) -> Vec<Duration> {
        self.retries.iter().map(|ms| Duration::from_millis(*ms)).collect()
    }

    /// Check values that would make a producer unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detached && self.workers == 0 {
            return Err(ConfigError::Invalid(
                "detached delivery needs at least one worker".to_string(),
            ));
        }
        if self.detached && self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "detached delivery needs a queue capacity above zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_logs_base_fields_but_not_bodies() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.build);
        assert!(!config.separate);
        assert_eq!(config.duration, "duration");
        assert!(config.request.is_empty());
        assert!(config.response.is_empty());
        assert_eq!(config.key_map(), KeyMap::default());
    }

    #[test]
    fn builder_collects_extraction_and_masks() {
        let config = LogConfig::builder()
            .separate(true)
            .request("req")
            .extract("email", "user.profile.email")
            .mask_field("email")
            .skip("/health")
            .keys("severity", "ts", "message")
            .build();

        assert!(config.separate);
        assert_eq!(config.request, "req");
        assert_eq!(config.map["email"], "user.profile.email");
        assert!(config.masks.contains("email"));
        assert_eq!(config.key_map().level, "severity");
        assert_eq!(config.key_map().msg, "message");
    }

    #[test]
    fn skip_list_matches_suffix_only() {
        let config = LogConfig::builder().skip("/health").build();
        assert!(config.skips_uri("/api/v1/health"));
        assert!(config.skips_uri("/health"));
        assert!(!config.skips_uri("/health/ready"));
        assert!(!config.skips_uri("/api/users"));
    }

    #[test]
    fn bare_config_clears_names() {
        let config = LogConfig::bare();
        assert!(!config.build);
        assert!(config.uri.is_empty());
        assert!(config.duration.is_empty());
        assert_eq!(config.msg_key, "msg");
    }

    #[test]
    fn deserializes_partial_json() {
        let config: LogConfig = serde_json::from_str(
            r#"{"separate": true, "skips": ["/metrics"], "map": {"id": "user.id"}}"#,
        )
        .unwrap();
        assert!(config.separate);
        assert_eq!(config.skips, vec!["/metrics".to_string()]);
        assert_eq!(config.map["id"], "user.id");
        assert_eq!(config.uri, "uri");
    }

    #[test]
    fn producer_schedule_roundtrips_durations() {
        let config = ProducerConfig::new("http://sink")
            .retries([Duration::from_millis(100), Duration::from_secs(1)])
            .detached(true);
        assert_eq!(
            config.schedule(),
            vec![Duration::from_millis(100), Duration::from_secs(1)]
        );
        assert!(config.validate().is_ok());
        assert!(config.clone().workers(0).validate().is_err());
        assert!(config.queue_capacity(0).validate().is_err());
    }

    #[test]
    fn overflow_deserializes_lowercase() {
        let config: ProducerConfig =
            serde_json::from_str(r#"{"url": "http://x", "overflow": "drop"}"#).unwrap();
        assert_eq!(config.overflow, Overflow::Drop);
        assert_eq!(config.workers, 4);
    }
}
