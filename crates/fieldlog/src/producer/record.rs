//! Records handed to the producer

use crate::config::KeyMap;
use crate::fields::Fields;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// A finished log event: level, message and field bag.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    /// Severity, `"info"` for request logging
    pub level: String,
    /// Event message, e.g. `"Request POST /users"`
    pub message: String,
    /// Field bag
    pub fields: Fields,
}

impl LogRecord {
    /// Create an INFO record
    pub fn new(message: impl Into<String>, fields: Fields) -> Self {
        Self {
            level: "info".to_string(),
            message: message.into(),
            fields,
        }
    }

    /// Set the level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Serialize to the JSON payload sent to the sink.
    ///
    /// The payload is the field bag plus level, RFC 3339 time and message
    /// under the names in `keys`. An empty key name leaves that entry out.
    /// These three entries replace same-named fields.
    pub fn to_payload(&self, keys: &KeyMap, time: DateTime<Utc>) -> Result<Vec<u8>, serde_json::Error> {
        let mut object = self.fields.clone();
        if !keys.level.is_empty() {
            object.insert(keys.level.clone(), Value::String(self.level.clone()));
        }
        if !keys.time.is_empty() {
            object.insert(
                keys.time.clone(),
                Value::String(time.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        if !keys.msg.is_empty() {
            object.insert(keys.msg.clone(), Value::String(self.message.clone()));
        }
        serde_json::to_vec(&object)
    }
}
