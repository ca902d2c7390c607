//! Per-request field bags
//!
//! [`build_fields`] assembles the base request fields. [`RequestFields`] is the
//! request-scoped accumulator stored in the request extensions: the logging
//! layer seeds it with extracted body fields, handlers may add their own, and
//! both log phases read it back.

use crate::config::LogConfig;
use fieldlog_core::{Request, RequestId};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};

/// A structured log field bag
pub type Fields = Map<String, Value>;

/// Shared, request-scoped field accumulator.
///
/// Clones share the same bag, so fields inserted by a handler through the
/// copy in the request extensions show up in the response log event. Each
/// request gets its own accumulator.
///
/// # Example
///
/// ```ignore
/// use fieldlog::RequestFields;
///
/// async fn handler(req: Request) -> Response {
///     if let Some(fields) = req.extensions().get::<RequestFields>() {
///         fields.insert("tenant", "acme");
///     }
///     // ...
/// }
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestFields {
    inner: Arc<Mutex<Fields>>,
}

impl RequestFields {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an accumulator holding `fields`
    pub fn from_fields(fields: Fields) -> Self {
        Self {
            inner: Arc::new(Mutex::new(fields)),
        }
    }

    /// Add or replace a field
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock().insert(key.into(), value.into());
    }

    /// Add every entry of `fields`, replacing existing keys
    pub fn extend(&self, fields: Fields) {
        self.lock().extend(fields);
    }

    /// Read a single field
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Copy of the current bag
    pub fn snapshot(&self) -> Fields {
        self.lock().clone()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Fields> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Build the base fields for `req`.
///
/// Returns an empty bag unless `config.build` is set. Each field is written
/// only when its configured output name is non-empty.
pub fn build_fields(config: &LogConfig, req: &Request) -> Fields {
    let mut fields = Fields::new();
    if !config.build {
        return fields;
    }

    put(&mut fields, &config.uri, req.request_uri());
    if let Some(id) = req.extensions().get::<RequestId>() {
        put(&mut fields, &config.request_id, id.as_str());
    }
    put(
        &mut fields,
        &config.scheme,
        if req.is_tls() { "https" } else { "http" },
    );
    put(&mut fields, &config.proto, format!("{:?}", req.version()));

    let user_agent = req
        .headers()
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    put(&mut fields, &config.user_agent, user_agent);

    let remote_addr = req.remote_addr();
    put(&mut fields, &config.remote_addr, remote_addr);
    put(&mut fields, &config.method, req.method().as_str());
    put(
        &mut fields,
        &config.remote_ip,
        split_host(remote_addr).unwrap_or(remote_addr),
    );
    fields
}

fn put(fields: &mut Fields, name: &str, value: impl Into<Value>) {
    if !name.is_empty() {
        fields.insert(name.to_string(), value.into());
    }
}

/// Host part of a `host:port` or `[v6]:port` address.
///
/// Returns `None` when the address has no port or cannot be split
/// unambiguously (such as a bare IPv6 address).
pub fn split_host(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return tail.strip_prefix(':').map(|_| host);
    }
    let (host, _port) = addr.rsplit_once(':')?;
    if host.contains(':') {
        return None;
    }
    Some(host)
}
