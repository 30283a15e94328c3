//! Fault logging for unexpected dispatch failures.
//!
//! Every unexpected failure produces exactly one [`FaultEntry`], handed to
//! the configured [`FaultLog`] on the [`LogChannel::ApiError`] channel.
//! Structured domain and validation failures are not faults and are only
//! traced at debug level by the dispatcher.

use std::fmt;
use std::net::IpAddr;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::User;
use crate::request::RequestContext;

/// Placeholder written over sensitive parameter values.
pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEY_PARTS: [&str; 4] = ["password", "secret", "token", "credential"];

/// Log channel a fault is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogChannel {
    /// Unexpected failures inside API dispatch
    ApiError,
}

impl LogChannel {
    /// Returns the channel name, also used as the tracing target.
    pub fn as_str(self) -> &'static str {
        match self {
            LogChannel::ApiError => "api_error",
        }
    }
}

impl fmt::Display for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of the inbound call recorded with a fault.
///
/// Parameter values whose key looks sensitive are replaced by
/// [`REDACTED`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSummary {
    /// Resource name
    pub resource: String,
    /// Raw action name
    pub action: String,
    /// Request params, sensitive values redacted
    pub params: Map<String, Value>,
}

impl RequestSummary {
    /// Summarizes a parsed request context.
    pub fn from_context(ctx: &RequestContext) -> Self {
        Self {
            resource: ctx.resource().to_string(),
            action: ctx.action().to_string(),
            params: redact_params(ctx.params()),
        }
    }
}

/// One logged unexpected failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultEntry {
    /// Full error text, including its cause chain
    pub exception: String,
    /// Error cause chain, outermost first
    pub trace: Vec<String>,
    /// The call that failed
    pub request: RequestSummary,
    /// The resolved caller, if any
    pub user: Option<User>,
    /// The caller's network address
    pub ip: Option<IpAddr>,
}

impl fmt::Display for FaultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}::{}] {} (user={}, ip={})",
            self.request.resource,
            self.request.action,
            self.exception,
            self.user.as_ref().map_or("-", |u| u.email.as_str()),
            self.ip.map_or_else(|| "-".to_string(), |ip| ip.to_string()),
        )
    }
}

/// Sink for unexpected failures.
///
/// Logging is fire-and-forget: implementations must not panic and have no
/// way to report their own failures back to the dispatcher.
pub trait FaultLog: Send + Sync {
    /// Records a fault on `channel`.
    fn log(&self, entry: &FaultEntry, channel: LogChannel);
}

/// Default fault log writing `tracing` error events.
///
/// Events carry the fault fields as structured values, so any subscriber
/// (JSON, journald, OpenTelemetry) can index them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFaultLog;

impl FaultLog for TracingFaultLog {
    fn log(&self, entry: &FaultEntry, channel: LogChannel) {
        let user = entry.user.as_ref().map(|u| u.email.as_str());
        let request = serde_json::to_string(&entry.request).unwrap_or_default();
        tracing::error!(
            target: "api_error",
            channel = %channel,
            resource = %entry.request.resource,
            action = %entry.request.action,
            user = ?user,
            ip = ?entry.ip,
            request = %request,
            "{}",
            entry.exception
        );
    }
}

/// In-memory fault recorder.
///
/// Useful in tests and demos to assert on what was logged.
///
/// # Examples
///
/// ```
/// use rest_dispatch::FaultTrail;
///
/// let trail = FaultTrail::new();
/// assert!(trail.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct FaultTrail {
    entries: Mutex<Vec<(LogChannel, FaultEntry)>>,
}

impl FaultTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded entries.
    pub fn entries(&self) -> Vec<FaultEntry> {
        self.lock().iter().map(|(_, entry)| entry.clone()).collect()
    }

    /// Returns a snapshot of the entries recorded on `channel`.
    pub fn entries_on(&self, channel: LogChannel) -> Vec<FaultEntry> {
        self.lock()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Returns the number of recorded entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clears all recorded entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(LogChannel, FaultEntry)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FaultLog for FaultTrail {
    fn log(&self, entry: &FaultEntry, channel: LogChannel) {
        self.lock().push((channel, entry.clone()));
    }
}

/// Replaces values under sensitive-looking keys with [`REDACTED`].
///
/// Nested objects and arrays are redacted recursively.
pub fn redact_params(params: &Map<String, Value>) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| {
            let value = if is_sensitive_key(key) {
                Value::from(REDACTED)
            } else {
                redact_value(value)
            };
            (key.clone(), value)
        })
        .collect()
}

fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(nested) => Value::Object(redact_params(nested)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| key.contains(part))
}
