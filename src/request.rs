//! Inbound call data and its parsed, per-call context.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Environment;

/// Routed parameters stripped from the request params before an action sees them.
pub const DISPATCH_INTERNAL_KEYS: [&str; 4] = ["module", "controller", "action", "debug"];

/// Parameter that asks for a debug payload.
pub const DEBUG_PARAM: &str = "debug";

/// Header carrying the client's cached-entity date.
pub const IF_MODIFIED_SINCE: &str = "if-modified-since";

/// One routed call as handed over by the host's router.
///
/// `InboundRequest` is plain owned data with no ties to a web framework.
/// The host fills it from its own request type; params are expected to
/// hold everything the router merged (path, query and body values,
/// including dispatch-internal keys such as `controller`).
///
/// # Examples
///
/// ```
/// use rest_dispatch::InboundRequest;
///
/// let mut request = InboundRequest::new("get");
/// request.add_param("id", 42);
/// request.add_header("If-Modified-Since", "Sun, 06 Nov 1994 08:49:37 GMT");
///
/// assert_eq!(request.action(), "get");
/// assert_eq!(request.header("if-modified-since"), Some("Sun, 06 Nov 1994 08:49:37 GMT"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    action: String,
    params: Map<String, Value>,
    // keys are lowercased
    headers: HashMap<String, String>,
    remote_addr: Option<IpAddr>,
}

impl InboundRequest {
    /// Creates a request for the given raw action name.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// Adds a routed parameter.
    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    /// Adds a header; names are matched case-insensitively.
    pub fn add_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Sets the caller's network address.
    pub fn set_remote_addr(&mut self, addr: IpAddr) {
        self.remote_addr = Some(addr);
    }

    /// Builder form of [`add_param`](Self::add_param).
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_param(key, value);
        self
    }

    /// Builder form of [`add_header`](Self::add_header).
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Builder form of [`set_remote_addr`](Self::set_remote_addr).
    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.set_remote_addr(addr);
        self
    }

    /// Returns the raw routed action name.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns all routed parameters, internal keys included.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Looks up a header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the caller's network address, if the host supplied one.
    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }
}

/// Normalized metadata of one call.
///
/// Built once at the start of a dispatch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestContext {
    resource: String,
    action: String,
    params: Map<String, Value>,
    #[serde(skip)]
    is_debug: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    if_modified_since: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_addr: Option<IpAddr>,
}

impl RequestContext {
    /// Parses an inbound request for `resource`.
    ///
    /// Debug mode is enabled only when the `debug` param is truthy and
    /// `environment` is development.
    ///
    /// # Examples
    ///
    /// ```
    /// use rest_dispatch::{Environment, InboundRequest, RequestContext};
    ///
    /// let request = InboundRequest::new("index")
    ///     .with_param("controller", "order")
    ///     .with_param("debug", 1)
    ///     .with_param("page", 2);
    ///
    /// let ctx = RequestContext::parse("Order", &request, Environment::Production);
    /// assert!(!ctx.is_debug());
    /// assert!(ctx.params().contains_key("page"));
    /// assert!(!ctx.params().contains_key("controller"));
    /// ```
    pub fn parse(resource: &str, request: &InboundRequest, environment: Environment) -> Self {
        let debug_requested = request
            .params()
            .get(DEBUG_PARAM)
            .is_some_and(is_truthy);

        let params = request
            .params()
            .iter()
            .filter(|(key, _)| !DISPATCH_INTERNAL_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let if_modified_since = request.header(IF_MODIFIED_SINCE).and_then(|raw| {
            let parsed = parse_http_date(raw);
            if parsed.is_none() {
                tracing::debug!(header = raw, "ignoring unparseable If-Modified-Since");
            }
            parsed
        });

        Self {
            resource: resource.to_string(),
            action: request.action().to_string(),
            params,
            is_debug: debug_requested && environment.is_development(),
            if_modified_since,
            remote_addr: request.remote_addr(),
        }
    }

    /// Returns the resource name.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns the raw action name.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the params with dispatch-internal keys removed.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Looks up a single param.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Returns true if the response should carry a debug payload.
    pub fn is_debug(&self) -> bool {
        self.is_debug
    }

    /// Returns the normalized `If-Modified-Since` date in UTC.
    pub fn if_modified_since(&self) -> Option<NaiveDateTime> {
        self.if_modified_since
    }

    /// Returns the caller's network address.
    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }
}

/// Applies loose truthiness to a routed value.
///
/// `null`, `false`, zero, `""`, `"0"` and empty arrays or objects are falsy;
/// everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Parses an HTTP date header into a UTC timestamp.
///
/// Accepts RFC 2822 / IMF-fixdate, RFC 3339 and asctime forms.
pub fn parse_http_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|date| date.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%a %b %e %H:%M:%S %Y"))
        .ok()
}
