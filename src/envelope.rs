//! The uniform JSON envelope and the rendered HTTP response.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::dispatcher::INTERNAL_ERROR;
use crate::status::StatusCode;

/// Content type of every rendered response.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Envelope keys the body may not override.
pub const RESERVED_KEYS: [&str; 4] = ["version", "success", "rest_action", "debug"];

/// Extra data appended to the envelope in debug mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebugPayload {
    /// Request params with dispatch-internal keys removed
    pub request_params: Map<String, Value>,
    /// Resource-supplied debug data
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

/// The JSON object returned for every call.
///
/// Serializes as `{version, success, rest_action, ...body, debug?}` with
/// body keys in insertion order.
///
/// # Examples
///
/// ```
/// use rest_dispatch::ResponseEnvelope;
/// use serde_json::json;
///
/// let mut envelope = ResponseEnvelope::new("0.2", "Order::list");
/// envelope.body.insert("total".to_string(), json!(3));
///
/// let json = serde_json::to_value(&envelope).unwrap();
/// assert_eq!(json, json!({
///     "version": "0.2",
///     "success": true,
///     "rest_action": "Order::list",
///     "total": 3
/// }));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    /// API version
    pub version: String,
    /// False when the call faulted
    pub success: bool,
    /// `"<Resource>::<action>"` with the caller-facing action name
    pub rest_action: String,
    /// Resource-specific fields, or the fault fields on failure
    #[serde(flatten)]
    pub body: Map<String, Value>,
    /// Present only in debug mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugPayload>,
}

impl ResponseEnvelope {
    /// Creates a successful envelope with an empty body.
    pub fn new(version: impl Into<String>, rest_action: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            success: true,
            rest_action: rest_action.into(),
            body: Map::new(),
            debug: None,
        }
    }

    /// Serializes the envelope into an HTTP response.
    ///
    /// Reserved keys in `body` are dropped so they cannot shadow the
    /// envelope fields. `headers` are sent after the fixed JSON content type.
    pub fn render(mut self, status: StatusCode, headers: Vec<(String, String)>) -> HttpResponse {
        self.body.retain(|key, _| {
            let reserved = RESERVED_KEYS.contains(&key.as_str());
            if reserved {
                tracing::warn!(key = %key, "dropping reserved key from response body");
            }
            !reserved
        });

        let mut all_headers = vec![("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string())];
        all_headers.extend(
            headers
                .into_iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type")),
        );

        match serde_json::to_string(&self) {
            Ok(body) => HttpResponse {
                status,
                headers: all_headers,
                body,
            },
            Err(err) => {
                tracing::error!(error = %err, rest_action = %self.rest_action, "failed to serialize envelope");
                HttpResponse {
                    status: StatusCode::InternalError,
                    headers: all_headers,
                    body: self.fallback_body(),
                }
            }
        }
    }

    /// Minimal fault body used when the full envelope cannot be serialized.
    fn fallback_body(&self) -> String {
        json!({
            "version": self.version,
            "success": false,
            "rest_action": self.rest_action,
            "error": INTERNAL_ERROR,
        })
        .to_string()
    }
}

/// A fully rendered response, ready for the host server to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers in send order
    pub headers: Vec<(String, String)>,
    /// UTF-8 JSON body
    pub body: String,
}

impl HttpResponse {
    /// Looks up a header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parses the body back into JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
