//! Resource action handlers and the per-call context they work with.

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::action::Verb;
use crate::auth::{AuthService, Credential, User, UserStore, INVALID_CREDENTIALS};
use crate::config::ResourceConfig;
use crate::error::ApiError;
use crate::request::RequestContext;
use crate::status::StatusCode;

/// Resource-specific behavior, one method per CRUD verb.
///
/// Every method has a default: verbs answer 501 Not Implemented, actions
/// outside the [`ActionMap`](crate::ActionMap) answer 404, and
/// [`pre_action`](Self::pre_action) does nothing. A resource overrides only
/// what it supports.
///
/// # Examples
///
/// ```
/// use rest_dispatch::{ActionContext, ActionHandler, ApiError};
/// use serde_json::json;
///
/// struct Orders;
///
/// impl ActionHandler for Orders {
///     fn list(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
///         ctx.insert("orders", json!([]));
///         Ok(())
///     }
/// }
/// ```
pub trait ActionHandler: Send + Sync {
    /// Runs after the authentication gate and before the action.
    fn pre_action(&self, _ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        Ok(())
    }

    /// Handles `index`.
    fn list(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        Err(ctx.not_implemented(Verb::List))
    }

    /// Handles `get`.
    fn get(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        Err(ctx.not_implemented(Verb::Get))
    }

    /// Handles `post`.
    fn create(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        Err(ctx.not_implemented(Verb::Create))
    }

    /// Handles `put`.
    fn update(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        Err(ctx.not_implemented(Verb::Update))
    }

    /// Handles `delete`.
    fn delete(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        Err(ctx.not_implemented(Verb::Delete))
    }

    /// Handles any action the action map does not know.
    fn custom(&self, action: &str, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        Err(ApiError::not_found(format!(
            "Action '{action}' is not found for the resource {}",
            ctx.request().resource()
        )))
    }
}

/// A REST resource: its access policy plus its handler.
pub struct Resource {
    config: ResourceConfig,
    handler: Box<dyn ActionHandler>,
}

impl Resource {
    /// Pairs a config with a handler.
    pub fn new(config: ResourceConfig, handler: impl ActionHandler + 'static) -> Self {
        Self {
            config,
            handler: Box::new(handler),
        }
    }

    /// Returns the resource name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the access policy.
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub(crate) fn handler(&self) -> &dyn ActionHandler {
        self.handler.as_ref()
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What an action leaves behind for rendering.
#[derive(Debug, Default)]
pub(crate) struct ActionOutput {
    pub(crate) body: Map<String, Value>,
    pub(crate) status: Option<StatusCode>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) debug_data: Map<String, Value>,
    pub(crate) user: Option<User>,
}

/// Per-call state handed to [`ActionHandler`] methods.
///
/// Handlers read the parsed request and the resolved caller from it and
/// write the response body, status overrides, extra headers and debug data
/// into it.
pub struct ActionContext<'a> {
    request: &'a RequestContext,
    display_action: &'a str,
    auth: &'a dyn AuthService,
    users: &'a dyn UserStore,
    output: ActionOutput,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(
        request: &'a RequestContext,
        display_action: &'a str,
        auth: &'a dyn AuthService,
        users: &'a dyn UserStore,
    ) -> Self {
        Self {
            request,
            display_action,
            auth,
            users,
            output: ActionOutput::default(),
        }
    }

    pub(crate) fn set_user(&mut self, user: Option<User>) {
        self.output.user = user;
    }

    pub(crate) fn into_output(self) -> ActionOutput {
        self.output
    }

    /// Returns the parsed request.
    pub fn request(&self) -> &'a RequestContext {
        self.request
    }

    /// Returns the caller-facing action name (`list`, `create`, ...).
    pub fn display_action(&self) -> &'a str {
        self.display_action
    }

    /// Returns the authenticated caller, if any.
    pub fn current_user(&self) -> Option<&User> {
        self.output.user.as_ref()
    }

    /// Returns true if debug mode is active for this call.
    pub fn is_debug(&self) -> bool {
        self.request.is_debug()
    }

    /// Returns the normalized `If-Modified-Since` date.
    pub fn if_modified_since(&self) -> Option<NaiveDateTime> {
        self.request.if_modified_since()
    }

    /// Returns true unless the client's cached copy is at least as new as
    /// `last_modified`.
    pub fn is_modified_since_request(&self, last_modified: NaiveDateTime) -> bool {
        self.if_modified_since()
            .map_or(true, |since| last_modified > since)
    }

    /// Looks up a request param.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.request.param(name)
    }

    /// Looks up a param that must be present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns a 400 error when the param is missing, `null`, `false`,
    /// zero or an empty string.
    pub fn param_required(&self, name: &str) -> Result<&Value, ApiError> {
        match self.request.param(name) {
            Some(value) if is_present(value) => Ok(value),
            _ => Err(ApiError::bad_request(format!(
                "Wrong request: missing parameter: {name}"
            ))),
        }
    }

    /// Like [`param_required`](Self::param_required), converted to a string.
    ///
    /// Numbers and booleans are stringified; arrays and objects are rejected
    /// as missing.
    pub fn param_required_str(&self, name: &str) -> Result<String, ApiError> {
        match self.param_required(name)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(ApiError::bad_request(format!(
                "Wrong request: missing parameter: {name}"
            ))),
        }
    }

    /// Authenticates a login and makes the user current for this call.
    ///
    /// # Errors
    ///
    /// Returns a 403 error when the auth service rejects the credential or
    /// the resolved identity has no user record.
    pub fn authenticate(
        &mut self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<&User, ApiError> {
        let credential = Credential::new(email, password);
        let identity = self.auth.authenticate(&credential)?;
        let user = self
            .users
            .find_by_identifier(&identity)?
            .ok_or_else(|| ApiError::forbidden(INVALID_CREDENTIALS))?;

        tracing::debug!(user = %user.email, "caller authenticated");
        Ok(&*self.output.user.insert(user))
    }

    /// Sets a response body field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.output.body.insert(key.into(), value.into());
    }

    /// Merges a serializable object into the response body.
    ///
    /// # Errors
    ///
    /// Fails as an unexpected error if `data` does not serialize to a JSON
    /// object.
    pub fn extend<T: Serialize>(&mut self, data: &T) -> Result<(), ApiError> {
        match serde_json::to_value(data)? {
            Value::Object(map) => {
                self.output.body.extend(map);
                Ok(())
            }
            other => Err(ApiError::unexpected(anyhow::anyhow!(
                "response data must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Overrides the default 200 status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.output.status = Some(status);
    }

    /// Answers 304 Not Modified with an empty resource body.
    pub fn not_modified(&mut self) {
        self.output.body.clear();
        self.set_status(StatusCode::NotModified);
    }

    /// Adds a response header. `Content-Type` cannot be overridden.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.output.headers.push((name.into(), value.into()));
    }

    /// Attaches data shown under `debug.data` when debug mode is active.
    pub fn debug(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.output.debug_data.insert(key.into(), value.into());
    }

    /// Builds the 501 error for a verb this resource does not implement.
    pub fn not_implemented(&self, verb: Verb) -> ApiError {
        ApiError::not_implemented(format!(
            "Action '{}' is not implemented for the resource {}",
            verb.display_name(),
            self.request.resource()
        ))
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
