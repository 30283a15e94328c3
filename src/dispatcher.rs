//! The REST dispatch boundary.
//!
//! [`Dispatcher::dispatch`] runs one call through a fixed pipeline:
//!
//! ```text
//! parse -> allowlist -> resolve identity -> auth gate -> pre_action -> action
//!                                                                       |
//!     render  <------------------ any failure skips ahead -------------+
//! ```
//!
//! Render always runs exactly once, so every call produces exactly one
//! envelope, including calls whose action panicked.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::action::{ActionMap, Verb};
use crate::auth::{AuthService, User, UserStore};
use crate::config::DispatcherConfig;
use crate::envelope::{DebugPayload, HttpResponse, ResponseEnvelope};
use crate::error::ApiError;
use crate::handler::{ActionContext, ActionOutput, Resource};
use crate::logging::{FaultEntry, FaultLog, LogChannel, RequestSummary, TracingFaultLog};
use crate::request::{InboundRequest, RequestContext};

/// Error shown for anonymous calls to secured actions.
pub const NOT_AUTHORIZED: &str = "Not Authorized";

/// Error shown for validation failures.
pub const VALIDATION_ERROR: &str = "Resource validation error";

/// Error shown for unexpected failures outside development.
pub const INTERNAL_ERROR: &str = "Internal Error";

/// Body key holding the error cause chain in debug mode.
pub const EXCEPTION_TRACE_KEY: &str = "exceptionTrace";

/// Runs REST calls against resources and renders their envelopes.
///
/// A dispatcher is built once at startup and shared by all calls; it holds
/// only read-only configuration and thread-safe collaborators.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rest_dispatch::{
///     ActionContext, ActionHandler, AnonymousAuth, ApiError, Dispatcher, DispatcherConfig,
///     Environment, InboundRequest, InMemoryUserStore, Resource, ResourceConfig, StatusCode,
/// };
///
/// struct Catalog;
///
/// impl ActionHandler for Catalog {
///     fn list(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
///         ctx.insert("items", vec!["tea", "coffee"]);
///         Ok(())
///     }
/// }
///
/// let dispatcher = Dispatcher::new(
///     DispatcherConfig::new(Environment::Production),
///     Arc::new(AnonymousAuth),
///     Arc::new(InMemoryUserStore::new()),
/// );
/// let catalog = Resource::new(ResourceConfig::new("Catalog").public(), Catalog);
///
/// let response = dispatcher.dispatch(&catalog, &InboundRequest::new("index"));
/// assert_eq!(response.status, StatusCode::Ok);
///
/// let body = response.json().unwrap();
/// assert_eq!(body["rest_action"], "Catalog::list");
/// assert_eq!(body["items"][1], "coffee");
/// ```
pub struct Dispatcher {
    config: DispatcherConfig,
    actions: ActionMap,
    auth: Arc<dyn AuthService>,
    users: Arc<dyn UserStore>,
    faults: Arc<dyn FaultLog>,
}

impl Dispatcher {
    /// Creates a dispatcher with the default action map and a
    /// [`TracingFaultLog`].
    pub fn new(
        config: DispatcherConfig,
        auth: Arc<dyn AuthService>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            config,
            actions: ActionMap::default(),
            auth,
            users,
            faults: Arc::new(TracingFaultLog),
        }
    }

    /// Replaces the action map.
    pub fn with_action_map(mut self, actions: ActionMap) -> Self {
        self.actions = actions;
        self
    }

    /// Replaces the fault log.
    pub fn with_fault_log(mut self, faults: Arc<dyn FaultLog>) -> Self {
        self.faults = faults;
        self
    }

    /// Returns the dispatcher config.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Returns the action map.
    pub fn action_map(&self) -> &ActionMap {
        &self.actions
    }

    /// Runs one call and renders its response.
    ///
    /// Never fails: every outcome, including a panicking action, becomes
    /// exactly one rendered envelope.
    pub fn dispatch(&self, resource: &Resource, request: &InboundRequest) -> HttpResponse {
        let ctx = RequestContext::parse(resource.name(), request, self.config.environment);
        let display_action = self.actions.display_name(ctx.action());

        let span = tracing::debug_span!(
            "dispatch",
            resource = %ctx.resource(),
            action = %ctx.action(),
        );
        let _guard = span.enter();

        let mut action_ctx =
            ActionContext::new(&ctx, display_action, self.auth.as_ref(), self.users.as_ref());

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.run(resource, request, &mut action_ctx)
        }))
        .unwrap_or_else(|payload| {
            Err(ApiError::unexpected(anyhow::anyhow!(
                "action panicked: {}",
                panic_message(payload.as_ref())
            )))
        });

        self.render(&ctx, display_action, action_ctx.into_output(), outcome)
    }

    fn run(
        &self,
        resource: &Resource,
        request: &InboundRequest,
        ctx: &mut ActionContext<'_>,
    ) -> Result<(), ApiError> {
        let config = resource.config();
        let action = ctx.request().action();

        if !config.is_allowed(action) {
            return Err(ApiError::method_not_allowed(format!(
                "Action '{}' is not implemented for the resource {}",
                ctx.display_action(),
                config.name
            )));
        }

        if let Some(identity) = self.auth.resolve_identity(request)? {
            let user = self.users.find_by_identifier(&identity)?;
            if user.is_none() {
                tracing::debug!(%identity, "resolved identity has no user record");
            }
            ctx.set_user(user);
        }

        if ctx.current_user().is_none() && config.requires_authentication(action) {
            return Err(ApiError::forbidden(NOT_AUTHORIZED));
        }

        let handler = resource.handler();
        handler.pre_action(ctx)?;

        match self.actions.verb(action) {
            Some(Verb::List) => handler.list(ctx),
            Some(Verb::Get) => handler.get(ctx),
            Some(Verb::Create) => handler.create(ctx),
            Some(Verb::Update) => handler.update(ctx),
            Some(Verb::Delete) => handler.delete(ctx),
            None => handler.custom(action, ctx),
        }
    }

    fn render(
        &self,
        ctx: &RequestContext,
        display_action: &str,
        output: ActionOutput,
        outcome: Result<(), ApiError>,
    ) -> HttpResponse {
        let rest_action = format!("{}::{}", ctx.resource(), display_action);
        let mut envelope = ResponseEnvelope::new(self.config.version.clone(), rest_action);

        let status = match outcome {
            Ok(()) => {
                envelope.body = output.body;
                output.status.unwrap_or_default()
            }
            Err(err) => {
                let status = err.status();
                envelope.success = false;
                envelope.body = self.fault(err, ctx, output.user.as_ref());
                status
            }
        };

        if ctx.is_debug() {
            envelope.debug = Some(DebugPayload {
                request_params: ctx.params().clone(),
                data: output.debug_data,
            });
        }

        tracing::debug!(
            status = status.as_u16(),
            success = envelope.success,
            "rendered response"
        );
        envelope.render(status, output.headers)
    }

    /// Builds the fault body and logs unexpected failures.
    fn fault(&self, err: ApiError, ctx: &RequestContext, user: Option<&User>) -> Map<String, Value> {
        let mut body = Map::new();

        match err {
            ApiError::Validation {
                resource, errors, ..
            } => {
                tracing::debug!(%resource, "validation failed");
                body.insert("error".to_string(), json!(VALIDATION_ERROR));
                let mut details = Map::new();
                details.insert(resource, errors);
                body.insert("validation_errors".to_string(), Value::Object(details));
            }
            ApiError::Domain { status, message } => {
                tracing::debug!(status = status.as_u16(), %message, "request rejected");
                body.insert("error".to_string(), json!(message));
            }
            ApiError::Unexpected(source) => {
                let detail = format!("{source:#}");
                let trace: Vec<String> = source.chain().map(|cause| cause.to_string()).collect();

                self.log_fault(FaultEntry {
                    exception: detail.clone(),
                    trace: trace.clone(),
                    request: RequestSummary::from_context(ctx),
                    user: user.cloned(),
                    ip: ctx.remote_addr(),
                });

                let shown = if self.config.environment.is_development() {
                    detail
                } else {
                    INTERNAL_ERROR.to_string()
                };
                body.insert("error".to_string(), json!(shown));
                if ctx.is_debug() {
                    body.insert(EXCEPTION_TRACE_KEY.to_string(), json!(trace));
                }
            }
        }

        body
    }

    fn log_fault(&self, entry: FaultEntry) {
        let logged = catch_unwind(AssertUnwindSafe(|| {
            self.faults.log(&entry, LogChannel::ApiError)
        }));
        if logged.is_err() {
            tracing::error!(exception = %entry.exception, "fault log panicked");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
