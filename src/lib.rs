//! Uniform REST action dispatch with authentication gating and JSON envelopes.
//!
//! This crate sits between a host's router and its resource handlers. For
//! every routed call it:
//! - **Parses** the call into an immutable [`RequestContext`]
//! - **Gates** it against the resource's action allowlist and authentication policy
//! - **Delegates** to the resource's [`ActionHandler`]
//! - **Renders** exactly one [`ResponseEnvelope`] as an [`HttpResponse`]
//!
//! # Core Types
//!
//! - [`Dispatcher`]: The dispatch boundary, built once at startup
//! - [`Resource`]: A [`ResourceConfig`] access policy paired with its handler
//! - [`ActionContext`]: What a handler reads the request from and writes the response to
//! - [`ApiError`]: Validation, domain and unexpected failures
//! - [`AuthService`], [`UserStore`], [`FaultLog`]: Collaborators supplied by the host
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use rest_dispatch::{
//!     ActionHandler, AnonymousAuth, Dispatcher, DispatcherConfig, Environment, InboundRequest,
//!     InMemoryUserStore, Resource, ResourceConfig, StatusCode,
//! };
//!
//! struct Orders;
//! impl ActionHandler for Orders {}
//!
//! let dispatcher = Dispatcher::new(
//!     DispatcherConfig::new(Environment::Production),
//!     Arc::new(AnonymousAuth),
//!     Arc::new(InMemoryUserStore::new()),
//! );
//! let orders = Resource::new(ResourceConfig::new("Order"), Orders);
//!
//! // Anonymous update of a secured resource
//! let response = dispatcher.dispatch(&orders, &InboundRequest::new("put"));
//! assert_eq!(response.status, StatusCode::Forbidden);
//! assert_eq!(
//!     response.body,
//!     r#"{"version":"0.2","success":false,"rest_action":"Order::update","error":"Not Authorized"}"#
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod auth;
mod config;
mod dispatcher;
mod envelope;
mod error;
mod handler;
mod logging;
mod request;
mod secret;
mod status;

pub use action::{ActionMap, Verb};
pub use auth::{
    AnonymousAuth, AuthService, Credential, InMemoryUserStore, User, UserStore,
    INVALID_CREDENTIALS,
};
pub use config::{
    DispatcherConfig, Environment, ResourceConfig, UnknownEnvironment, DEFAULT_API_VERSION,
    ENV_VAR_ENVIRONMENT, ENV_VAR_VERSION,
};
pub use dispatcher::{
    Dispatcher, EXCEPTION_TRACE_KEY, INTERNAL_ERROR, NOT_AUTHORIZED, VALIDATION_ERROR,
};
pub use envelope::{DebugPayload, HttpResponse, ResponseEnvelope, CONTENT_TYPE_JSON};
pub use error::{ApiError, ErrorKind};
pub use handler::{ActionContext, ActionHandler, Resource};
pub use logging::{
    redact_params, FaultEntry, FaultLog, FaultTrail, LogChannel, RequestSummary, TracingFaultLog,
    REDACTED,
};
pub use request::{
    is_truthy, parse_http_date, InboundRequest, RequestContext, DISPATCH_INTERNAL_KEYS,
};
pub use secret::Secret;
pub use status::StatusCode;
