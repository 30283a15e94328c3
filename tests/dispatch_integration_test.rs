//! Integration tests for full dispatch flows.
//!
//! These tests drive the dispatcher the way a host server would: build an
//! `InboundRequest`, dispatch it against a resource, and inspect the
//! rendered `HttpResponse`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::NaiveDate;
use rest_dispatch::{
    ActionContext, ActionHandler, ActionMap, ApiError, AuthService, Credential, Dispatcher,
    DispatcherConfig, Environment, FaultTrail, InMemoryUserStore, InboundRequest, Resource,
    ResourceConfig, StatusCode, User, Verb, INVALID_CREDENTIALS,
};
use serde_json::json;

/// Resolves `Authorization: Bearer <token>` and checks passwords from a map.
struct TokenAuth {
    tokens: HashMap<String, String>,
    passwords: HashMap<String, String>,
}

impl TokenAuth {
    fn new() -> Self {
        let mut tokens = HashMap::new();
        tokens.insert("t-alice".to_string(), "alice@example.com".to_string());
        tokens.insert("t-ghost".to_string(), "ghost@example.com".to_string());

        let mut passwords = HashMap::new();
        passwords.insert("alice@example.com".to_string(), "wonderland".to_string());

        Self { tokens, passwords }
    }
}

impl AuthService for TokenAuth {
    fn resolve_identity(&self, request: &InboundRequest) -> Result<Option<String>, ApiError> {
        if request.header("x-auth-broken").is_some() {
            return Err(anyhow::anyhow!("session store unreachable").into());
        }
        Ok(request
            .header("authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| self.tokens.get(token))
            .cloned())
    }

    fn authenticate(&self, credential: &Credential) -> Result<String, ApiError> {
        match self.passwords.get(&credential.identity) {
            Some(expected) if expected == credential.password.expose_secret() => {
                Ok(credential.identity.clone())
            }
            _ => Err(ApiError::forbidden(INVALID_CREDENTIALS)),
        }
    }
}

struct Users;

impl ActionHandler for Users {
    fn list(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        ctx.insert("users", json!([{"id": "1"}]));
        ctx.debug("query", "SELECT * FROM users");
        Ok(())
    }

    fn get(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        let last_modified = NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| ApiError::unexpected(anyhow::anyhow!("bad fixture date")))?;
        if !ctx.is_modified_since_request(last_modified) {
            ctx.not_modified();
            return Ok(());
        }
        let id = ctx.param_required_str("id")?;
        ctx.insert("user", json!({"id": id}));
        Ok(())
    }

    fn update(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        let email = ctx
            .current_user()
            .map(|u| u.email.clone())
            .unwrap_or_default();
        ctx.insert("updated", email);
        Ok(())
    }

    fn delete(&self, _ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        Err(anyhow::anyhow!("foreign key violation").into())
    }

    fn custom(&self, action: &str, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        match action {
            "export" => {
                ctx.insert("format", "csv");
                Ok(())
            }
            _ => Err(ApiError::not_found(format!("Unknown action {action}"))),
        }
    }
}

struct Sessions;

impl ActionHandler for Sessions {
    fn create(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        let email = ctx.param_required_str("email")?;
        let password = ctx.param_required_str("password")?;
        let user = ctx.authenticate(email, password)?;
        let id = user.id.clone();
        ctx.insert("user_id", id);
        ctx.set_status(StatusCode::Created);
        Ok(())
    }
}

struct Orders;

impl ActionHandler for Orders {
    fn pre_action(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        if ctx.param("frozen").is_some() {
            return Err(ApiError::forbidden("Orders are frozen"));
        }
        Ok(())
    }

    fn create(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        let qty = ctx.param("qty").and_then(|v| v.as_i64()).unwrap_or(0);
        if qty <= 0 {
            return Err(ApiError::validation(
                "order",
                json!({"qty": ["must be greater than zero"]}),
            ));
        }
        ctx.insert("qty", qty);
        Ok(())
    }
}

struct Harness {
    dispatcher: Dispatcher,
    trail: Arc<FaultTrail>,
    users: Resource,
    sessions: Resource,
    orders: Resource,
}

fn harness(environment: Environment) -> Harness {
    let store = InMemoryUserStore::new();
    store.insert(User::new("1", "alice@example.com").with_attribute("name", "Alice"));

    let trail = Arc::new(FaultTrail::new());
    let dispatcher = Dispatcher::new(
        DispatcherConfig::new(environment),
        Arc::new(TokenAuth::new()),
        Arc::new(store),
    )
    .with_fault_log(trail.clone());

    Harness {
        dispatcher,
        trail,
        users: Resource::new(
            ResourceConfig::new("User")
                .allow(["index", "get", "put", "delete", "export"])
                .unsecured(["index"]),
            Users,
        ),
        sessions: Resource::new(ResourceConfig::new("Session").unsecured(["post"]), Sessions),
        orders: Resource::new(ResourceConfig::new("Order").public(), Orders),
    }
}

fn alice(action: &str) -> InboundRequest {
    InboundRequest::new(action).with_header("Authorization", "Bearer t-alice")
}

fn addr() -> IpAddr {
    IpAddr::from([192, 0, 2, 10])
}

#[test]
fn anonymous_list_on_unsecured_action() {
    let h = harness(Environment::Production);

    let response = h.dispatcher.dispatch(&h.users, &InboundRequest::new("index"));

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.header("Content-Type"), Some("application/json"));
    assert_eq!(
        response.body,
        r#"{"version":"0.2","success":true,"rest_action":"User::list","users":[{"id":"1"}]}"#
    );
}

#[test]
fn anonymous_update_on_secured_resource_is_forbidden() {
    let h = harness(Environment::Production);

    let response = h.dispatcher.dispatch(&h.users, &InboundRequest::new("put"));

    assert_eq!(response.status, StatusCode::Forbidden);
    assert_eq!(
        response.body,
        r#"{"version":"0.2","success":false,"rest_action":"User::update","error":"Not Authorized"}"#
    );
    assert!(h.trail.is_empty());
}

#[test]
fn authenticated_update_passes_gate() {
    let h = harness(Environment::Production);

    let response = h.dispatcher.dispatch(&h.users, &alice("put"));

    assert_eq!(response.status, StatusCode::Ok);
    let body = response.json().unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["updated"], "alice@example.com");
}

#[test]
fn identity_without_user_record_is_anonymous() {
    let h = harness(Environment::Production);
    let request = InboundRequest::new("put").with_header("Authorization", "Bearer t-ghost");

    let response = h.dispatcher.dispatch(&h.users, &request);

    assert_eq!(response.status, StatusCode::Forbidden);
}

#[test]
fn action_outside_allowlist_is_rejected_even_when_authenticated() {
    let h = harness(Environment::Production);

    let response = h.dispatcher.dispatch(&h.users, &alice("post"));

    assert_eq!(response.status, StatusCode::MethodNotAllowed);
    let body = response.json().unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["rest_action"], "User::create");
    assert_eq!(
        body["error"],
        "Action 'create' is not implemented for the resource User"
    );
}

#[test]
fn allowlist_is_checked_before_authentication() {
    let h = harness(Environment::Production);

    let response = h.dispatcher.dispatch(&h.users, &InboundRequest::new("post"));

    assert_eq!(response.status, StatusCode::MethodNotAllowed);
}

#[test]
fn unimplemented_verb_answers_not_implemented() {
    let h = harness(Environment::Production);

    let response = h
        .dispatcher
        .dispatch(&h.orders, &InboundRequest::new("delete"));

    assert_eq!(response.status, StatusCode::NotImplemented);
    assert_eq!(
        response.json().unwrap()["error"],
        "Action 'delete' is not implemented for the resource Order"
    );
}

#[test]
fn custom_actions_reach_the_handler() {
    let h = harness(Environment::Production);

    let response = h.dispatcher.dispatch(&h.users, &alice("export"));

    assert_eq!(response.status, StatusCode::Ok);
    let body = response.json().unwrap();
    assert_eq!(body["rest_action"], "User::export");
    assert_eq!(body["format"], "csv");
}

#[test]
fn validation_failure_renders_field_details() {
    let h = harness(Environment::Production);
    let request = InboundRequest::new("post").with_param("qty", 0);

    let response = h.dispatcher.dispatch(&h.orders, &request);

    assert_eq!(response.status, StatusCode::BadRequest);
    assert_eq!(
        response.json().unwrap(),
        json!({
            "version": "0.2",
            "success": false,
            "rest_action": "Order::create",
            "error": "Resource validation error",
            "validation_errors": {"order": {"qty": ["must be greater than zero"]}}
        })
    );
}

#[test]
fn pre_action_hook_can_reject() {
    let h = harness(Environment::Production);
    let request = InboundRequest::new("post")
        .with_param("qty", 2)
        .with_param("frozen", true);

    let response = h.dispatcher.dispatch(&h.orders, &request);

    assert_eq!(response.status, StatusCode::Forbidden);
    assert_eq!(response.json().unwrap()["error"], "Orders are frozen");
}

#[test]
fn missing_required_param_is_bad_request() {
    let h = harness(Environment::Production);

    let response = h.dispatcher.dispatch(&h.users, &alice("get"));

    assert_eq!(response.status, StatusCode::BadRequest);
    assert_eq!(
        response.json().unwrap()["error"],
        "Wrong request: missing parameter: id"
    );
}

#[test]
fn conditional_get_answers_not_modified() {
    let h = harness(Environment::Production);
    let request = alice("get")
        .with_param("id", 1)
        .with_header("If-Modified-Since", "Wed, 01 Jan 2025 00:00:00 GMT");

    let response = h.dispatcher.dispatch(&h.users, &request);

    assert_eq!(response.status, StatusCode::NotModified);
    assert_eq!(
        response.body,
        r#"{"version":"0.2","success":true,"rest_action":"User::get"}"#
    );

    let stale = alice("get")
        .with_param("id", 1)
        .with_header("If-Modified-Since", "Tue, 01 Jan 2019 00:00:00 GMT");
    let response = h.dispatcher.dispatch(&h.users, &stale);
    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.json().unwrap()["user"]["id"], "1");
}

#[test]
fn login_authenticates_through_context() {
    let h = harness(Environment::Production);
    let request = InboundRequest::new("post")
        .with_param("email", "alice@example.com")
        .with_param("password", "wonderland");

    let response = h.dispatcher.dispatch(&h.sessions, &request);

    assert_eq!(response.status, StatusCode::Created);
    assert_eq!(response.json().unwrap()["user_id"], "1");
}

#[test]
fn login_with_wrong_password_is_forbidden() {
    let h = harness(Environment::Production);
    let request = InboundRequest::new("post")
        .with_param("email", "alice@example.com")
        .with_param("password", "looking-glass");

    let response = h.dispatcher.dispatch(&h.sessions, &request);

    assert_eq!(response.status, StatusCode::Forbidden);
    assert_eq!(response.json().unwrap()["error"], INVALID_CREDENTIALS);
    assert!(!response.body.contains("looking-glass"));
}

#[test]
fn unexpected_failure_is_masked_and_logged_with_caller() {
    let h = harness(Environment::Production);
    let request = alice("delete").with_param("id", 1).with_remote_addr(addr());

    let response = h.dispatcher.dispatch(&h.users, &request);

    assert_eq!(response.status, StatusCode::InternalError);
    assert_eq!(
        response.body,
        r#"{"version":"0.2","success":false,"rest_action":"User::delete","error":"Internal Error"}"#
    );

    let entries = h.trail.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.exception, "foreign key violation");
    assert_eq!(entry.ip, Some(addr()));
    assert_eq!(entry.request.resource, "User");
    assert_eq!(entry.request.action, "delete");
    assert_eq!(
        entry.user.as_ref().map(|u| u.email.as_str()),
        Some("alice@example.com")
    );
}

#[test]
fn unexpected_failure_detail_is_shown_in_development() {
    let h = harness(Environment::Development);

    let response = h.dispatcher.dispatch(&h.users, &alice("delete"));

    assert_eq!(response.status, StatusCode::InternalError);
    let body = response.json().unwrap();
    assert_eq!(body["error"], "foreign key violation");
    assert!(body.get("exceptionTrace").is_none());
    assert_eq!(h.trail.len(), 1);
}

#[test]
fn collaborator_failure_is_an_unexpected_error() {
    let h = harness(Environment::Production);
    let request = InboundRequest::new("index")
        .with_header("X-Auth-Broken", "1")
        .with_remote_addr(addr());

    let response = h.dispatcher.dispatch(&h.users, &request);

    assert_eq!(response.status, StatusCode::InternalError);
    assert_eq!(response.json().unwrap()["error"], "Internal Error");
    assert_eq!(h.trail.entries()[0].exception, "session store unreachable");
}

#[test]
fn logged_request_params_are_redacted() {
    struct Failing;
    impl ActionHandler for Failing {
        fn create(&self, _ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
            Err(anyhow::anyhow!("mailer offline").into())
        }
    }

    let h = harness(Environment::Production);
    let resource = Resource::new(ResourceConfig::new("Signup").public(), Failing);
    let request = InboundRequest::new("post")
        .with_param("email", "new@example.com")
        .with_param("password", "p4ssw0rd");

    h.dispatcher.dispatch(&resource, &request);

    let entry = &h.trail.entries()[0];
    assert_eq!(entry.request.params["email"], "new@example.com");
    assert_eq!(entry.request.params["password"], "[REDACTED]");
}

#[test]
fn debug_payload_in_development_only() {
    let request = InboundRequest::new("index")
        .with_param("module", "api")
        .with_param("controller", "user")
        .with_param("action", "index")
        .with_param("debug", "1")
        .with_param("page", 2);

    let dev = harness(Environment::Development);
    let body = dev.dispatcher.dispatch(&dev.users, &request).json().unwrap();
    assert_eq!(
        body["debug"],
        json!({
            "request_params": {"page": 2},
            "data": {"query": "SELECT * FROM users"}
        })
    );

    let prod = harness(Environment::Production);
    let body = prod.dispatcher.dispatch(&prod.users, &request).json().unwrap();
    assert!(body.get("debug").is_none());
}

#[test]
fn debug_payload_includes_exception_trace_on_unexpected_failure() {
    let h = harness(Environment::Development);
    let request = alice("delete").with_param("debug", true);

    let body = h.dispatcher.dispatch(&h.users, &request).json().unwrap();

    assert_eq!(body["exceptionTrace"], json!(["foreign key violation"]));
    assert_eq!(body["debug"]["request_params"], json!({}));
    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys.last().map(|k| k.as_str()), Some("debug"));
}

#[test]
fn custom_action_map_changes_routing_and_names() {
    let dispatcher = Dispatcher::new(
        DispatcherConfig::new(Environment::Production).with_version("1.4"),
        Arc::new(TokenAuth::new()),
        Arc::new(InMemoryUserStore::new()),
    )
    .with_action_map(ActionMap::default().with("browse", Verb::List));
    let users = Resource::new(ResourceConfig::new("User").public(), Users);

    let body = dispatcher
        .dispatch(&users, &InboundRequest::new("browse"))
        .json()
        .unwrap();

    assert_eq!(body["version"], "1.4");
    assert_eq!(body["rest_action"], "User::list");
    assert!(body["users"].is_array());
}

#[test]
fn dispatcher_is_shareable_across_threads() {
    let h = Arc::new(harness(Environment::Production));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let h = Arc::clone(&h);
            scope.spawn(move || {
                let response = h.dispatcher.dispatch(&h.users, &alice("put"));
                assert_eq!(response.status, StatusCode::Ok);
            });
        }
    });
}
