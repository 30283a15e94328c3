//! REST dispatch flow demonstration.
//!
//! This example wires a dispatcher the way a host server would:
//! 1. Read the environment and API version from process env
//! 2. Plug in a token-based auth service and a user store
//! 3. Dispatch a handful of calls against an `Article` resource
//! 4. Print each rendered response
//!
//! Run with: `APPLICATION_ENV=development RUST_LOG=debug cargo run --example rest_dispatch_flow`

use std::net::IpAddr;
use std::sync::Arc;

use rest_dispatch::{
    ActionContext, ActionHandler, ApiError, AuthService, Credential, Dispatcher, DispatcherConfig,
    InMemoryUserStore, InboundRequest, Resource, ResourceConfig, StatusCode, User,
    INVALID_CREDENTIALS,
};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Accepts a single hard-coded bearer token
struct DemoAuth;

impl AuthService for DemoAuth {
    fn resolve_identity(&self, request: &InboundRequest) -> Result<Option<String>, ApiError> {
        Ok(match request.header("authorization") {
            Some("Bearer demo-token") => Some("editor@example.com".to_string()),
            _ => None,
        })
    }

    fn authenticate(&self, credential: &Credential) -> Result<String, ApiError> {
        if credential.password.expose_secret() == "correct horse" {
            Ok(credential.identity.clone())
        } else {
            Err(ApiError::forbidden(INVALID_CREDENTIALS))
        }
    }
}

struct Articles;

impl ActionHandler for Articles {
    fn list(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        ctx.insert("articles", json!([{"id": 1, "title": "Hello"}]));
        ctx.debug("source", "in-memory fixture");
        Ok(())
    }

    fn create(&self, ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        let title = ctx.param_required_str("title")?;
        if title.len() > 40 {
            return Err(ApiError::validation(
                "article",
                json!({"title": ["is too long"]}),
            ));
        }
        let author = ctx.current_user().map(|u| u.email.clone());
        ctx.insert("article", json!({"id": 2, "title": title, "author": author}));
        ctx.set_status(StatusCode::Created);
        Ok(())
    }

    fn delete(&self, _ctx: &mut ActionContext<'_>) -> Result<(), ApiError> {
        Err(anyhow::anyhow!("article storage is read-only").into())
    }
}

fn print_response(label: &str, dispatcher: &Dispatcher, resource: &Resource, request: InboundRequest) {
    let response = dispatcher.dispatch(resource, &request);
    println!("\n=== {label} ===");
    println!("   Status: {}", response.status);
    println!("   Body:   {}", response.body);
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = DispatcherConfig::from_env();
    println!(
        "Dispatching as API {} in {} mode",
        config.version, config.environment
    );

    let users = InMemoryUserStore::new();
    users.insert(User::new("7", "editor@example.com").with_attribute("role", "editor"));

    let dispatcher = Dispatcher::new(config, Arc::new(DemoAuth), Arc::new(users));
    let articles = Resource::new(
        ResourceConfig::new("Article")
            .allow(["index", "post", "delete"])
            .unsecured(["index"]),
        Articles,
    );
    let client = IpAddr::from([203, 0, 113, 5]);

    print_response(
        "Anonymous list",
        &dispatcher,
        &articles,
        InboundRequest::new("index").with_param("debug", 1),
    );

    print_response(
        "Anonymous create",
        &dispatcher,
        &articles,
        InboundRequest::new("post").with_param("title", "Draft"),
    );

    print_response(
        "Authenticated create",
        &dispatcher,
        &articles,
        InboundRequest::new("post")
            .with_header("Authorization", "Bearer demo-token")
            .with_param("title", "Draft"),
    );

    print_response(
        "Validation failure",
        &dispatcher,
        &articles,
        InboundRequest::new("post")
            .with_header("Authorization", "Bearer demo-token")
            .with_param("title", "A title that goes on far longer than anyone wants"),
    );

    print_response(
        "Action outside allowlist",
        &dispatcher,
        &articles,
        InboundRequest::new("put").with_header("Authorization", "Bearer demo-token"),
    );

    print_response(
        "Unexpected failure",
        &dispatcher,
        &articles,
        InboundRequest::new("delete")
            .with_header("Authorization", "Bearer demo-token")
            .with_remote_addr(client),
    );
}
