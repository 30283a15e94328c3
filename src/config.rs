//! Process-wide and per-resource configuration.
//!
//! Everything here is read once at startup and passed into the
//! [`Dispatcher`](crate::Dispatcher) explicitly. Dispatch logic never reads
//! the process environment itself.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Environment variable holding the deployment environment name.
pub const ENV_VAR_ENVIRONMENT: &str = "APPLICATION_ENV";

/// Environment variable overriding the API version string.
pub const ENV_VAR_VERSION: &str = "API_VERSION";

/// API version reported in every envelope unless configured otherwise.
pub const DEFAULT_API_VERSION: &str = "0.2";

/// Deployment environment.
///
/// Only [`Environment::Development`] enables debug payloads and unmasked
/// internal error details.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    Development,
    /// Automated test runs
    Testing,
    /// Pre-production
    Staging,
    /// Production (and anything unrecognized)
    #[default]
    Production,
}

impl Environment {
    /// Returns true only for [`Environment::Development`].
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }

    /// Returns the lowercase name of the environment.
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Parses an environment name leniently.
    ///
    /// Unknown names map to [`Environment::Production`], and so does any
    /// spelling of development other than the exact `development`.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an environment name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment '{0}'")]
pub struct UnknownEnvironment(pub String);

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    /// Development only matches the exact name `development`; the other
    /// names are trimmed and matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "development" {
            return Ok(Environment::Development);
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "testing" | "test" => Ok(Environment::Testing),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(UnknownEnvironment(s.to_string())),
        }
    }
}

/// Dispatcher-wide settings.
///
/// # Examples
///
/// ```
/// use rest_dispatch::{DispatcherConfig, Environment};
///
/// let config = DispatcherConfig::new(Environment::Development).with_version("1.0");
/// assert_eq!(config.version, "1.0");
/// assert!(config.environment.is_development());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// API version string reported in every envelope
    pub version: String,
    /// Deployment environment
    pub environment: Environment,
}

impl DispatcherConfig {
    /// Creates a config for `environment` with the default API version.
    pub fn new(environment: Environment) -> Self {
        Self {
            version: DEFAULT_API_VERSION.to_string(),
            environment,
        }
    }

    /// Sets the API version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Reads the config from `APPLICATION_ENV` and `API_VERSION`.
    ///
    /// Call this once at process start. A missing or unknown
    /// `APPLICATION_ENV` yields [`Environment::Production`].
    pub fn from_env() -> Self {
        let environment = std::env::var(ENV_VAR_ENVIRONMENT)
            .map(|name| Environment::from_name(&name))
            .unwrap_or_default();
        let version =
            std::env::var(ENV_VAR_VERSION).unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        tracing::debug!(%environment, %version, "loaded dispatcher config");

        Self {
            version,
            environment,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new(Environment::default())
    }
}

/// Access policy of one REST resource.
///
/// Replaces per-controller overrides with plain data: whether the resource
/// needs an authenticated caller, which actions it implements, and which
/// actions stay open to anonymous callers.
///
/// # Examples
///
/// ```
/// use rest_dispatch::ResourceConfig;
///
/// let config = ResourceConfig::new("Order")
///     .allow(["index", "get", "post"])
///     .unsecured(["index"]);
///
/// assert!(config.secured);
/// assert!(config.is_allowed("get"));
/// assert!(!config.is_allowed("delete"));
/// assert!(config.is_unsecured("index"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource name used in `rest_action` and messages
    pub name: String,
    /// Whether anonymous callers are rejected
    #[serde(default = "secured_by_default")]
    pub secured: bool,
    /// Raw action names the resource implements; empty allows all
    #[serde(default)]
    pub allowed_actions: BTreeSet<String>,
    /// Raw action names exempt from authentication
    #[serde(default)]
    pub unsecured_actions: BTreeSet<String>,
}

fn secured_by_default() -> bool {
    true
}

impl ResourceConfig {
    /// Creates a secured resource config with empty allowlists.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secured: true,
            allowed_actions: BTreeSet::new(),
            unsecured_actions: BTreeSet::new(),
        }
    }

    /// Marks the resource as reachable without authentication.
    pub fn public(mut self) -> Self {
        self.secured = false;
        self
    }

    /// Sets the secured flag.
    pub fn secured(mut self, secured: bool) -> Self {
        self.secured = secured;
        self
    }

    /// Adds raw action names to the allowlist.
    pub fn allow<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_actions
            .extend(actions.into_iter().map(Into::into));
        self
    }

    /// Adds raw action names that skip the authentication gate.
    pub fn unsecured<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unsecured_actions
            .extend(actions.into_iter().map(Into::into));
        self
    }

    /// Returns true if `action` passes the allowlist.
    pub fn is_allowed(&self, action: &str) -> bool {
        self.allowed_actions.is_empty() || self.allowed_actions.contains(action)
    }

    /// Returns true if `action` is exempt from authentication.
    pub fn is_unsecured(&self, action: &str) -> bool {
        self.unsecured_actions.contains(action)
    }

    /// Returns true if an anonymous caller must be rejected for `action`.
    pub fn requires_authentication(&self, action: &str) -> bool {
        self.secured && !self.is_unsecured(action)
    }
}
