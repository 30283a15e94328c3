//! Identity collaborators: the auth service and the user store.
//!
//! The dispatcher only consumes these traits. Credential storage, session
//! handling and password hashing live behind them in the host application.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::request::InboundRequest;
use crate::secret::Secret;

/// Message returned when a credential is rejected.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// A user record loaded for an authenticated caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Store identifier
    pub id: String,
    /// Login identifier the auth service resolves to
    pub email: String,
    /// Any further profile fields
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl User {
    /// Creates a user with no extra attributes.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            attributes: Map::new(),
        }
    }

    /// Adds a profile attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Login credential passed to [`AuthService::authenticate`].
#[derive(Debug)]
pub struct Credential {
    /// Login identifier (e-mail)
    pub identity: String,
    /// Password, redacted in all formatted output
    pub password: Secret<String>,
}

impl Credential {
    /// Creates a credential.
    pub fn new(identity: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            password: Secret::new(password.into()),
        }
    }
}

/// Resolves and establishes caller identities.
pub trait AuthService: Send + Sync {
    /// Returns the identity bound to the inbound call, if any.
    ///
    /// `Ok(None)` means the caller is anonymous; that is not an error.
    fn resolve_identity(&self, request: &InboundRequest) -> Result<Option<String>, ApiError>;

    /// Verifies a credential and returns the identity it belongs to.
    ///
    /// # Errors
    ///
    /// Implementations reject bad credentials with a 403 domain error,
    /// conventionally [`INVALID_CREDENTIALS`].
    fn authenticate(&self, credential: &Credential) -> Result<String, ApiError>;
}

/// Looks up user records by the identifier the auth service resolves.
pub trait UserStore: Send + Sync {
    /// Finds the user for `identifier`; `Ok(None)` when there is none.
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, ApiError>;
}

/// Auth service for deployments without logins.
///
/// Every caller is anonymous and every credential is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuth;

impl AuthService for AnonymousAuth {
    fn resolve_identity(&self, _request: &InboundRequest) -> Result<Option<String>, ApiError> {
        Ok(None)
    }

    fn authenticate(&self, _credential: &Credential) -> Result<String, ApiError> {
        Err(ApiError::forbidden(INVALID_CREDENTIALS))
    }
}

/// User store backed by a map keyed on e-mail.
///
/// # Examples
///
/// ```
/// use rest_dispatch::{InMemoryUserStore, User, UserStore};
///
/// let store = InMemoryUserStore::new();
/// store.insert(User::new("1", "alice@example.com"));
///
/// let user = store.find_by_identifier("alice@example.com").unwrap();
/// assert_eq!(user.map(|u| u.id), Some("1".to_string()));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user, keyed by e-mail.
    pub fn insert(&self, user: User) {
        self.users
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user.email.clone(), user);
    }

    /// Returns the number of stored users.
    pub fn len(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns true if the store holds no users.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, ApiError> {
        let users = self
            .users
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(users.get(identifier).cloned())
    }
}
