//! Mapping from routed action names to CRUD verbs.

use std::collections::HashMap;
use std::fmt;

/// One of the five CRUD operations a resource can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Collection read (`index`)
    List,
    /// Single item read (`get`)
    Get,
    /// Create (`post`)
    Create,
    /// Update (`put`)
    Update,
    /// Delete (`delete`)
    Delete,
}

impl Verb {
    /// Returns the caller-facing name used in `rest_action` and messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Verb::List => "list",
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lookup table from raw routed action names to verbs.
///
/// The default table holds the five standard REST mappings. Hosts with
/// different routing conventions can build their own and inject it into the
/// [`Dispatcher`](crate::Dispatcher).
///
/// # Examples
///
/// ```
/// use rest_dispatch::{ActionMap, Verb};
///
/// let map = ActionMap::default();
/// assert_eq!(map.verb("post"), Some(Verb::Create));
/// assert_eq!(map.display_name("index"), "list");
///
/// // Unmapped actions are shown as-is
/// assert_eq!(map.display_name("export"), "export");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMap {
    verbs: HashMap<String, Verb>,
}

impl ActionMap {
    /// Creates an empty table.
    pub fn empty() -> Self {
        Self {
            verbs: HashMap::new(),
        }
    }

    /// Adds or replaces the mapping for `action`.
    pub fn with(mut self, action: impl Into<String>, verb: Verb) -> Self {
        self.verbs.insert(action.into(), verb);
        self
    }

    /// Returns the verb a raw action routes to, if any.
    pub fn verb(&self, action: &str) -> Option<Verb> {
        self.verbs.get(action).copied()
    }

    /// Returns the caller-facing name of a raw action.
    pub fn display_name<'a>(&self, action: &'a str) -> &'a str {
        match self.verb(action) {
            Some(verb) => verb.display_name(),
            None => action,
        }
    }
}

impl Default for ActionMap {
    fn default() -> Self {
        Self::empty()
            .with("index", Verb::List)
            .with("get", Verb::Get)
            .with("post", Verb::Create)
            .with("put", Verb::Update)
            .with("delete", Verb::Delete)
    }
}
