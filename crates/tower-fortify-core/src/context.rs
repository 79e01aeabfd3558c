//! Per-call execution context.

use std::collections::BTreeMap;

/// Read-only data that travels with one execution through every policy.
///
/// Policies other than the cache ignore it. The cache derives its key from the
/// operation key or from a named item.
///
/// ```rust
/// use tower_fortify_core::Context;
///
/// let ctx = Context::new("GetUser").with("user", "42");
/// assert_eq!(ctx.operation_key(), Some("GetUser"));
/// assert_eq!(ctx.get("user"), Some("42"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    operation_key: Option<String>,
    items: BTreeMap<String, String>,
}

impl Context {
    /// Creates a context identified by an operation key.
    pub fn new(operation_key: impl Into<String>) -> Self {
        Self {
            operation_key: Some(operation_key.into()),
            items: BTreeMap::new(),
        }
    }

    /// Creates a context with neither an operation key nor items.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds an item, replacing any previous value under the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.insert(name.into(), value.into());
        self
    }

    /// The operation key, if one was given.
    pub fn operation_key(&self) -> Option<&str> {
        self.operation_key.as_deref()
    }

    /// Looks up an item by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items.get(name).map(String::as_str)
    }

    /// Iterates over all items in name order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
