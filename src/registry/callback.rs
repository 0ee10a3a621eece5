//! Callback registrations
//!
//! A [`CallbackRegistry`] is a persistent value: `register` and `unregister`
//! return a new registry and leave the original untouched, so a parser can keep
//! using the snapshot it started with while the caller prepares the next one.

use super::path::{matches, NodeType};
use crate::core::Flow;
use crate::error::{CallbackError, ConfigError};
use crate::value::TreeValue;
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// What a callback reports back to the engine
pub type CallbackResult = std::result::Result<Flow, CallbackError>;

/// Shared callback invoked with each collected value
pub type Callback = Arc<dyn Fn(TreeValue) -> CallbackResult + Send + Sync>;

/// One path/node-type binding
#[derive(Clone)]
pub struct CallbackRegistration {
    path: String,
    node_type: NodeType,
    callback: Callback,
    identity: String,
}

impl CallbackRegistration {
    pub(crate) fn new(path: &str, node_type: NodeType, callback: Callback) -> Self {
        CallbackRegistration {
            identity: format!("{}-{}", node_type, path),
            path: path.to_string(),
            node_type,
            callback,
        }
    }

    /// Registered path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Node type the callback receives
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Stable key `{nodeType}-{path}`
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Run the callback; a panic is reported as a callback error
    pub(crate) fn invoke(&self, value: TreeValue) -> CallbackResult {
        std::panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(value)))
            .unwrap_or_else(|payload| Err(panic_message(payload.as_ref()).into()))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");
    format!("callback panicked: {}", detail)
}

impl fmt::Debug for CallbackRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistration")
            .field("path", &self.path)
            .field("node_type", &self.node_type)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Registrations in insertion order, keyed by identity
#[derive(Debug, Clone, Default)]
pub struct CallbackRegistry {
    entries: IndexMap<String, CallbackRegistration>,
}

impl CallbackRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registration and return it with the extended registry
    pub fn register<F>(&self, path: &str, node_type: NodeType, callback: F) -> Result<(CallbackRegistration, Self), ConfigError>
    where
        F: Fn(TreeValue) -> CallbackResult + Send + Sync + 'static,
    {
        if path.is_empty() {
            return Err(ConfigError::InvalidPath(path.to_string()));
        }
        let registration = CallbackRegistration::new(path, node_type, Arc::new(callback));
        let registry = self.insert(registration.clone())?;
        Ok((registration, registry))
    }

    /// Add an existing registration (used when replaying a handler's declaration)
    pub fn insert(&self, registration: CallbackRegistration) -> Result<Self, ConfigError> {
        if self.entries.contains_key(registration.identity()) {
            return Err(ConfigError::DuplicateCallback {
                identity: registration.identity.clone(),
                path: registration.path.clone(),
            });
        }
        let mut next = self.clone();
        next.entries.insert(registration.identity.clone(), registration);
        Ok(next)
    }

    /// Registry without `registration`
    pub fn unregister(&self, registration: &CallbackRegistration) -> Result<Self, ConfigError> {
        if !self.entries.contains_key(registration.identity()) {
            return Err(ConfigError::UnknownCallback {
                identity: registration.identity.clone(),
                path: registration.path.clone(),
            });
        }
        let mut next = self.clone();
        // shift_remove keeps the remaining insertion order
        next.entries.shift_remove(registration.identity());
        Ok(next)
    }

    /// First registration of `node_type` whose path prefixes `path`
    ///
    /// Insertion order decides between overlapping registrations.
    pub fn find_for_path(&self, path: &str, node_type: NodeType) -> Option<&CallbackRegistration> {
        self.entries
            .values()
            .find(|reg| reg.node_type == node_type && matches(&reg.path, path))
    }

    /// Registration by its `{nodeType}-{path}` identity
    pub fn get(&self, identity: &str) -> Option<&CallbackRegistration> {
        self.entries.get(identity)
    }

    /// True when a registration with the same identity exists
    pub fn contains(&self, registration: &CallbackRegistration) -> bool {
        self.entries.contains_key(registration.identity())
    }

    /// Registrations in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &CallbackRegistration> {
        self.entries.values()
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
