//! Handlers: groups of callbacks registered as one unit
//!
//! A handler declares its callbacks into a [`Declaration`]. The registration id
//! is a content address: the SHA-256 of the declared identities joined by `#`,
//! followed by `::` and the handler's type name. Two handlers of the same type
//! declaring the same ordered callbacks therefore share an id, no matter which
//! instance declared them.

use super::callback::{CallbackRegistration, CallbackRegistry, CallbackResult};
use super::path::NodeType;
use crate::error::ConfigError;
use crate::value::TreeValue;
use sha2::{Digest, Sha256};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Object that registers a set of callbacks
///
/// ```
/// use xmlcollect::{ConfigError, Declaration, Flow, Handler, NodeType};
///
/// struct Users;
///
/// impl Handler for Users {
///     fn declare(&self, declaration: Declaration) -> Result<Declaration, ConfigError> {
///         declaration.on("/feed/user", NodeType::Node, |user| {
///             println!("{:?}", user.attribute("name"));
///             Ok(Flow::Continue)
///         })
///     }
/// }
/// ```
pub trait Handler: Any + Send + Sync {
    fn declare(&self, declaration: Declaration) -> Result<Declaration, ConfigError>;
}

/// Callbacks a handler declared, in declaration order
#[derive(Debug, Default)]
pub struct Declaration {
    /// Scratch registry, catches duplicates inside one declaration
    scratch: CallbackRegistry,
    registrations: Vec<CallbackRegistration>,
}

impl Declaration {
    /// Empty declaration
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one callback
    pub fn on<F>(self, path: &str, node_type: NodeType, callback: F) -> Result<Self, ConfigError>
    where
        F: Fn(TreeValue) -> CallbackResult + Send + Sync + 'static,
    {
        let (registration, scratch) = self.scratch.register(path, node_type, callback)?;
        let mut registrations = self.registrations;
        registrations.push(registration);
        Ok(Declaration { scratch, registrations })
    }

    /// Callbacks declared so far
    pub fn registrations(&self) -> &[CallbackRegistration] {
        &self.registrations
    }

    pub(crate) fn into_registrations(self) -> Vec<CallbackRegistration> {
        self.registrations
    }
}

/// Content-addressed handler id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(String);

impl RegistrationId {
    /// Derive the id of handler type `H` declaring `registrations`
    pub fn derive<H: ?Sized>(registrations: &[CallbackRegistration]) -> Self {
        let joined = registrations
            .iter()
            .map(CallbackRegistration::identity)
            .collect::<Vec<_>>()
            .join("#");
        let digest = Sha256::digest(joined.as_bytes());
        RegistrationId(format!("{}::{}", hex::encode(digest), std::any::type_name::<H>()))
    }

    /// The id as `{sha256}::{type name}`
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered handler and the callbacks it owns
#[derive(Clone)]
pub struct HandlerRegistration {
    id: RegistrationId,
    handler: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    callbacks: Vec<CallbackRegistration>,
}

impl HandlerRegistration {
    pub(crate) fn new<H: Handler>(id: RegistrationId, handler: H, callbacks: Vec<CallbackRegistration>) -> Self {
        HandlerRegistration {
            id,
            handler: Arc::new(handler),
            type_name: std::any::type_name::<H>(),
            callbacks,
        }
    }

    /// Content-addressed id
    pub fn id(&self) -> &RegistrationId {
        &self.id
    }

    /// Type name of the handler
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Callbacks the handler declared
    pub fn callbacks(&self) -> &[CallbackRegistration] {
        &self.callbacks
    }

    /// The handler object, if it is an `H`
    pub fn downcast<H: Handler>(&self) -> Option<&H> {
        self.handler.downcast_ref::<H>()
    }
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

/// Persistent map of handler registrations
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    entries: indexmap::IndexMap<RegistrationId, HandlerRegistration>,
}

impl HandlerRegistry {
    /// New registry with `registration` added; ids must be unique
    pub fn insert(&self, registration: HandlerRegistration) -> Result<Self, ConfigError> {
        if self.entries.contains_key(&registration.id) {
            return Err(ConfigError::DuplicateHandler {
                id: registration.id.to_string(),
            });
        }
        let mut next = self.clone();
        next.entries.insert(registration.id.clone(), registration);
        Ok(next)
    }

    /// Registry without `id`, plus the removed registration
    pub fn remove(&self, id: &RegistrationId) -> Result<(Self, HandlerRegistration), ConfigError> {
        let mut next = self.clone();
        let removed = next
            .entries
            .shift_remove(id)
            .ok_or_else(|| ConfigError::UnknownHandler { id: id.to_string() })?;
        Ok((next, removed))
    }

    /// Registration by id
    pub fn get(&self, id: &RegistrationId) -> Option<&HandlerRegistration> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &RegistrationId) -> bool {
        self.entries.contains_key(id)
    }

    /// Registered ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &RegistrationId> {
        self.entries.keys()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
