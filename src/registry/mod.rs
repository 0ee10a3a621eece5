//! Registration Module
//!
//! - Path: path tracking, node types and the prefix match rule
//! - Callback: single path/node-type bindings
//! - Handler: content-addressed groups of callbacks
//!
//! [`Registry`] combines both registries. Every mutation returns a new
//! `Registry`; values handed out earlier keep seeing the old state.

pub mod callback;
pub mod handler;
pub mod path;

pub use callback::{Callback, CallbackRegistration, CallbackRegistry, CallbackResult};
pub use handler::{Declaration, Handler, HandlerRegistration, HandlerRegistry, RegistrationId};
pub use path::{NodeType, PathTracker, WILDCARD};

use crate::error::ConfigError;
use crate::value::TreeValue;

/// Callbacks and handlers known to a parser
#[derive(Debug, Clone, Default)]
pub struct Registry {
    callbacks: CallbackRegistry,
    handlers: HandlerRegistry,
}

impl Registry {
    /// Registry with no callbacks or handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// New registry with one more callback, plus the registration
    pub fn register_callback<F>(&self, path: &str, node_type: NodeType, callback: F) -> Result<(CallbackRegistration, Self), ConfigError>
    where
        F: Fn(TreeValue) -> CallbackResult + Send + Sync + 'static,
    {
        let (registration, callbacks) = self.callbacks.register(path, node_type, callback)?;
        Ok((
            registration,
            Registry {
                callbacks,
                handlers: self.handlers.clone(),
            },
        ))
    }

    /// New registry without `registration`
    pub fn unregister_callback(&self, registration: &CallbackRegistration) -> Result<Self, ConfigError> {
        Ok(Registry {
            callbacks: self.callbacks.unregister(registration)?,
            handlers: self.handlers.clone(),
        })
    }

    /// Register every callback `handler` declares, or none of them
    pub fn register_handler<H: Handler>(&self, handler: H) -> Result<(RegistrationId, Self), ConfigError> {
        let declared = handler.declare(Declaration::new())?.into_registrations();
        let id = RegistrationId::derive::<H>(&declared);
        if self.handlers.contains(&id) {
            return Err(ConfigError::DuplicateHandler { id: id.to_string() });
        }

        // Fold into a copy; the first conflict discards the copy
        let callbacks = declared
            .iter()
            .try_fold(self.callbacks.clone(), |registry, reg| registry.insert(reg.clone()))?;
        let handlers = self
            .handlers
            .insert(HandlerRegistration::new(id.clone(), handler, declared))?;

        tracing::debug!(id = %id, callbacks = callbacks.len(), "Registered handler");
        Ok((id, Registry { callbacks, handlers }))
    }

    /// Drop a handler and every callback it owns
    pub fn unregister_handler(&self, id: &RegistrationId) -> Result<Self, ConfigError> {
        let (handlers, removed) = self.handlers.remove(id)?;
        let callbacks = removed
            .callbacks()
            .iter()
            .try_fold(self.callbacks.clone(), |registry, reg| registry.unregister(reg))?;

        tracing::debug!(id = %id, "Unregistered handler");
        Ok(Registry { callbacks, handlers })
    }

    /// Handler registered under `id`, if it is an `H`
    pub fn handler<H: Handler>(&self, id: &RegistrationId) -> Option<&H> {
        self.handlers.get(id)?.downcast::<H>()
    }

    /// Handler registration by id, with its callbacks
    pub fn handler_registration(&self, id: &RegistrationId) -> Option<&HandlerRegistration> {
        self.handlers.get(id)
    }

    /// Ids of registered handlers in registration order
    pub fn handler_ids(&self) -> impl Iterator<Item = &RegistrationId> {
        self.handlers.ids()
    }

    /// Callback registrations in insertion order
    pub fn callbacks(&self) -> impl Iterator<Item = &CallbackRegistration> {
        self.callbacks.iter()
    }

    pub(crate) fn callback_registry(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// True when no callback would observe a parse
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
