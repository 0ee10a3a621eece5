//! Error types for registration and parsing
//!
//! Registration problems are reported as [`ConfigError`] and never depend on
//! input data. Everything that can go wrong while a document is streamed is an
//! [`Error`], which keeps "bad data" (`MalformedInput`) apart from "bad handler
//! logic" (`Callback`) and unreadable sources (`Resource`).

use std::path::PathBuf;
use thiserror::Error;

/// Error returned by user callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registration and configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A callback with the same identity is already registered
    #[error("Callback on path[{path}] already exists ({identity})")]
    DuplicateCallback { identity: String, path: String },

    /// The callback registration is not (or no longer) registered
    #[error("Callback for path: {path} does not exist ({identity})")]
    UnknownCallback { identity: String, path: String },

    /// A handler with the same content address is already registered
    #[error("Handler already registered: {id}")]
    DuplicateHandler { id: String },

    /// No handler is registered under this id
    #[error("Handler with id does not exist: {id}")]
    UnknownHandler { id: String },

    /// Registration paths must not be empty
    #[error("Invalid registration path: {0:?}")]
    InvalidPath(String),

    /// Parsing was requested without anybody listening
    #[error("No callbacks registered")]
    NoCallbacks,

    /// The file read buffer must hold at least one byte
    #[error("Read buffer must be at least 1 byte, got {0}")]
    InvalidReadBuffer(usize),

    /// A handler refused to declare its registrations
    #[error("Handler declaration failed: {0}")]
    Handler(String),
}

/// Main error type for parse operations
#[derive(Error, Debug)]
pub enum Error {
    /// Registration or configuration problem
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The byte stream is not well-formed XML, or ended mid-collection
    #[error("Malformed XML at byte {offset}: {message}")]
    MalformedInput { message: String, offset: usize },

    /// A callback failed while handling a collected tree
    #[error("Callback for path {path} failed: {source}")]
    Callback {
        path: String,
        #[source]
        source: CallbackError,
    },

    /// The input file could not be opened or read
    #[error("Unable to read {}: {source}", .path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tokenizer was already released by a final chunk, an early stop or a failure
    #[error("Parser already released")]
    Released,
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>, offset: usize) -> Self {
        Error::MalformedInput {
            message: message.into(),
            offset,
        }
    }

    /// True for registration and configuration errors
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// True for malformed input
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedInput { .. })
    }

    /// True when a callback failed
    pub fn is_callback(&self) -> bool {
        matches!(self, Error::Callback { .. })
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Error::Resource { .. })
    }
}

/// Result type alias for parse operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::DuplicateCallback {
            identity: "node-/root/user".to_string(),
            path: "/root/user".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Callback on path[/root/user] already exists (node-/root/user)"
        );
    }

    #[test]
    fn test_malformed_display() {
        let err = Error::malformed("mismatched end tag", 12);
        assert_eq!(err.to_string(), "Malformed XML at byte 12: mismatched end tag");
        assert!(err.is_malformed());
        assert!(!err.is_callback());
    }

    #[test]
    fn test_configuration_is_transparent() {
        let err: Error = ConfigError::NoCallbacks.into();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "No callbacks registered");
    }

    #[test]
    fn test_callback_error_keeps_source() {
        let err = Error::Callback {
            path: "/root".to_string(),
            source: "boom".into(),
        };
        assert!(err.is_callback());
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("boom"));
    }
}
