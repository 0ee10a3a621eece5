//! xmlcollect - Streaming XML path dispatch
//!
//! Register callbacks against document paths, stream a document through the
//! parser in chunks, and receive each matching subtree as an immutable
//! [`TreeValue`] as soon as its closing tag is seen. The whole document is
//! never held in memory; only the subtree currently being collected is.
//!
//! ```text
//!  bytes --> ChunkedReader --> Tokenizer --events--> Collector --TreeValue--> callback
//!                                                       |
//!                                              Registry (callbacks, handlers)
//! ```
//!
//! Layers:
//! A: core      - byte scanning, entities, attributes, tokenizer
//! B: reader    - chunk buffering, plain and gzip files
//! C: value     - tree builder and frozen tree values
//! D: registry  - paths, callbacks, content-addressed handlers
//! E: engine    - collection state machine and parser
//!
//! ```
//! use xmlcollect::{Flow, NodeType, Parser, Progress, Registry};
//!
//! let (_, registry) = Registry::new()
//!     .register_callback("/root/user", NodeType::Node, |user| {
//!         assert_eq!(user.attribute("name"), Some("x"));
//!         Ok(Flow::Continue)
//!     })
//!     .unwrap();
//!
//! let mut parser = Parser::new(registry);
//! assert_eq!(parser.feed(b"<root><user name=\"x\"/>", false).unwrap(), Progress::NeedMore);
//! assert_eq!(parser.feed(b"</root>", true).unwrap(), Progress::Finished);
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod reader;
pub mod registry;
pub mod value;

pub use crate::config::ParserConfig;
pub use crate::core::Flow;
pub use crate::engine::{Parser, Progress};
pub use crate::error::{CallbackError, ConfigError, Error, Result};
pub use crate::registry::{
    CallbackRegistration, CallbackResult, Declaration, Handler, NodeType, RegistrationId, Registry, WILDCARD,
};
pub use crate::value::{Slot, TreeBuilder, TreeValue};
