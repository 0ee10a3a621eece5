//! Core XML scanning primitives
//!
//! This module contains the byte-level building blocks the collection engine
//! is fed from:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Entities: predefined and numeric entity decoding with Cow
//! - Attributes: attribute list parsing into ordered owned pairs
//! - Tokenizer: incremental, well-formedness checking event source

pub mod attributes;
pub mod entities;
pub mod scanner;
pub mod tokenizer;

pub use attributes::Attributes;
pub use tokenizer::{Flow, TokenSink, Tokenizer};
