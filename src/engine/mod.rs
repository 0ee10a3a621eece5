//! Streaming engine
//!
//! - Collector: the Idle/Collecting state machine fed by the tokenizer
//! - Parser: per-document driver owning reader, collector and registry

pub mod collector;
pub mod parser;

pub use collector::Collector;
pub use parser::{Parser, Progress};
