//! Collected subtrees
//!
//! - TreeBuilder: mutable accumulator driven by the collection engine
//! - TreeValue: the immutable value handed to callbacks

pub mod builder;
pub mod tree;

pub use builder::TreeBuilder;
pub use tree::{Slot, TreeValue};
