//! XML Reader Module
//!
//! Input front ends for the tokenizer:
//! - ChunkedReader: buffers caller chunks until constructs are complete
//! - File: plain and gzip file sources read in fixed-size chunks

pub mod chunked;
pub mod file;

pub use chunked::ChunkedReader;
