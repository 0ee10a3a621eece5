//! Chunked XML Reader
//!
//! Stateful reader that accepts input in caller-sized chunks. Bytes the
//! tokenizer could not yet consume (a tag split across two chunks, text whose
//! closing markup has not arrived) stay buffered until the next `feed`.

use crate::core::{Flow, TokenSink, Tokenizer};
use crate::error::Result;

/// Buffering front end for the [`Tokenizer`]
#[derive(Debug)]
pub struct ChunkedReader {
    /// Unconsumed tail of previous chunks
    buffer: Vec<u8>,
    tokenizer: Tokenizer,
    finished: bool,
}

impl ChunkedReader {
    /// Empty reader at the start of a document
    pub fn new(decode_entities: bool) -> Self {
        ChunkedReader {
            buffer: Vec::with_capacity(8192),
            tokenizer: Tokenizer::new(decode_entities),
            finished: false,
        }
    }

    /// Append `chunk` and drain every complete construct into `sink`
    ///
    /// With `is_final` set, the document must be complete after this chunk.
    /// A `Flow::Stop` from the sink is returned as soon as it happens; the
    /// remaining input is left unread.
    pub fn feed<S: TokenSink>(&mut self, chunk: &[u8], is_final: bool, sink: &mut S) -> Result<Flow> {
        self.buffer.extend_from_slice(chunk);

        let scanned = self.tokenizer.scan(&self.buffer, is_final, sink)?;
        // drain moves the remaining bytes to the front without reallocating
        self.buffer.drain(..scanned.consumed);

        if scanned.flow == Flow::Stop {
            return Ok(Flow::Stop);
        }
        if is_final {
            self.tokenizer.finish(&self.buffer)?;
            self.finished = true;
        }
        Ok(Flow::Continue)
    }

    /// Bytes waiting for the rest of their construct
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// True when part of a construct is buffered
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Current element nesting depth
    pub fn depth(&self) -> usize {
        self.tokenizer.depth()
    }

    /// Absolute offset of the first buffered byte
    pub fn offset(&self) -> usize {
        self.tokenizer.offset()
    }

    /// True once a final chunk completed a well-formed document
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
