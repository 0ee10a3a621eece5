//! SIMD-accelerated byte cursor using memchr
//!
//! The tokenizer only ever looks at one buffered region of input at a time;
//! `Scanner` walks that region and reports positions relative to its start.
//!
//! Delimiter searches for a construct starting at the cursor take a
//! [`Search`]. When the region ends before the delimiter, the search records
//! how far it got, and the next region (which starts with the same
//! construct) picks up from there instead of rescanning it.

use memchr::{memchr, memmem};

/// Progress of a delimiter search that ran out of input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Search {
    /// Bytes of the construct already examined
    scanned: usize,
    quote: Option<u8>,
    depth: usize,
}

impl Search {
    /// Bytes of the construct already examined
    pub fn scanned(&self) -> usize {
        self.scanned
    }
}

/// Cursor over a buffered input region
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Cursor at the start of `input`
    #[inline]
    pub fn new(input: &'a [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    /// Cursor position within the region
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Bytes from the cursor to the end of the region
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos.min(self.input.len())..]
    }

    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &'a [u8] {
        &self.input[start..end]
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    #[inline]
    pub fn starts_with(&self, needle: &[u8]) -> bool {
        self.remaining().starts_with(needle)
    }

    /// Next occurrence of `byte` at or after the cursor
    #[inline]
    pub fn find_byte(&self, byte: u8) -> Option<usize> {
        memchr(byte, self.remaining()).map(|i| self.pos + i)
    }

    /// Next occurrence of `byte` in the construct at the cursor
    pub fn resume_byte(&self, byte: u8, search: &mut Search) -> Option<usize> {
        let from = self.resume_from(search, 0);
        let found = memchr(byte, &self.input[from..]).map(|i| from + i);
        if found.is_none() {
            search.scanned = self.input.len() - self.pos;
        }
        found
    }

    /// Next occurrence of `needle` in the construct at the cursor, skipping
    /// its first `skip` bytes
    pub fn resume_needle(&self, skip: usize, needle: &[u8], search: &mut Search) -> Option<usize> {
        let from = self.resume_from(search, skip);
        let found = memmem::find(&self.input[from..], needle).map(|i| from + i);
        if found.is_none() {
            // a needle cut by the region end is searched again in full
            let keep = needle.len().saturating_sub(1);
            search.scanned = self.input.len().saturating_sub(keep).max(from) - self.pos;
        }
        found
    }

    /// Position of the `>` closing the tag at the cursor, skipping quoted `>`
    pub fn find_tag_end_quoted(&self, search: &mut Search) -> Option<usize> {
        let from = self.resume_from(search, 0);
        let mut quote = search.quote;
        for (i, &b) in self.input[from..].iter().enumerate() {
            match (quote, b) {
                (None, b'"') | (None, b'\'') => quote = Some(b),
                (Some(q), _) if q == b => quote = None,
                (None, b'>') => return Some(from + i),
                _ => {}
            }
        }
        search.quote = quote;
        search.scanned = self.input.len() - self.pos;
        None
    }

    /// Position of the `>` closing a DOCTYPE, honouring an internal `[...]` subset
    pub fn find_doctype_end(&self, search: &mut Search) -> Option<usize> {
        let from = self.resume_from(search, 0);
        let mut quote = search.quote;
        let mut depth = search.depth;
        for (i, &b) in self.input[from..].iter().enumerate() {
            match (quote, b) {
                (None, b'"') | (None, b'\'') => quote = Some(b),
                (Some(q), _) if q == b => quote = None,
                (None, b'[') => depth += 1,
                (None, b']') => depth = depth.saturating_sub(1),
                (None, b'>') if depth == 0 => return Some(from + i),
                _ => {}
            }
        }
        search.quote = quote;
        search.depth = depth;
        search.scanned = self.input.len() - self.pos;
        None
    }

    fn resume_from(&self, search: &Search, skip: usize) -> usize {
        (self.pos + search.scanned.max(skip)).min(self.input.len())
    }

    #[inline]
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if !is_whitespace(b) {
                break;
            }
            self.pos += 1;
        }
    }

    /// Read an XML name, or `None` when the cursor is not on a name start char
    pub fn read_name(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;
        if !is_name_start_char(self.peek()?) {
            return None;
        }
        self.pos += 1;
        while matches!(self.peek(), Some(b) if is_name_char(b)) {
            self.pos += 1;
        }
        Some(&self.input[start..self.pos])
    }
}

#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// ASCII letters, underscore, colon, and any non-ASCII (UTF-8) byte
#[inline]
pub fn is_name_start_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

#[inline]
pub fn is_name_char(b: u8) -> bool {
    is_name_start_char(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}
