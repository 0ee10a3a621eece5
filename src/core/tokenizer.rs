//! Incremental XML Tokenizer
//!
//! Scans a buffered region of input and reports each complete construct to a
//! [`TokenSink`]. Scanning stops in front of the first construct that is not
//! complete yet (a tag cut in half, text not yet followed by markup), so the
//! caller can keep the unconsumed tail and retry once more bytes arrive.
//!
//! The tokenizer also enforces the well-formedness rules the collection engine
//! relies on: balanced and matching tags, a single root element, no character
//! data outside the root, valid UTF-8 and entity references.
//!
//! ```text
//! ChunkedReader --bytes--> Tokenizer --events--> TokenSink (Collector)
//! ```

use super::attributes::{parse_attributes, Attributes};
use super::entities::decode_text;
use super::scanner::{is_whitespace, Scanner, Search};
use crate::error::{Error, Result};

/// Whether the event consumer wants more events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    Stop,
}

/// Receiver of tokenizer events
///
/// Empty elements (`<br/>`) are reported as a start followed by an end.
pub trait TokenSink {
    fn start_element(&mut self, name: &str, attributes: Attributes) -> Result<Flow>;

    fn end_element(&mut self, name: &str) -> Result<Flow>;

    /// Character data between markup, entity references already decoded
    fn text(&mut self, text: &str) -> Result<Flow>;

    /// Content of a `<![CDATA[ ... ]]>` section, without the markers
    fn cdata(&mut self, text: &str) -> Result<Flow>;

    /// Content of a comment, without `<!--` and `-->`
    fn comment(&mut self, text: &str) -> Result<Flow>;

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<Flow>;
}

/// Outcome of one `scan` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scanned {
    /// Bytes of the region that were fully processed
    pub consumed: usize,
    pub flow: Flow,
}

enum Step {
    Done(Flow),
    Incomplete,
}

/// Stateful tokenizer; state survives between regions
#[derive(Debug)]
pub struct Tokenizer {
    /// Names of the currently open elements, outermost first
    open: Vec<String>,
    seen_root: bool,
    root_closed: bool,
    /// Absolute offset of the next region's first byte
    offset: usize,
    decode_entities: bool,
    /// Search progress into the construct the last region ended inside
    resume: Search,
}

impl Tokenizer {
    /// Tokenizer at the start of a document
    pub fn new(decode_entities: bool) -> Self {
        Tokenizer {
            open: Vec::with_capacity(16),
            seen_root: false,
            root_closed: false,
            offset: 0,
            decode_entities,
            resume: Search::default(),
        }
    }

    /// Current element nesting depth
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Absolute number of bytes consumed so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Scan `input`, reporting every complete construct to `sink`
    ///
    /// With `is_final` set, trailing text is complete even without a following `<`.
    ///
    /// `input` must start with the bytes the previous call left unconsumed.
    pub fn scan<S: TokenSink>(&mut self, input: &[u8], is_final: bool, sink: &mut S) -> Result<Scanned> {
        let mut scanner = Scanner::new(input);
        let mut search = std::mem::take(&mut self.resume);
        let mut consumed = 0;
        let mut flow = Flow::Continue;

        while !scanner.is_eof() {
            let start = scanner.position();
            let step = if scanner.peek() == Some(b'<') {
                self.scan_markup(&mut scanner, &mut search, sink)?
            } else {
                self.scan_text(&mut scanner, &mut search, is_final, sink)?
            };

            match step {
                Step::Incomplete => {
                    scanner.set_position(start);
                    self.resume = search;
                    break;
                }
                Step::Done(next) => {
                    search = Search::default();
                    consumed = scanner.position();
                    if next == Flow::Stop {
                        flow = Flow::Stop;
                        break;
                    }
                }
            }
        }

        self.offset += consumed;
        Ok(Scanned { consumed, flow })
    }

    /// Check that the document is complete once no more input will arrive
    pub fn finish(&self, remaining: &[u8]) -> Result<()> {
        if !remaining.is_empty() {
            return Err(Error::malformed("Unexpected end of input inside markup", self.offset));
        }
        if let Some(name) = self.open.last() {
            return Err(Error::malformed(format!("Unclosed element <{}>", name), self.offset));
        }
        if !self.seen_root {
            return Err(Error::malformed("No root element", self.offset));
        }
        Ok(())
    }

    fn scan_text<S: TokenSink>(
        &mut self,
        scanner: &mut Scanner<'_>,
        search: &mut Search,
        is_final: bool,
        sink: &mut S,
    ) -> Result<Step> {
        let start = scanner.position();
        let end = match scanner.resume_byte(b'<', search) {
            Some(end) => end,
            None if is_final => start + scanner.remaining().len(),
            None => return Ok(Step::Incomplete),
        };
        scanner.set_position(end);

        let raw = scanner.slice(start, end);
        if self.open.is_empty() {
            if raw.iter().all(|&b| is_whitespace(b)) {
                return Ok(Step::Done(Flow::Continue));
            }
            return Err(Error::malformed("Character data outside root element", self.offset + start));
        }

        let text = self.utf8(raw, start)?;
        let text = self.decode(text, start)?;
        sink.text(&text).map(Step::Done)
    }

    fn scan_markup<S: TokenSink>(&mut self, scanner: &mut Scanner<'_>, search: &mut Search, sink: &mut S) -> Result<Step> {
        let rest = scanner.remaining();
        match rest.get(1).copied() {
            None => Ok(Step::Incomplete),
            Some(b'/') => self.scan_end_tag(scanner, search, sink),
            Some(b'?') => self.scan_pi(scanner, search, sink),
            Some(b'!') => {
                let pending = [&b"<!--"[..], b"<![CDATA[", b"<!DOCTYPE"];
                if pending.iter().any(|pattern| is_prefix_pending(rest, pattern)) {
                    return Ok(Step::Incomplete);
                }
                if scanner.starts_with(b"<!--") {
                    self.scan_comment(scanner, search, sink)
                } else if scanner.starts_with(b"<![CDATA[") {
                    self.scan_cdata(scanner, search, sink)
                } else if scanner.starts_with(b"<!DOCTYPE") {
                    self.scan_doctype(scanner, search)
                } else {
                    Err(Error::malformed("Unsupported markup declaration", self.offset + scanner.position()))
                }
            }
            Some(_) => self.scan_start_tag(scanner, search, sink),
        }
    }

    fn scan_start_tag<S: TokenSink>(&mut self, scanner: &mut Scanner<'_>, search: &mut Search, sink: &mut S) -> Result<Step> {
        let start = scanner.position();
        let end = match scanner.find_tag_end_quoted(search) {
            Some(end) => end,
            None => return Ok(Step::Incomplete),
        };

        scanner.advance(1);
        let name = match scanner.read_name() {
            Some(name) => name,
            None => return Err(Error::malformed("Invalid element name", self.offset + start)),
        };
        let name = self.utf8(name, start)?.to_string();

        let mut body_end = end;
        let is_empty = end > start && scanner.slice(start, end).ends_with(b"/");
        if is_empty {
            body_end -= 1;
        }
        let body = scanner.slice(scanner.position(), body_end.max(scanner.position()));
        if !body.is_empty() && !is_whitespace(body[0]) {
            return Err(Error::malformed("Invalid element name", self.offset + start));
        }
        let attributes = parse_attributes(body, self.decode_entities)
            .map_err(|msg| Error::malformed(msg, self.offset + start))?;
        scanner.set_position(end + 1);

        if self.root_closed {
            return Err(Error::malformed("Content after root element", self.offset + start));
        }
        self.seen_root = true;
        self.open.push(name);

        let name = &self.open[self.open.len() - 1];
        if sink.start_element(name, attributes)? == Flow::Stop {
            return Ok(Step::Done(Flow::Stop));
        }
        if is_empty {
            return self.close_element(start, sink);
        }
        Ok(Step::Done(Flow::Continue))
    }

    fn scan_end_tag<S: TokenSink>(&mut self, scanner: &mut Scanner<'_>, search: &mut Search, sink: &mut S) -> Result<Step> {
        let start = scanner.position();
        let end = match scanner.resume_byte(b'>', search) {
            Some(end) => end,
            None => return Ok(Step::Incomplete),
        };

        scanner.advance(2);
        let name = scanner
            .read_name()
            .ok_or_else(|| Error::malformed("Invalid end tag", self.offset + start))?;
        scanner.skip_whitespace();
        if scanner.position() != end {
            return Err(Error::malformed("Invalid end tag", self.offset + start));
        }
        let name = self.utf8(name, start)?;
        scanner.set_position(end + 1);

        match self.open.last() {
            Some(expected) if expected == name => {}
            Some(expected) => {
                return Err(Error::malformed(
                    format!("Mismatched end tag: expected </{}>, found </{}>", expected, name),
                    self.offset + start,
                ))
            }
            None => {
                return Err(Error::malformed(
                    format!("Unexpected end tag </{}>", name),
                    self.offset + start,
                ))
            }
        }
        self.close_element(start, sink)
    }

    fn close_element<S: TokenSink>(&mut self, start: usize, sink: &mut S) -> Result<Step> {
        let name = self
            .open
            .pop()
            .ok_or_else(|| Error::malformed("Unexpected end tag", self.offset + start))?;
        if self.open.is_empty() {
            self.root_closed = true;
        }
        sink.end_element(&name).map(Step::Done)
    }

    fn scan_comment<S: TokenSink>(&mut self, scanner: &mut Scanner<'_>, search: &mut Search, sink: &mut S) -> Result<Step> {
        let start = scanner.position();
        let end = match scanner.resume_needle(4, b"-->", search) {
            Some(end) => end,
            None => return Ok(Step::Incomplete),
        };
        let content = self.utf8(scanner.slice(start + 4, end), start)?.to_string();
        scanner.set_position(end + 3);
        sink.comment(&content).map(Step::Done)
    }

    fn scan_cdata<S: TokenSink>(&mut self, scanner: &mut Scanner<'_>, search: &mut Search, sink: &mut S) -> Result<Step> {
        let start = scanner.position();
        let end = match scanner.resume_needle(9, b"]]>", search) {
            Some(end) => end,
            None => return Ok(Step::Incomplete),
        };
        if self.open.is_empty() {
            return Err(Error::malformed("CDATA section outside root element", self.offset + start));
        }
        let content = self.utf8(scanner.slice(start + 9, end), start)?.to_string();
        scanner.set_position(end + 3);
        sink.cdata(&content).map(Step::Done)
    }

    fn scan_pi<S: TokenSink>(&mut self, scanner: &mut Scanner<'_>, search: &mut Search, sink: &mut S) -> Result<Step> {
        let start = scanner.position();
        let end = match scanner.resume_needle(2, b"?>", search) {
            Some(end) => end,
            None => return Ok(Step::Incomplete),
        };

        scanner.advance(2);
        let target = scanner
            .read_name()
            .ok_or_else(|| Error::malformed("Invalid processing instruction target", self.offset + start))?;
        let target = self.utf8(target, start)?.to_string();
        let data_start = scanner.position().min(end);
        let data = self.utf8(scanner.slice(data_start, end), start)?.trim().to_string();
        scanner.set_position(end + 2);

        // XML declaration
        if target.eq_ignore_ascii_case("xml") {
            return Ok(Step::Done(Flow::Continue));
        }
        sink.processing_instruction(&target, &data).map(Step::Done)
    }

    fn scan_doctype(&mut self, scanner: &mut Scanner<'_>, search: &mut Search) -> Result<Step> {
        let start = scanner.position();
        let end = match scanner.find_doctype_end(search) {
            Some(end) => end,
            None => return Ok(Step::Incomplete),
        };
        if self.seen_root {
            return Err(Error::malformed("DOCTYPE after root element", self.offset + start));
        }
        scanner.set_position(end + 1);
        Ok(Step::Done(Flow::Continue))
    }

    fn utf8<'b>(&self, bytes: &'b [u8], at: usize) -> Result<&'b str> {
        std::str::from_utf8(bytes).map_err(|_| Error::malformed("Invalid UTF-8", self.offset + at))
    }

    fn decode<'b>(&self, text: &'b str, at: usize) -> Result<std::borrow::Cow<'b, str>> {
        if !self.decode_entities {
            return Ok(std::borrow::Cow::Borrowed(text));
        }
        decode_text(text).map_err(|msg| Error::malformed(msg, self.offset + at))
    }
}

/// True when `rest` is a strict prefix of `pattern`, i.e. more bytes are needed to decide
fn is_prefix_pending(rest: &[u8], pattern: &[u8]) -> bool {
    rest.len() < pattern.len() && pattern.starts_with(rest)
}
