//! Streaming Parser
//!
//! [`Parser`] owns everything one document needs: a registry snapshot, the
//! chunked reader with its tokenizer, and the collection engine. Input is
//! pushed with [`Parser::feed`] in caller-sized chunks, or read from a file
//! with [`Parser::feed_file`].
//!
//! The reader is released exactly once: after the final chunk, on an early
//! stop, or on the first error. Every later feed fails with
//! [`Error::Released`].

use super::collector::Collector;
use crate::config::ParserConfig;
use crate::core::Flow;
use crate::error::{ConfigError, Error, Result};
use crate::reader::{file, ChunkedReader};
use crate::registry::{CallbackRegistration, CallbackResult, Handler, NodeType, RegistrationId, Registry};
use crate::value::TreeValue;
use std::path::Path;

/// State of a parse after a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The chunk was drained; more input is expected
    NeedMore,
    /// The final chunk completed a well-formed document
    Finished,
    /// A callback asked to stop before the end of the document
    Stopped,
}

impl Progress {
    /// True when the parser will not accept more input
    pub fn is_done(&self) -> bool {
        !matches!(self, Progress::NeedMore)
    }
}

/// Streaming path dispatcher for one document
pub struct Parser {
    config: ParserConfig,
    registry: Registry,
    reader: Option<ChunkedReader>,
    collector: Collector,
}

impl Parser {
    /// Parser with the default configuration
    pub fn new(registry: Registry) -> Self {
        Self::build(registry, ParserConfig::default())
    }

    /// Parser with an explicit configuration, validated first
    pub fn with_config(registry: Registry, config: ParserConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(registry, config))
    }

    fn build(registry: Registry, config: ParserConfig) -> Self {
        Parser {
            reader: Some(ChunkedReader::new(config.decode_entities)),
            collector: Collector::new(&config),
            registry,
            config,
        }
    }

    /// Configuration the parser was built with
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Registry snapshot used for dispatch
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Swap in another registry; an open collection window keeps its callback
    pub fn set_registry(&mut self, registry: Registry) {
        self.registry = registry;
        self.collector.invalidate();
    }

    /// Register a callback and swap in the resulting registry
    pub fn register_callback<F>(&mut self, path: &str, node_type: NodeType, callback: F) -> std::result::Result<CallbackRegistration, ConfigError>
    where
        F: Fn(TreeValue) -> CallbackResult + Send + Sync + 'static,
    {
        let (registration, registry) = self.registry.register_callback(path, node_type, callback)?;
        self.set_registry(registry);
        Ok(registration)
    }

    /// Remove a callback and swap in the resulting registry
    pub fn unregister_callback(&mut self, registration: &CallbackRegistration) -> std::result::Result<(), ConfigError> {
        let registry = self.registry.unregister_callback(registration)?;
        self.set_registry(registry);
        Ok(())
    }

    /// Register a handler's declared callbacks under its content-addressed id
    pub fn register_handler<H: Handler>(&mut self, handler: H) -> std::result::Result<RegistrationId, ConfigError> {
        let (id, registry) = self.registry.register_handler(handler)?;
        self.set_registry(registry);
        Ok(id)
    }

    /// Remove a handler and every callback it declared
    pub fn unregister_handler(&mut self, id: &RegistrationId) -> std::result::Result<(), ConfigError> {
        let registry = self.registry.unregister_handler(id)?;
        self.set_registry(registry);
        Ok(())
    }

    /// Registered handler by id, downcast to its concrete type
    pub fn handler<H: Handler>(&self, id: &RegistrationId) -> Option<&H> {
        self.registry.handler::<H>(id)
    }

    /// True once the reader was released
    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }

    /// Push the next chunk of the document
    ///
    /// Every event the chunk completes is handled before this returns. Pass
    /// `is_final` with the last chunk (which may be empty).
    pub fn feed(&mut self, chunk: &[u8], is_final: bool) -> Result<Progress> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(Error::Released);
        };
        if self.registry.is_empty() {
            return Err(ConfigError::NoCallbacks.into());
        }

        tracing::trace!(len = chunk.len(), is_final, buffered = reader.buffer_size(), "Feeding chunk");
        let mut sink = self.collector.sink(self.registry.callback_registry(), reader.offset());
        let outcome = match reader.feed(chunk, is_final, &mut sink) {
            Ok(Flow::Continue) if is_final => self.collector.finish(reader.offset()).map(|_| Flow::Continue),
            other => other,
        };

        match outcome {
            Ok(Flow::Continue) if !is_final => Ok(Progress::NeedMore),
            Ok(Flow::Continue) => {
                self.release();
                Ok(Progress::Finished)
            }
            Ok(Flow::Stop) => {
                tracing::debug!(path = self.collector.current_path(), "Parse stopped by callback");
                self.release();
                Ok(Progress::Stopped)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Parse aborted");
                self.release();
                Err(err)
            }
        }
    }

    /// [`Parser::feed`] for string input
    pub fn feed_str(&mut self, chunk: &str, is_final: bool) -> Result<Progress> {
        self.feed(chunk.as_bytes(), is_final)
    }

    /// Parse a whole file, gzip-decompressed when it ends in `.gz`
    ///
    /// Reads `read_buffer` bytes at a time. Returns `Finished` or `Stopped`.
    pub fn feed_file(&mut self, path: impl AsRef<Path>) -> Result<Progress> {
        let path = path.as_ref();
        if self.reader.is_none() {
            return Err(Error::Released);
        }
        if self.registry.is_empty() {
            return Err(ConfigError::NoCallbacks.into());
        }

        let mut source = match file::open_source(path) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(error = %err, "Parse aborted");
                self.release();
                return Err(err);
            }
        };

        let mut buf = vec![0u8; self.config.read_buffer];
        loop {
            let n = match file::read_chunk(source.as_mut(), &mut buf, path) {
                Ok(n) => n,
                Err(err) => {
                    tracing::warn!(error = %err, "Parse aborted");
                    self.release();
                    return Err(err);
                }
            };
            match self.feed(&buf[..n], n == 0)? {
                Progress::NeedMore => continue,
                done => return Ok(done),
            }
        }
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            tracing::debug!(pending = reader.buffer_size(), "Released reader");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallbackError;
    use crate::registry::Declaration;
    use crate::value::Slot;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<TreeValue>>>;

    fn collect_into(seen: &Seen) -> impl Fn(TreeValue) -> CallbackResult + Send + Sync + 'static {
        let seen = Arc::clone(seen);
        move |value| {
            seen.lock().unwrap().push(value);
            Ok(Flow::Continue)
        }
    }

    fn with_callback(registry: &Registry, path: &str) -> (Registry, Seen) {
        let seen = Seen::default();
        let (_, registry) = registry
            .register_callback(path, NodeType::Node, collect_into(&seen))
            .unwrap();
        (registry, seen)
    }

    fn parse(registry: &Registry, doc: &str) -> Result<Progress> {
        Parser::new(registry.clone()).feed_str(doc, true)
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("xmlcollect-parser-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_single_match() {
        let (registry, seen) = with_callback(&Registry::new(), "/root/user");
        assert_eq!(parse(&registry, r#"<root><user name="x"/></root>"#).unwrap(), Progress::Finished);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name(), "user");
        assert_eq!(seen[0].attribute("name"), Some("x"));
        assert_eq!(seen[0].attributes().len(), 1);
        assert!(seen[0].children().is_empty());
    }

    #[test]
    fn test_nested_registration_not_reentered() {
        let (registry, users) = with_callback(&Registry::new(), "/root/user");
        let (registry, addresses) = with_callback(&registry, "/root/user/address");
        parse(&registry, "<root><user><address>x</address></user></root>").unwrap();

        let users = users.lock().unwrap();
        assert_eq!(users.len(), 1);
        assert!(addresses.lock().unwrap().is_empty());
        assert_eq!(users[0].children_named("address")[0].value(), Some("x"));
    }

    #[test]
    fn test_children_promotion() {
        let (registry, seen) = with_callback(&Registry::new(), "/root");
        parse(&registry, "<root><user/><user/></root>").unwrap();

        let seen = seen.lock().unwrap();
        let users = seen[0].child("user").unwrap();
        assert!(matches!(users, Slot::Many(items) if items.len() == 2));
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let doc = "<root><user/></root>";
        let (registry, _) = with_callback(&Registry::new(), "/unrelated");
        let seen = Seen::default();
        let (reg, registry) = registry
            .register_callback("/root/user", NodeType::Node, collect_into(&seen))
            .unwrap();
        parse(&registry, doc).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);

        let registry = registry.unregister_callback(&reg).unwrap();
        parse(&registry, doc).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);

        let (_, registry) = registry
            .register_callback("/root/user", NodeType::Node, collect_into(&seen))
            .unwrap();
        parse(&registry, doc).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    struct PathHandler {
        path: &'static str,
    }

    impl Handler for PathHandler {
        fn declare(&self, declaration: Declaration) -> std::result::Result<Declaration, ConfigError> {
            declaration.on(self.path, NodeType::Node, |_| Ok(Flow::Continue))
        }
    }

    #[test]
    fn test_handler_identity_dedup() {
        let mut parser = Parser::new(Registry::new());
        let first = parser.register_handler(PathHandler { path: "/root/user" }).unwrap();

        let err = parser
            .register_handler(PathHandler { path: "/root/user" })
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateHandler { id: first.to_string() });

        let other = parser.register_handler(PathHandler { path: "/root/group" }).unwrap();
        assert_ne!(first, other);
        assert_eq!(parser.handler::<PathHandler>(&other).map(|h| h.path), Some("/root/group"));

        parser.unregister_handler(&first).unwrap();
        assert!(parser.handler::<PathHandler>(&first).is_none());
        assert_eq!(parser.registry().callbacks().count(), 1);
    }

    #[test]
    fn test_malformed_input_releases() {
        let (registry, _) = with_callback(&Registry::new(), "/root/user");
        let mut parser = Parser::new(registry);
        let err = parser.feed_str("<root><user></root>", true).unwrap_err();

        assert!(err.is_malformed());
        assert!(parser.is_released());
        assert!(matches!(parser.feed_str("<root/>", true), Err(Error::Released)));
    }

    #[test]
    fn test_whitespace_only_text_ignored() {
        let (registry, seen) = with_callback(&Registry::new(), "/root/user");
        parse(&registry, "<root><user>\n  \n</user></root>").unwrap();
        assert_eq!(seen.lock().unwrap()[0].value(), None);
    }

    #[test]
    fn test_prefix_match_is_not_segment_aware() {
        // "/root/us" is a string prefix of "/root/user", so it matches
        let (registry, seen) = with_callback(&Registry::new(), "/root/us");
        parse(&registry, "<root><user/><other/></root>").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name(), "user");
    }

    #[test]
    fn test_first_registration_wins() {
        let (registry, outer) = with_callback(&Registry::new(), "/root");
        let (registry, inner) = with_callback(&registry, "/root/user");
        parse(&registry, "<root><user/></root>").unwrap();
        assert_eq!(outer.lock().unwrap().len(), 1);
        assert!(inner.lock().unwrap().is_empty());
    }

    #[test]
    fn test_deeply_nested_window() {
        const DEPTH: usize = 100_000;
        let depth = Arc::new(Mutex::new(0));
        let seen = Arc::clone(&depth);
        let mut parser = Parser::new(Registry::new());
        parser
            .register_callback("/r", NodeType::Node, move |root| {
                let mut levels = 0;
                let mut node = &root;
                while let Some(child) = node.child("a").and_then(Slot::first) {
                    levels += 1;
                    node = child;
                }
                *seen.lock().unwrap() = levels;
                Ok(Flow::Continue)
            })
            .unwrap();

        let doc = format!("<r>{}{}</r>", "<a>".repeat(DEPTH), "</a>".repeat(DEPTH));
        assert_eq!(parser.feed_str(&doc, true).unwrap(), Progress::Finished);
        assert_eq!(*depth.lock().unwrap(), DEPTH);
    }

    #[test]
    fn test_large_text_in_small_chunks() {
        let (registry, seen) = with_callback(&Registry::new(), "/r/t");
        let mut parser = Parser::new(registry);
        let text = "lorem ipsum ".repeat(2 * 1024 * 1024 / 12);
        let doc = format!("<r><t>{}</t></r>", text);

        for chunk in doc.as_bytes().chunks(64) {
            assert_eq!(parser.feed(chunk, false).unwrap(), Progress::NeedMore);
        }
        assert_eq!(parser.feed(b"", true).unwrap(), Progress::Finished);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value().map(str::len), Some(text.len()));
    }

    #[test]
    fn test_repeated_windows() {
        let (registry, seen) = with_callback(&Registry::new(), "/feed/entry");
        let doc = "<feed><entry>a</entry><entry>b<x/></entry><meta/><entry>c</entry></feed>";
        parse(&registry, doc).unwrap();

        let values: Vec<_> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|v| v.value().unwrap_or_default().to_string())
            .collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_text_chunks_concatenate() {
        let (registry, seen) = with_callback(&Registry::new(), "/a");
        parse(&registry, "<a>one<b/>two<![CDATA[raw]]>three</a>").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].value(), Some("onetwothree"));
        assert_eq!(seen[0].cdata(), &["raw".to_string()]);
    }

    #[test]
    fn test_entities_decoded() {
        let (registry, seen) = with_callback(&Registry::new(), "/root/user");
        parse(&registry, r#"<root><user name="a &amp; b">x &lt; y</user></root>"#).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].attribute("name"), Some("a & b"));
        assert_eq!(seen[0].value(), Some("x < y"));
    }

    #[test]
    fn test_entities_kept_when_disabled() {
        let (registry, seen) = with_callback(&Registry::new(), "/root");
        let config = ParserConfig::default().with_decode_entities(false);
        let mut parser = Parser::with_config(registry, config).unwrap();
        parser.feed_str("<root>x &lt; y</root>", true).unwrap();
        assert_eq!(seen.lock().unwrap()[0].value(), Some("x &lt; y"));
    }

    #[test]
    fn test_chunked_feed() {
        let (registry, seen) = with_callback(&Registry::new(), "/root/user");
        let mut parser = Parser::new(registry);

        assert_eq!(parser.feed_str("<root><us", false).unwrap(), Progress::NeedMore);
        assert_eq!(parser.feed_str("er id=\"1\">te", false).unwrap(), Progress::NeedMore);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(parser.feed_str("xt</user></root>", false).unwrap(), Progress::NeedMore);
        assert_eq!(seen.lock().unwrap()[0].value(), Some("text"));
        assert_eq!(parser.feed(b"", true).unwrap(), Progress::Finished);
        assert!(parser.is_released());
    }

    #[test]
    fn test_early_stop() {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let mut parser = Parser::new(Registry::new());
        parser
            .register_callback("/root/item", NodeType::Node, move |_| {
                *counter.lock().unwrap() += 1;
                Ok(Flow::Stop)
            })
            .unwrap();

        let progress = parser.feed_str("<root><item/><item/><item/>", false).unwrap();
        assert_eq!(progress, Progress::Stopped);
        assert!(progress.is_done());
        assert_eq!(*count.lock().unwrap(), 1);
        assert!(matches!(parser.feed_str("</root>", true), Err(Error::Released)));
    }

    #[test]
    fn test_callback_error() {
        let mut parser = Parser::new(Registry::new());
        parser
            .register_callback("/root/user", NodeType::Node, |_| {
                let err: CallbackError = "bad user".into();
                Err(err)
            })
            .unwrap();

        let err = parser.feed_str("<root><user/></root>", true).unwrap_err();
        assert!(err.is_callback());
        assert!(!err.is_malformed());
        assert!(matches!(&err, Error::Callback { path, .. } if path == "/root/user"));
        assert!(parser.is_released());
    }

    #[test]
    fn test_panicking_callback_releases() {
        let mut parser = Parser::new(Registry::new());
        parser
            .register_callback("/root/user", NodeType::Node, |_| -> CallbackResult { panic!("boom") })
            .unwrap();

        let err = parser.feed_str("<root><user/></root>", true).unwrap_err();
        assert!(err.is_callback());
        assert!(err.to_string().contains("/root/user"));
        assert!(parser.is_released());
        assert!(matches!(parser.feed_str("", true), Err(Error::Released)));
    }

    #[test]
    fn test_no_callbacks() {
        let mut parser = Parser::new(Registry::new());
        let err = parser.feed_str("<root/>", true).unwrap_err();
        assert!(matches!(err, Error::Configuration(ConfigError::NoCallbacks)));
        assert!(!parser.is_released());
    }

    #[test]
    fn test_invalid_read_buffer() {
        let config = ParserConfig::default().with_read_buffer(0);
        let err = Parser::with_config(Registry::new(), config).err();
        assert_eq!(err, Some(ConfigError::InvalidReadBuffer(0)));
    }

    #[test]
    fn test_wildcard_comments() {
        let seen = Seen::default();
        let (_, registry) = Registry::new()
            .register_callback("*", NodeType::Comment, collect_into(&seen))
            .unwrap();
        parse(&registry, "<!--head--><root><!--body--></root>").unwrap();

        let seen = seen.lock().unwrap();
        let comments: Vec<_> = seen.iter().filter_map(TreeValue::value).collect();
        assert_eq!(comments, vec!["head", "body"]);
    }

    #[test]
    fn test_processing_instruction_dispatch() {
        let seen = Seen::default();
        let (_, registry) = Registry::new()
            .register_callback("/root", NodeType::ProcessingInstruction, collect_into(&seen))
            .unwrap();
        parse(&registry, "<root><?render fast mode?></root>").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].name(), "render");
        assert_eq!(seen[0].value(), Some("fast mode"));
    }

    #[test]
    fn test_text_dispatch_outside_window() {
        let seen = Seen::default();
        let (_, registry) = Registry::new()
            .register_callback("/root", NodeType::Text, collect_into(&seen))
            .unwrap();
        parse(&registry, "<root>hello<a/>world</root>").unwrap();

        let seen = seen.lock().unwrap();
        let texts: Vec<_> = seen.iter().filter_map(TreeValue::value).collect();
        assert_eq!(texts, vec!["hello", "world"]);
        assert!(seen.iter().all(|v| v.name() == "#text"));
    }

    #[test]
    fn test_registry_swap_mid_parse() {
        let (registry, first) = with_callback(&Registry::new(), "/root/a");
        let mut parser = Parser::new(registry);
        parser.feed_str("<root><a/>", false).unwrap();

        let (registry, second) = with_callback(&Registry::new(), "/root/a");
        parser.set_registry(registry);
        parser.feed_str("<a/></root>", true).unwrap();

        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_feed_gzip_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let path = temp_path("users.xml.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(br#"<root><user id="1"/><user id="2"/></root>"#)
            .unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let (registry, seen) = with_callback(&Registry::new(), "/root/user");
        let config = ParserConfig::default().with_read_buffer(5);
        let mut parser = Parser::with_config(registry, config).unwrap();
        let progress = parser.feed_file(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(progress.unwrap(), Progress::Finished);
        let ids: Vec<_> = seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|v| v.attribute("id").map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_feed_missing_file() {
        let (registry, _) = with_callback(&Registry::new(), "/root");
        let mut parser = Parser::new(registry);
        let err = parser.feed_file(temp_path("missing.xml")).unwrap_err();
        assert!(err.is_resource());
        assert!(parser.is_released());
    }

    mod chunking {
        use super::*;
        use proptest::prelude::*;

        const DOC: &str = "<?xml version=\"1.0\"?>\n<feed xmlns=\"urn:x\">\n  <entry id=\"1\">caf\u{e9} &amp; cr\u{e8}me<tag/><tag>t</tag></entry>\n  <!-- skip -->\n  <entry id=\"2\"><![CDATA[<raw>]]>tail</entry>\n</feed>\n";

        fn run(splits: &[usize]) -> Vec<TreeValue> {
            let (registry, seen) = with_callback(&Registry::new(), "/feed/entry");
            let mut parser = Parser::new(registry);
            let bytes = DOC.as_bytes();
            let mut start = 0;
            for &split in splits {
                parser.feed(&bytes[start..split], false).unwrap();
                start = split;
            }
            parser.feed(&bytes[start..], true).unwrap();
            let values = seen.lock().unwrap().clone();
            values
        }

        proptest! {
            #[test]
            fn test_chunk_boundaries_do_not_matter(mut splits in prop::collection::vec(0..DOC.len(), 0..8)) {
                splits.sort_unstable();
                splits.dedup();
                let whole = run(&[]);
                prop_assert_eq!(whole.len(), 2);
                prop_assert_eq!(run(&splits), whole);
            }
        }
    }
}
