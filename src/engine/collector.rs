//! Collection Engine
//!
//! Implements [`TokenSink`] to turn tokenizer events into collected trees.
//!
//! The engine is either idle or collecting one window. A window opens on the
//! first start tag whose path matches a node registration and closes on the
//! matching end tag, at which point the frozen tree goes to the callback.
//! Nested elements inside a window live on an explicit builder stack, so the
//! state survives between `feed` calls and nesting depth costs heap, not stack.
//!
//! ```text
//!   Idle --start(path matches)--> Collecting{root_path, [builder]}
//!   Collecting --start--> push builder
//!   Collecting --end(nested)--> pop builder, attach to parent
//!   Collecting --end(root_path)--> freeze, invoke callback --> Idle
//! ```

use crate::config::ParserConfig;
use crate::core::scanner::is_whitespace;
use crate::core::{Attributes, Flow, TokenSink};
use crate::error::{Error, Result};
use crate::registry::{CallbackRegistration, CallbackRegistry, NodeType, PathTracker};
use crate::value::{TreeBuilder, TreeValue};
use lru::LruCache;
use std::num::NonZeroUsize;

/// Leaf name for text delivered outside a collection window
pub const TEXT_NAME: &str = "#text";
/// Leaf name for CDATA delivered outside a collection window
pub const CDATA_NAME: &str = "#cdata";
/// Leaf name for comments
pub const COMMENT_NAME: &str = "#comment";

/// An open collection window
#[derive(Debug)]
struct Window {
    root_path: String,
    registration: CallbackRegistration,
    /// Open elements of the window, the window root at the bottom
    builders: Vec<TreeBuilder>,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Collecting(Window),
}

type MatchCache = LruCache<(NodeType, String), Option<CallbackRegistration>>;

/// Per-document engine state
pub struct Collector {
    path: PathTracker,
    state: State,
    /// Memoized registry lookups, keyed by node type and path
    cache: Option<MatchCache>,
    skip_whitespace: bool,
}

impl Collector {
    /// Idle collector sized from `config`
    pub fn new(config: &ParserConfig) -> Self {
        Collector {
            path: PathTracker::new(),
            state: State::Idle,
            cache: NonZeroUsize::new(config.match_cache_capacity).map(LruCache::new),
            skip_whitespace: config.skip_whitespace,
        }
    }

    /// Borrow the collector as a sink resolving matches against `callbacks`
    ///
    /// `offset` is the absolute byte offset of the input being drained, used
    /// in engine errors.
    pub fn sink<'a>(&'a mut self, callbacks: &'a CallbackRegistry, offset: usize) -> CollectorSink<'a> {
        CollectorSink {
            collector: self,
            callbacks,
            offset,
        }
    }

    /// Forget memoized lookups; required whenever the registry changes
    pub fn invalidate(&mut self) {
        if let Some(cache) = &mut self.cache {
            cache.clear();
        }
    }

    /// True while a collection window is open
    pub fn is_collecting(&self) -> bool {
        matches!(self.state, State::Collecting(_))
    }

    /// Path of the element currently open in the document
    pub fn current_path(&self) -> &str {
        self.path.current()
    }

    /// Check the engine ended idle once the document is complete
    pub fn finish(&self, offset: usize) -> Result<()> {
        match &self.state {
            State::Idle => Ok(()),
            State::Collecting(window) => Err(Error::malformed(
                format!("Input ended inside collection window {}", window.root_path),
                offset,
            )),
        }
    }

    fn lookup(&mut self, callbacks: &CallbackRegistry, node_type: NodeType) -> Option<CallbackRegistration> {
        let path = self.path.current();
        let Some(cache) = &mut self.cache else {
            return callbacks.find_for_path(path, node_type).cloned();
        };

        let key = (node_type, path.to_string());
        if let Some(hit) = cache.get(&key) {
            return hit.clone();
        }
        let found = callbacks.find_for_path(path, node_type).cloned();
        cache.put(key, found.clone());
        found
    }

    fn is_ignorable(&self, text: &str) -> bool {
        self.skip_whitespace && text.bytes().all(is_whitespace)
    }
}

/// [`TokenSink`] view of a [`Collector`] bound to one registry snapshot
pub struct CollectorSink<'a> {
    collector: &'a mut Collector,
    callbacks: &'a CallbackRegistry,
    offset: usize,
}

impl CollectorSink<'_> {
    /// Deliver a leaf value to the first registration of `node_type`, if any
    fn dispatch(&mut self, node_type: NodeType, leaf: impl FnOnce() -> TreeValue) -> Result<Flow> {
        let Some(registration) = self.collector.lookup(self.callbacks, node_type) else {
            return Ok(Flow::Continue);
        };
        registration.invoke(leaf()).map_err(|source| Error::Callback {
            path: self.collector.path.current().to_string(),
            source,
        })
    }

    fn close_window(&mut self) -> Result<Flow> {
        let Window {
            root_path,
            registration,
            mut builders,
        } = match std::mem::take(&mut self.collector.state) {
            State::Collecting(window) => window,
            State::Idle => return Ok(Flow::Continue),
        };

        if builders.len() != 1 {
            return Err(Error::malformed(
                format!("Collection window {} closed with {} open elements", root_path, builders.len()),
                self.offset,
            ));
        }
        let Some(root) = builders.pop() else {
            return Ok(Flow::Continue);
        };

        tracing::debug!(path = %root_path, "Closed collection window");
        registration
            .invoke(root.into_value())
            .map_err(|source| Error::Callback { path: root_path, source })
    }
}

impl TokenSink for CollectorSink<'_> {
    fn start_element(&mut self, name: &str, attributes: Attributes) -> Result<Flow> {
        self.collector.path.push(name);

        if let State::Collecting(window) = &mut self.collector.state {
            window.builders.push(TreeBuilder::new(name, attributes));
            return Ok(Flow::Continue);
        }

        if let Some(registration) = self.collector.lookup(self.callbacks, NodeType::Node) {
            let root_path = self.collector.path.current().to_string();
            tracing::debug!(path = %root_path, registered = registration.path(), "Opened collection window");
            self.collector.state = State::Collecting(Window {
                root_path,
                registration,
                builders: vec![TreeBuilder::new(name, attributes)],
            });
        }
        Ok(Flow::Continue)
    }

    fn end_element(&mut self, _name: &str) -> Result<Flow> {
        let closes_window = match &self.collector.state {
            State::Collecting(window) => window.root_path == self.collector.path.current(),
            State::Idle => false,
        };

        let result = if closes_window {
            self.close_window()
        } else if let State::Collecting(window) = &mut self.collector.state {
            match (window.builders.pop(), window.builders.last_mut()) {
                (Some(child), Some(parent)) => {
                    parent.add_child(child);
                    Ok(Flow::Continue)
                }
                _ => Err(Error::malformed(
                    format!("Collection window {} lost its root element", window.root_path),
                    self.offset,
                )),
            }
        } else {
            Ok(Flow::Continue)
        };

        // Pops after the window logic saw the pre-pop path
        self.collector.path.pop();
        result
    }

    fn text(&mut self, text: &str) -> Result<Flow> {
        if self.collector.is_ignorable(text) {
            return Ok(Flow::Continue);
        }
        if let State::Collecting(window) = &mut self.collector.state {
            if let Some(top) = window.builders.last_mut() {
                top.add_value(text);
            }
            return Ok(Flow::Continue);
        }
        self.dispatch(NodeType::Text, || TreeValue::leaf(TEXT_NAME, text))
    }

    fn cdata(&mut self, text: &str) -> Result<Flow> {
        if let State::Collecting(window) = &mut self.collector.state {
            if let Some(top) = window.builders.last_mut() {
                top.add_cdata(text);
            }
            return Ok(Flow::Continue);
        }
        self.dispatch(NodeType::Text, || TreeValue::leaf(CDATA_NAME, text))
    }

    fn comment(&mut self, text: &str) -> Result<Flow> {
        if self.collector.is_collecting() {
            return Ok(Flow::Continue);
        }
        self.dispatch(NodeType::Comment, || TreeValue::leaf(COMMENT_NAME, text))
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<Flow> {
        if self.collector.is_collecting() {
            return Ok(Flow::Continue);
        }
        self.dispatch(NodeType::ProcessingInstruction, || TreeValue::leaf(target, data))
    }
}
