//! Mutable tree accumulator
//!
//! The collection engine keeps one [`TreeBuilder`] per open element of the
//! current collection window and attaches finished builders to their parent.
//! Freezing turns a builder into a [`TreeValue`].

use super::tree::{take_children, Slot, TreeValue};
use crate::core::Attributes;
use indexmap::IndexMap;

/// Accumulates one element's content while it is being streamed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBuilder {
    name: String,
    attributes: Attributes,
    text: Vec<String>,
    cdata: Vec<String>,
    children: IndexMap<String, Slot<TreeBuilder>>,
}

impl TreeBuilder {
    /// Builder for an element that just opened
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
        TreeBuilder {
            name: name.into(),
            attributes,
            text: Vec::new(),
            cdata: Vec::new(),
            children: IndexMap::new(),
        }
    }

    /// Element name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes from the start tag
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Text chunks received so far, unmerged
    pub fn text_chunks(&self) -> &[String] {
        &self.text
    }

    /// CDATA sections received so far
    pub fn cdata_chunks(&self) -> &[String] {
        &self.cdata
    }

    /// Finished children keyed by element name
    pub fn children(&self) -> &IndexMap<String, Slot<TreeBuilder>> {
        &self.children
    }

    /// Append a character data chunk verbatim
    pub fn add_value(&mut self, text: impl Into<String>) {
        self.text.push(text.into());
    }

    /// Append a CDATA section
    pub fn add_cdata(&mut self, text: impl Into<String>) {
        self.cdata.push(text.into());
    }

    /// Attach a finished child under its element name
    pub fn add_child(&mut self, child: TreeBuilder) {
        match self.children.get_mut(&child.name) {
            Some(slot) => slot.push(child),
            None => {
                self.children.insert(child.name.clone(), Slot::One(child));
            }
        }
    }

    /// Snapshot the builder without consuming it
    pub fn freeze(&self) -> TreeValue {
        let mut stack: Vec<Frame<std::vec::IntoIter<&TreeBuilder>>> = Vec::new();
        let mut current = Frame::borrowed(self);
        loop {
            if let Some(child) = current.pending.next() {
                stack.push(std::mem::replace(&mut current, Frame::borrowed(child)));
                continue;
            }
            match stack.pop() {
                Some(mut parent) => {
                    parent.node.attach(current.node);
                    current = parent;
                }
                None => return current.node,
            }
        }
    }

    /// Consume the builder, moving its content into the frozen value
    pub fn into_value(self) -> TreeValue {
        let mut stack: Vec<Frame<std::vec::IntoIter<TreeBuilder>>> = Vec::new();
        let mut current = Frame::owned(self);
        loop {
            if let Some(child) = current.pending.next() {
                stack.push(std::mem::replace(&mut current, Frame::owned(child)));
                continue;
            }
            match stack.pop() {
                Some(mut parent) => {
                    parent.node.attach(current.node);
                    current = parent;
                }
                None => return current.node,
            }
        }
    }
}

impl Drop for TreeBuilder {
    // Deep windows would otherwise recurse once per nesting level
    fn drop(&mut self) {
        if self.children.is_empty() {
            return;
        }
        let mut stack: Vec<TreeBuilder> = take_children(&mut self.children).collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(take_children(&mut node.children));
        }
    }
}

/// One element of an explicit post-order walk: the value being built and
/// the children still to convert, in document order
struct Frame<I> {
    node: TreeValue,
    pending: I,
}

impl<'a> Frame<std::vec::IntoIter<&'a TreeBuilder>> {
    fn borrowed(builder: &'a TreeBuilder) -> Self {
        Frame {
            node: TreeValue {
                name: builder.name.clone(),
                attributes: builder.attributes.clone(),
                value: join_text(&builder.text),
                cdata: builder.cdata.clone(),
                children: IndexMap::new(),
            },
            pending: builder
                .children
                .values()
                .flat_map(Slot::iter)
                .collect::<Vec<_>>()
                .into_iter(),
        }
    }
}

impl Frame<std::vec::IntoIter<TreeBuilder>> {
    fn owned(mut builder: TreeBuilder) -> Self {
        Frame {
            node: TreeValue {
                value: join_text(&builder.text),
                name: std::mem::take(&mut builder.name),
                attributes: std::mem::take(&mut builder.attributes),
                cdata: std::mem::take(&mut builder.cdata),
                children: IndexMap::new(),
            },
            pending: take_children(&mut builder.children).collect::<Vec<_>>().into_iter(),
        }
    }
}

fn join_text(chunks: &[String]) -> Option<String> {
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.concat())
    }
}
