//! Frozen tree values
//!
//! A [`TreeValue`] is the immutable snapshot of one collected element and
//! everything below it. Children are grouped by element name; a name seen once
//! holds a single value, a name seen repeatedly holds all of them in document
//! order.

use crate::core::Attributes;
use indexmap::IndexMap;

/// Children sharing one element name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Slot<T> {
    /// Add another same-name child, promoting `One` to `Many` on the second
    pub fn push(&mut self, item: T) {
        match self {
            Slot::Many(items) => items.push(item),
            Slot::One(_) => {
                if let Slot::One(first) = std::mem::replace(self, Slot::Many(Vec::new())) {
                    *self = Slot::Many(vec![first, item]);
                }
            }
        }
    }

    /// First child in document order
    pub fn first(&self) -> Option<&T> {
        match self {
            Slot::One(item) => Some(item),
            Slot::Many(items) => items.first(),
        }
    }

    /// Children as a slice, one element for `One`
    pub fn as_slice(&self) -> &[T] {
        match self {
            Slot::One(item) => std::slice::from_ref(item),
            Slot::Many(items) => items,
        }
    }

    /// Iterate children in document order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Number of children in the slot
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Always false for slots built by the engine
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once a second same-name child promoted the slot
    pub fn is_many(&self) -> bool {
        matches!(self, Slot::Many(_))
    }

    /// Children in document order, taking ownership
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Slot::One(item) => vec![item],
            Slot::Many(items) => items,
        }
    }
}

impl<'a, T> IntoIterator for &'a Slot<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Immutable collected element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeValue {
    pub(crate) name: String,
    pub(crate) attributes: Attributes,
    /// Concatenated character data, `None` when the element had none
    pub(crate) value: Option<String>,
    pub(crate) cdata: Vec<String>,
    pub(crate) children: IndexMap<String, Slot<TreeValue>>,
}

impl TreeValue {
    /// Value without attributes or children, used for comments, PIs and loose text
    pub fn leaf(name: impl Into<String>, value: impl Into<String>) -> Self {
        TreeValue {
            name: name.into(),
            attributes: Attributes::new(),
            value: Some(value.into()),
            cdata: Vec::new(),
            children: IndexMap::new(),
        }
    }

    /// Element name (or `#comment`, `#text`, PI target for leaves)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in document order
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Value of one attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Concatenated character data, `None` when there was none
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// CDATA sections in document order
    pub fn cdata(&self) -> &[String] {
        &self.cdata
    }

    /// Children keyed by element name, in order of first appearance
    pub fn children(&self) -> &IndexMap<String, Slot<TreeValue>> {
        &self.children
    }

    /// Slot holding the children called `name`
    pub fn child(&self, name: &str) -> Option<&Slot<TreeValue>> {
        self.children.get(name)
    }

    /// All children called `name`, empty if there are none
    pub fn children_named(&self, name: &str) -> &[TreeValue] {
        self.children.get(name).map(Slot::as_slice).unwrap_or(&[])
    }

    /// True when at least one child element was collected
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Attach a finished child under its element name
    pub(crate) fn attach(&mut self, child: TreeValue) {
        match self.children.get_mut(&child.name) {
            Some(slot) => slot.push(child),
            None => {
                self.children.insert(child.name.clone(), Slot::One(child));
            }
        }
    }
}

/// Detach all children of a node, flattened in document order
pub(crate) fn take_children<T>(children: &mut IndexMap<String, Slot<T>>) -> impl Iterator<Item = T> {
    std::mem::take(children).into_values().flat_map(Slot::into_vec)
}

impl Drop for TreeValue {
    // Deep trees would otherwise recurse once per nesting level
    fn drop(&mut self) {
        if self.children.is_empty() {
            return;
        }
        let mut stack: Vec<TreeValue> = take_children(&mut self.children).collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(take_children(&mut node.children));
        }
    }
}
