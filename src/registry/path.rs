//! Document paths
//!
//! A path is the chain of element names from the document root, rendered as
//! `/root/user/address`. The leading `/` stands for the empty root segment.

use std::fmt;

/// Path that matches every document path of its node type
pub const WILDCARD: &str = "*";

/// Event kind a registration listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Element start; the whole subtree is collected
    Node,
    Text,
    Comment,
    ProcessingInstruction,
}

impl NodeType {
    /// Name used in registration identities
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Node => "node",
            NodeType::Text => "text",
            NodeType::Comment => "comment",
            NodeType::ProcessingInstruction => "processing-instruction",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when a registration at `registered` applies to `current`
///
/// This is a raw string-prefix test, not a segment test: `/root/us` matches
/// `/root/user`.
pub fn matches(registered: &str, current: &str) -> bool {
    registered == WILDCARD || current.starts_with(registered)
}

/// Stack of open element names with the rendered path kept in sync
#[derive(Debug, Default, Clone)]
pub struct PathTracker {
    segments: Vec<String>,
    /// Byte length of `rendered` before each segment was pushed
    marks: Vec<usize>,
    rendered: String,
}

impl PathTracker {
    /// Tracker at the document root
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter an element
    pub fn push(&mut self, name: &str) {
        self.marks.push(self.rendered.len());
        self.rendered.push('/');
        self.rendered.push_str(name);
        self.segments.push(name.to_string());
    }

    /// Remove the innermost segment and return it
    pub fn pop(&mut self) -> Option<String> {
        let mark = self.marks.pop()?;
        self.rendered.truncate(mark);
        self.segments.pop()
    }

    /// Canonical path of the current position, `""` outside the root
    pub fn current(&self) -> &str {
        &self.rendered
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Open element names, outermost first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Innermost open element
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut path = PathTracker::new();
        assert_eq!(path.current(), "");

        path.push("root");
        path.push("user");
        assert_eq!(path.current(), "/root/user");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.last(), Some("user"));

        assert_eq!(path.pop().as_deref(), Some("user"));
        assert_eq!(path.current(), "/root");
        path.push("group");
        assert_eq!(path.current(), "/root/group");
        assert_eq!(path.segments(), &["root".to_string(), "group".to_string()]);
    }

    #[test]
    fn test_pop_empty() {
        let mut path = PathTracker::new();
        assert_eq!(path.pop(), None);
        assert_eq!(path.current(), "");
    }

    #[test]
    fn test_prefix_matching() {
        assert!(matches("/root/user", "/root/user"));
        assert!(matches("/root/user", "/root/user/address"));
        assert!(!matches("/root/user", "/root"));
        assert!(matches("/root/us", "/root/user"));
        assert!(matches(WILDCARD, "/anything"));
    }

    #[test]
    fn test_node_type_display() {
        assert_eq!(NodeType::Node.to_string(), "node");
        assert_eq!(NodeType::Text.to_string(), "text");
        assert_eq!(NodeType::Comment.to_string(), "comment");
        assert_eq!(NodeType::ProcessingInstruction.to_string(), "processing-instruction");
    }
}
