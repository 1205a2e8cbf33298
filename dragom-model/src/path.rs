// Node paths — positions in the classification/module tree.
//
// A path is an ordered list of node names. A *partial* path denotes a
// classification node; a *complete* path denotes a module (its last segment
// names a leaf). The literal form joins segments with `/`, with a trailing
// `/` marking a partial path: `Domain/SubDomain/` is a classification node,
// `Domain/SubDomain/my-module` is a module.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error parsing a node path literal.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NodePathParseError {
    #[error("empty node name in path {0:?}")]
    EmptySegment(String),

    #[error("invalid node name {name:?} in path {path:?}")]
    InvalidSegment { path: String, name: String },
}

/// A position in the classification/module tree.
///
/// Immutable value type with structural equality. The root classification
/// node is the empty partial path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NodePath {
    segments: Vec<String>,
    partial: bool,
}

impl NodePath {
    /// The root classification node (empty partial path).
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
            partial: true,
        }
    }

    /// Build a partial path (classification node) from segments.
    pub fn partial<I, S>(segments: I) -> Result<Self, NodePathParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(segments, true)
    }

    /// Build a complete path (module) from segments. The segment list must
    /// be non-empty: the root is a classification node, never a module.
    pub fn module<I, S>(segments: I) -> Result<Self, NodePathParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = Self::build(segments, false)?;
        if path.segments.is_empty() {
            return Err(NodePathParseError::EmptySegment(String::new()));
        }
        Ok(path)
    }

    fn build<I, S>(segments: I, partial: bool) -> Result<Self, NodePathParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        for name in &segments {
            check_name(name).map_err(|()| NodePathParseError::InvalidSegment {
                path: segments.join("/"),
                name: name.clone(),
            })?;
        }
        Ok(Self { segments, partial })
    }

    /// True if this path denotes a classification node.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment, or `None` for the root path.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent path (always partial). `None` for the root path.
    pub fn parent(&self) -> Option<NodePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(NodePath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            partial: true,
        })
    }

    /// Extend a partial path with a child classification node name.
    pub fn child_partial(&self, name: &str) -> Result<NodePath, NodePathParseError> {
        self.extend(name, true)
    }

    /// Extend a partial path with a module name, yielding a complete path.
    pub fn child_module(&self, name: &str) -> Result<NodePath, NodePathParseError> {
        self.extend(name, false)
    }

    fn extend(&self, name: &str, partial: bool) -> Result<NodePath, NodePathParseError> {
        check_name(name).map_err(|()| NodePathParseError::InvalidSegment {
            path: self.to_string(),
            name: name.to_string(),
        })?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(NodePath { segments, partial })
    }

    /// Dotted form of the segments, used for init-property override keys.
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    /// Unvalidated constructor for diagnostics paths built from node names
    /// already held by the model.
    pub(crate) fn from_parts(segments: Vec<String>, partial: bool) -> Self {
        Self { segments, partial }
    }
}

/// Whether `name` is a well-formed node name.
pub(crate) fn is_valid_name(name: &str) -> bool {
    check_name(name).is_ok()
}

/// Node names: ASCII alphanumeric first character, then alphanumerics,
/// `-`, `_` and `.`.
fn check_name(name: &str) -> Result<(), ()> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return Err(()),
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
        Ok(())
    } else {
        Err(())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))?;
        if self.partial {
            write!(f, "/")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for NodePath {
    type Err = NodePathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "/" and "" both denote the root partial path.
        if s.is_empty() || s == "/" {
            return Ok(Self::root());
        }
        let (body, partial) = match s.strip_suffix('/') {
            Some(body) => (body, true),
            None => (s, false),
        };
        let segments: Vec<&str> = body.split('/').collect();
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(NodePathParseError::EmptySegment(s.to_string()));
        }
        Self::build(segments, partial)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for NodePath {
    type Error = NodePathParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_round_trip() {
        let root = NodePath::root();
        assert!(root.is_partial());
        assert!(root.is_empty());
        assert_eq!(root.to_string(), "/");
        assert_eq!("/".parse::<NodePath>().unwrap(), root);
        assert_eq!("".parse::<NodePath>().unwrap(), root);
    }

    #[test]
    fn partial_and_complete_literals() {
        let partial: NodePath = "Domain/Sub/".parse().unwrap();
        assert!(partial.is_partial());
        assert_eq!(partial.segments(), ["Domain", "Sub"]);
        assert_eq!(partial.to_string(), "Domain/Sub/");

        let complete: NodePath = "Domain/Sub/my-module".parse().unwrap();
        assert!(!complete.is_partial());
        assert_eq!(complete.name(), Some("my-module"));
        assert_eq!(complete.to_string(), "Domain/Sub/my-module");
    }

    #[test]
    fn parent_chain() {
        let path: NodePath = "a/b/c".parse().unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.to_string(), "a/b/");
        assert_eq!(parent.parent().unwrap().to_string(), "a/");
        assert_eq!(parent.parent().unwrap().parent(), Some(NodePath::root()));
        assert_eq!(NodePath::root().parent(), None);
    }

    #[test]
    fn rejects_bad_segments() {
        assert!("a//b".parse::<NodePath>().is_err());
        assert!("-leading/x".parse::<NodePath>().is_err());
        assert!("has space/x".parse::<NodePath>().is_err());
        assert!(NodePath::module(Vec::<String>::new()).is_err());
    }

    #[test]
    fn dotted_form() {
        let path: NodePath = "a/b/c".parse().unwrap();
        assert_eq!(path.dotted(), "a.b.c");
    }
}
