//! Errors surfaced by the node model, the tree builder and the parser driver.

use crate::node::{NodeId, NodeType};
use std::error::Error;
use std::fmt;

/// Opaque error reported by the tokenizer.
///
/// The tree builder never creates these; it only forwards them to the
/// completion callback (or surfaces them through [`DomError::Parse`] when no
/// callback is registered).
#[derive(Debug)]
pub struct ParseError {
    source: Box<dyn Error + Send + Sync>,
    offset: Option<usize>,
}

impl ParseError {
    pub fn new(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self {
            source: source.into(),
            offset: None,
        }
    }

    /// Attach the byte offset at which the tokenizer noticed the problem.
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn get_ref(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.source
    }

    pub fn into_inner(self) -> Box<dyn Error + Send + Sync> {
        self.source
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} (at byte {offset})", self.source),
            None => write!(f, "{}", self.source),
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.source)
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum DomError {
    /// Clone was asked to copy a node kind the model has no representation for.
    UnsupportedKind(NodeType),
    /// `close_element` was called with only the document left open.
    UnbalancedClose,
    /// The id refers to a slot that was freed by [`crate::Dom::remove`].
    StaleNode(NodeId),
    /// The operation needs a node that can own children.
    NotAContainer(NodeId),
    /// The operation needs an element node.
    NotAnElement(NodeId),
    /// The operation needs a directive node.
    NotADirective(NodeId),
    /// The operation needs a text, comment or directive node.
    NoData(NodeId),
    /// Appending `child` under `parent` would create a cycle or move the root.
    HierarchyRequest { parent: NodeId, child: NodeId },
    /// The document root cannot be detached or removed.
    RootNode,
    /// Tokenizer error raised while no completion callback was registered.
    Parse(ParseError),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::UnsupportedKind(kind) => write!(f, "not implemented yet: {kind}"),
            DomError::UnbalancedClose => {
                f.write_str("close tag with no open element (only the document is on the stack)")
            }
            DomError::StaleNode(id) => write!(f, "node {id} no longer exists"),
            DomError::NotAContainer(id) => write!(f, "node {id} cannot have children"),
            DomError::NotAnElement(id) => write!(f, "node {id} is not an element"),
            DomError::NotADirective(id) => write!(f, "node {id} is not a directive"),
            DomError::NoData(id) => write!(f, "node {id} has no data payload"),
            DomError::HierarchyRequest { parent, child } => {
                write!(f, "cannot append node {child} under node {parent}")
            }
            DomError::RootNode => f.write_str("the document root cannot be detached"),
            DomError::Parse(err) => write!(f, "parse error: {err}"),
        }
    }
}

impl Error for DomError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DomError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for DomError {
    fn from(err: ParseError) -> Self {
        DomError::Parse(err)
    }
}
