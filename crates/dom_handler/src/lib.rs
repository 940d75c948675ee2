//! Event-driven DOM construction.
//!
//! A markup tokenizer reports lexical events through [`Handler`]; the
//! [`DomHandler`] turns them into an arena-backed [`Dom`] with text/comment
//! coalescing, optional source indices and whitespace normalization.
//! [`Parser`] is the streaming driver that feeds a handler from chunks.

pub mod dom;
pub mod dom_handler;
pub mod dom_invariants;
#[cfg(any(test, feature = "dom-snapshot"))]
pub mod dom_snapshot;
pub mod error;
pub mod handler;
pub mod level1;
pub mod node;
pub mod parser;
pub mod tokenizer;

#[cfg(test)]
mod chunker;
#[cfg(test)]
mod streaming_parity;
#[cfg(test)]
pub mod test_harness;

pub use crate::dom::{Descendants, Dom, NodeRef};
pub use crate::dom_handler::{
    BuilderStats, ClosedElement, CompletionCallback, DomHandler, DomHandlerOptions,
    ElementCallback,
};
pub use crate::dom_invariants::{InvariantViolation, check_tree};
pub use crate::error::{DomError, ParseError};
pub use crate::handler::{Handler, SourcePosition, Span};
pub use crate::level1::{Level1, Level1Attribute};
pub use crate::node::{
    Attributes, DirectiveData, DoctypeIds, DocumentData, ElementData, ElementKind, NodeData,
    NodeId, NodeKind, NodeType, QuirksMode, SourceRange,
};
pub use crate::parser::{Parser, ParserOptions, parse_document, parse_document_chunked};
pub use crate::tokenizer::{StartTag, TokenSink, Tokenizer};
