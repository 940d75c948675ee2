//! Event protocol between a markup tokenizer and a tree consumer.

use crate::error::{DomError, ParseError};
use crate::node::Attributes;
use std::cell::Cell;
use std::rc::Rc;

/// Byte span of the lexical unit currently being reported.
///
/// `start` is the offset of its first byte. `end` is the offset of its last
/// byte for complete constructs, or the consumed length for elements closed
/// implicitly at end of input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start must be <= end");
        Self { start, end }
    }
}

/// Shared handle the tokenizer updates before each event and the tree
/// builder reads when index tracking is enabled.
///
/// Cloning yields another handle to the same position.
#[derive(Clone, Debug, Default)]
pub struct SourcePosition(Rc<Cell<Span>>);

impl SourcePosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, span: Span) {
        self.0.set(span);
    }

    pub fn span(&self) -> Span {
        self.0.get()
    }

    pub fn start_index(&self) -> usize {
        self.0.get().start
    }

    pub fn end_index(&self) -> usize {
        self.0.get().end
    }
}

/// Receiver of tokenizer events, one call per lexical unit.
///
/// Every method has a no-op default so partial consumers (loggers, counters)
/// only implement what they need. The default `on_error` surfaces the error.
pub trait Handler {
    fn on_parser_init(&mut self, _position: SourcePosition) {}

    fn on_reset(&mut self) {}

    fn on_end(&mut self) {}

    fn on_error(&mut self, error: ParseError) -> Result<(), DomError> {
        Err(DomError::Parse(error))
    }

    fn on_open_tag(&mut self, _name: &str, _attribs: Attributes) {}

    fn on_close_tag(&mut self) -> Result<(), DomError> {
        Ok(())
    }

    fn on_text(&mut self, _data: &str) {}

    fn on_comment(&mut self, _data: &str) {}

    fn on_comment_end(&mut self) {}

    fn on_cdata_start(&mut self) {}

    fn on_cdata_end(&mut self) {}

    fn on_processing_instruction(&mut self, _name: &str, _data: &str) {}
}

impl<H: Handler + ?Sized> Handler for &mut H {
    fn on_parser_init(&mut self, position: SourcePosition) {
        (**self).on_parser_init(position);
    }

    fn on_reset(&mut self) {
        (**self).on_reset();
    }

    fn on_end(&mut self) {
        (**self).on_end();
    }

    fn on_error(&mut self, error: ParseError) -> Result<(), DomError> {
        (**self).on_error(error)
    }

    fn on_open_tag(&mut self, name: &str, attribs: Attributes) {
        (**self).on_open_tag(name, attribs);
    }

    fn on_close_tag(&mut self) -> Result<(), DomError> {
        (**self).on_close_tag()
    }

    fn on_text(&mut self, data: &str) {
        (**self).on_text(data);
    }

    fn on_comment(&mut self, data: &str) {
        (**self).on_comment(data);
    }

    fn on_comment_end(&mut self) {
        (**self).on_comment_end();
    }

    fn on_cdata_start(&mut self) {
        (**self).on_cdata_start();
    }

    fn on_cdata_end(&mut self) {
        (**self).on_cdata_end();
    }

    fn on_processing_instruction(&mut self, name: &str, data: &str) {
        (**self).on_processing_instruction(name, data);
    }
}
