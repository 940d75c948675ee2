//! Streaming parser: drives a [`Handler`] from markup text.
//!
//! The parser owns the tokenizer and a stack of open tag names. It applies
//! the HTML conveniences a tree consumer should not have to know about
//! (void elements, implied end tags, stray end tags) and updates the shared
//! [`SourcePosition`] before every event.

use crate::dom::Dom;
use crate::dom_handler::{DomHandler, DomHandlerOptions};
use crate::error::{DomError, ParseError};
use crate::handler::{Handler, SourcePosition, Span};
use crate::node::Attributes;
use crate::tokenizer::{StartTag, TokenSink, Tokenizer};
use tools::utf8::Utf8Decoder;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParserOptions {
    /// Disable the HTML-specific behavior: no void elements, implied end
    /// tags, raw-text elements or case folding.
    pub xml_mode: bool,
    pub lower_case_tags: bool,
    pub lower_case_attribute_names: bool,
    /// Report `<![CDATA[...]]>` as CDATA instead of as a comment.
    pub recognize_cdata: bool,
    /// Honor `<tag/>` as an immediately closed element.
    pub recognize_self_closing: bool,
}

impl ParserOptions {
    pub fn html() -> Self {
        Self {
            xml_mode: false,
            lower_case_tags: true,
            lower_case_attribute_names: true,
            recognize_cdata: false,
            recognize_self_closing: false,
        }
    }

    pub fn xml() -> Self {
        Self {
            xml_mode: true,
            lower_case_tags: false,
            lower_case_attribute_names: false,
            recognize_cdata: true,
            recognize_self_closing: true,
        }
    }
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::html()
    }
}

impl From<&DomHandlerOptions> for ParserOptions {
    fn from(options: &DomHandlerOptions) -> Self {
        if options.xml_mode { Self::xml() } else { Self::html() }
    }
}

pub struct Parser<H: Handler> {
    handler: H,
    tokenizer: Tokenizer,
    stack: Vec<String>,
    position: SourcePosition,
    decoder: Utf8Decoder,
    options: ParserOptions,
    ended: bool,
}

impl<H: Handler> Parser<H> {
    pub fn new(mut handler: H, options: ParserOptions) -> Self {
        let position = SourcePosition::new();
        handler.on_parser_init(position.clone());
        Self {
            handler,
            tokenizer: Tokenizer::new(options.xml_mode),
            stack: Vec::new(),
            position,
            decoder: Utf8Decoder::new(),
            options,
            ended: false,
        }
    }

    pub fn options(&self) -> ParserOptions {
        self.options
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Bytes consumed by the tokenizer so far.
    pub fn offset(&self) -> usize {
        self.tokenizer.offset()
    }

    /// Feed a chunk of markup. Constructs that are not complete yet stay
    /// buffered until a later write or [`Parser::end`].
    pub fn write(&mut self, chunk: &str) -> Result<(), DomError> {
        if self.ended {
            return self.handler.on_error(ParseError::new(".write() after done!"));
        }
        self.tokenizer.feed(chunk);
        self.pump(false)
    }

    /// Feed raw bytes; UTF-8 sequences may be split across calls.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), DomError> {
        let mut decoded = String::new();
        self.decoder.push(&mut decoded, bytes);
        self.write(&decoded)
    }

    /// Flush buffered input, close every open element and finish the session.
    pub fn end(&mut self) -> Result<(), DomError> {
        if self.ended {
            return self.handler.on_error(ParseError::new(".end() after done!"));
        }
        let mut tail = String::new();
        self.decoder.finish(&mut tail);
        self.tokenizer.feed(&tail);
        self.pump(true)?;
        self.ended = true;

        let consumed = self.tokenizer.offset();
        self.position.set(Span::new(consumed, consumed));
        while self.stack.pop().is_some() {
            self.handler.on_close_tag()?;
        }
        self.handler.on_end();
        Ok(())
    }

    pub fn end_with(&mut self, chunk: &str) -> Result<(), DomError> {
        self.write(chunk)?;
        self.end()
    }

    /// Reset the handler and parse `input` as one complete document.
    pub fn parse_complete(&mut self, input: &str) -> Result<(), DomError> {
        self.reset();
        self.end_with(input)
    }

    /// Discard all state and start a new session with the same handler.
    pub fn reset(&mut self) {
        self.tokenizer.reset();
        self.stack.clear();
        self.decoder.reset();
        self.ended = false;
        self.position.set(Span::default());
        self.handler.on_reset();
        self.handler.on_parser_init(self.position.clone());
    }

    fn pump(&mut self, eof: bool) -> Result<(), DomError> {
        let mut driver = Driver {
            handler: &mut self.handler,
            stack: &mut self.stack,
            position: &self.position,
            options: &self.options,
        };
        self.tokenizer.run(&mut driver, eof)
    }
}

/// Tokenizer sink translating lexical units into handler events.
struct Driver<'a, H: Handler> {
    handler: &'a mut H,
    stack: &'a mut Vec<String>,
    position: &'a SourcePosition,
    options: &'a ParserOptions,
}

impl<H: Handler> Driver<'_, H> {
    fn html(&self) -> bool {
        !self.options.xml_mode
    }

    fn fold_tag(&self, name: &str) -> String {
        if self.options.lower_case_tags {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    fn pop_element(&mut self) -> Result<(), DomError> {
        self.stack.pop();
        self.handler.on_close_tag()
    }

    /// Open an element that carries no attributes and close it right away.
    fn empty_element(&mut self, name: &str) -> Result<(), DomError> {
        self.handler.on_open_tag(name, Attributes::new());
        self.handler.on_close_tag()
    }

    /// First word of a declaration or instruction, used as its name.
    fn instruction_name(&self, data: &str) -> String {
        let end = data
            .find(|c: char| c.is_ascii_whitespace() || c == '/')
            .unwrap_or(data.len());
        self.fold_tag(&data[..end])
    }
}

impl<H: Handler> TokenSink for Driver<'_, H> {
    fn text(&mut self, span: Span, text: &str) -> Result<(), DomError> {
        self.position.set(span);
        self.handler.on_text(text);
        Ok(())
    }

    fn open_tag(&mut self, span: Span, tag: StartTag<'_>) -> Result<(), DomError> {
        let name = self.fold_tag(tag.name);

        if self.html() {
            let closes = implied_closes(&name);
            if !closes.is_empty() {
                // Implicitly closed elements end right before this tag.
                let before = span.start.saturating_sub(1);
                self.position.set(Span::new(before, before));
                while self
                    .stack
                    .last()
                    .is_some_and(|open| closes.contains(&open.as_str()))
                {
                    self.pop_element()?;
                }
            }
        }

        let mut attribs = Attributes::new();
        for (key, value) in tag.attrs {
            let key = if self.options.lower_case_attribute_names {
                key.to_ascii_lowercase()
            } else {
                key.to_string()
            };
            // First occurrence wins.
            attribs.insert_if_absent(key, value.unwrap_or_default());
        }

        self.position.set(span);
        let void = self.html() && is_void_element(&name);
        self.handler.on_open_tag(&name, attribs);
        if void || (tag.self_closing && self.options.recognize_self_closing) {
            self.handler.on_close_tag()?;
        } else {
            self.stack.push(name);
        }
        Ok(())
    }

    fn close_tag(&mut self, span: Span, name: &str) -> Result<(), DomError> {
        let name = self.fold_tag(name);
        self.position.set(span);

        if !self.stack.is_empty() && !(self.html() && is_void_element(&name)) {
            match self.stack.iter().rposition(|open| *open == name) {
                Some(index) => {
                    while self.stack.len() > index {
                        self.pop_element()?;
                    }
                }
                None if self.html() && name == "p" => self.empty_element("p")?,
                None => {
                    log::debug!(target: "dom.parser", "ignoring unmatched end tag </{name}> at {}", span.start);
                }
            }
        } else if self.html() && name == "br" {
            self.empty_element("br")?;
        } else {
            log::debug!(target: "dom.parser", "ignoring end tag </{name}> at {}", span.start);
        }
        Ok(())
    }

    fn comment(&mut self, span: Span, data: &str) -> Result<(), DomError> {
        self.position.set(span);
        self.handler.on_comment(data);
        self.handler.on_comment_end();
        Ok(())
    }

    fn cdata(&mut self, span: Span, data: &str) -> Result<(), DomError> {
        self.position.set(span);
        if self.options.recognize_cdata {
            self.handler.on_cdata_start();
            self.handler.on_text(data);
            self.handler.on_cdata_end();
        } else {
            self.handler.on_comment(&format!("[CDATA[{data}]]"));
            self.handler.on_comment_end();
        }
        Ok(())
    }

    fn declaration(&mut self, span: Span, data: &str) -> Result<(), DomError> {
        self.position.set(span);
        let name = self.instruction_name(data);
        self.handler
            .on_processing_instruction(&format!("!{name}"), &format!("!{data}"));
        Ok(())
    }

    fn processing_instruction(&mut self, span: Span, data: &str) -> Result<(), DomError> {
        self.position.set(span);
        let name = self.instruction_name(data);
        self.handler
            .on_processing_instruction(&format!("?{name}"), &format!("?{data}"));
        Ok(())
    }
}

fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "basefont"
            | "br"
            | "col"
            | "command"
            | "embed"
            | "frame"
            | "hr"
            | "img"
            | "input"
            | "isindex"
            | "keygen"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Open elements that a new `name` start tag closes while they are on top
/// of the stack.
fn implied_closes(name: &str) -> &'static [&'static str] {
    const P: &[&str] = &["p"];
    const FORM: &[&str] = &[
        "input", "option", "optgroup", "select", "button", "datalist", "textarea",
    ];
    const DDT: &[&str] = &["dd", "dt"];
    const RTP: &[&str] = &["rt", "rp"];
    const TABLE_SECTION: &[&str] = &["thead", "tbody"];

    match name {
        "tr" => &["tr", "th", "td"],
        "th" => &["th"],
        "td" => &["thead", "th", "td"],
        "body" => &["head", "link", "script"],
        "li" => &["li"],
        "option" => &["option"],
        "optgroup" => &["optgroup", "option"],
        "dd" | "dt" => DDT,
        "rt" | "rp" => RTP,
        "tbody" | "tfoot" => TABLE_SECTION,
        "select" | "input" | "output" | "button" | "datalist" | "textarea" => FORM,
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "address" | "article" | "aside"
        | "blockquote" | "details" | "div" | "dl" | "fieldset" | "figcaption" | "figure"
        | "footer" | "form" | "header" | "hr" | "main" | "nav" | "ol" | "pre" | "section"
        | "table" | "ul" => P,
        _ => &[],
    }
}

/// Parse a complete document into a [`Dom`].
pub fn parse_document(input: &str, options: &DomHandlerOptions) -> Result<Dom, DomError> {
    parse_document_chunked([input], options)
}

/// Parse a document delivered as a sequence of chunks.
pub fn parse_document_chunked<'a>(
    chunks: impl IntoIterator<Item = &'a str>,
    options: &DomHandlerOptions,
) -> Result<Dom, DomError> {
    let mut parser = Parser::new(DomHandler::new(*options), ParserOptions::from(options));
    for chunk in chunks {
        parser.write(chunk)?;
    }
    parser.end()?;
    Ok(parser.into_handler().into_dom())
}
