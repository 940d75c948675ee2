//! Incremental markup tokenizer.
//!
//! Input arrives in arbitrary chunks through [`Tokenizer::feed`]; each call to
//! [`Tokenizer::run`] reports every construct that is complete so far and keeps
//! the unfinished tail buffered. Text is reported eagerly (a run of text may
//! arrive as several `text` calls), every other construct is reported exactly
//! once, so a consumer that coalesces adjacent text sees the same result for
//! any chunking of the same input.
//!
//! Known limitations:
//! - No character reference decoding; text and attribute values are raw.
//! - Tag and attribute names are whatever lies between the structural bytes
//!   (whitespace, `/`, `=`, `>`); no character-class validation.
//!
//! Offsets in reported spans are absolute byte offsets into the whole stream.
//! `end` is the offset of the construct's last byte.

use crate::error::DomError;
use crate::handler::Span;
use memchr::{memchr, memmem};

const COMMENT_OPEN: &[u8] = b"<!--";
const COMMENT_CLOSE: &[u8] = b"-->";
const CDATA_OPEN: &[u8] = b"<![CDATA[";
const CDATA_CLOSE: &[u8] = b"]]>";

/// Start tag as lexed, names not yet case-folded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartTag<'a> {
    pub name: &'a str,
    /// Attributes in source order; `None` marks a valueless attribute.
    pub attrs: Vec<(&'a str, Option<&'a str>)>,
    pub self_closing: bool,
}

/// Receiver of lexical units.
pub trait TokenSink {
    fn text(&mut self, span: Span, text: &str) -> Result<(), DomError>;
    fn open_tag(&mut self, span: Span, tag: StartTag<'_>) -> Result<(), DomError>;
    fn close_tag(&mut self, span: Span, name: &str) -> Result<(), DomError>;
    fn comment(&mut self, span: Span, data: &str) -> Result<(), DomError>;
    fn cdata(&mut self, span: Span, data: &str) -> Result<(), DomError>;
    /// `<!...>` other than comments and CDATA; `data` excludes `<!` and `>`.
    fn declaration(&mut self, span: Span, data: &str) -> Result<(), DomError>;
    /// `<?...>`; `data` excludes `<?` and `>`.
    fn processing_instruction(&mut self, span: Span, data: &str) -> Result<(), DomError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Data,
    /// Inside `<script>`/`<style>` in HTML mode: everything up to the matching
    /// close tag is text.
    RawText(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Progress,
    NeedMoreInput,
}

#[derive(Debug)]
pub struct Tokenizer {
    buffer: String,
    /// Absolute offset of `buffer[0]`.
    base: usize,
    cursor: usize,
    state: State,
    xml_mode: bool,
    /// Absolute offset from which to resume a terminator search for the
    /// construct starting at `cursor`.
    resume_scan: Option<usize>,
}

impl Tokenizer {
    pub fn new(xml_mode: bool) -> Self {
        Self {
            buffer: String::new(),
            base: 0,
            cursor: 0,
            state: State::Data,
            xml_mode,
            resume_scan: None,
        }
    }

    pub fn feed(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    /// Total bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.base + self.cursor
    }

    /// Bytes fed but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.xml_mode);
    }

    /// Report every complete construct. With `eof`, unfinished trailing
    /// constructs are flushed or dropped and the buffer ends up empty.
    pub fn run<S: TokenSink + ?Sized>(&mut self, sink: &mut S, eof: bool) -> Result<(), DomError> {
        loop {
            match self.step(sink, eof)? {
                Step::Progress => {}
                Step::NeedMoreInput => break,
            }
        }
        self.compact();
        Ok(())
    }

    fn compact(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.buffer.drain(..self.cursor);
        self.base += self.cursor;
        self.cursor = 0;
    }

    fn span(&self, start: usize, last: usize) -> Span {
        Span::new(self.base + start, self.base + last)
    }

    fn step<S: TokenSink + ?Sized>(&mut self, sink: &mut S, eof: bool) -> Result<Step, DomError> {
        if self.cursor >= self.buffer.len() {
            return Ok(Step::NeedMoreInput);
        }
        match self.state {
            State::Data => self.step_data(sink, eof),
            State::RawText(tag) => self.step_raw_text(sink, eof, tag),
        }
    }

    fn step_data<S: TokenSink + ?Sized>(&mut self, sink: &mut S, eof: bool) -> Result<Step, DomError> {
        let bytes = self.buffer.as_bytes();
        let start = self.cursor;
        if bytes[start] != b'<' {
            let end = memchr(b'<', &bytes[start..]).map_or(bytes.len(), |rel| start + rel);
            return self.emit_text(sink, start, end);
        }
        match bytes.get(start + 1).copied() {
            None if eof => self.emit_text(sink, start, start + 1),
            None => Ok(Step::NeedMoreInput),
            Some(b'!') => self.markup_declaration(sink, eof),
            Some(b'?') => self.processing_instruction(sink, eof),
            Some(b'/') => self.end_tag(sink, eof),
            Some(c) if c.is_ascii_alphabetic() => self.start_tag(sink, eof),
            Some(_) => self.emit_text(sink, start, start + 1),
        }
    }

    fn emit_text<S: TokenSink + ?Sized>(
        &mut self,
        sink: &mut S,
        start: usize,
        end: usize,
    ) -> Result<Step, DomError> {
        if end > start {
            let span = self.span(start, end - 1);
            sink.text(span, &self.buffer[start..end])?;
        }
        self.cursor = end;
        self.resume_scan = None;
        Ok(Step::Progress)
    }

    /// Everything from the cursor to the end of the buffer, as text.
    fn flush_as_text<S: TokenSink + ?Sized>(&mut self, sink: &mut S) -> Result<Step, DomError> {
        let (start, end) = (self.cursor, self.buffer.len());
        self.emit_text(sink, start, end)
    }

    fn drop_rest(&mut self) -> Step {
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "dom.parser",
            "dropping unterminated tag at {}: {:?}",
            self.offset(),
            &self.buffer[self.cursor..]
        );
        self.cursor = self.buffer.len();
        self.resume_scan = None;
        Step::Progress
    }

    /// Search for `needle` at or after `from`, resuming a previous partial scan.
    fn find_terminator(&mut self, from: usize, needle: &[u8]) -> Option<usize> {
        let resume = self
            .resume_scan
            .map_or(from, |abs| abs.saturating_sub(self.base).max(from));
        let bytes = self.buffer.as_bytes();
        match memmem::find(&bytes[resume..], needle) {
            Some(rel) => Some(resume + rel),
            None => {
                let safe = bytes.len().saturating_sub(needle.len() - 1).max(from);
                self.resume_scan = Some(self.base + safe);
                None
            }
        }
    }

    fn markup_declaration<S: TokenSink + ?Sized>(
        &mut self,
        sink: &mut S,
        eof: bool,
    ) -> Result<Step, DomError> {
        let start = self.cursor;
        let rest = &self.buffer.as_bytes()[start..];
        if rest.starts_with(COMMENT_OPEN) {
            return self.comment_like(sink, eof, COMMENT_OPEN.len(), COMMENT_CLOSE, false);
        }
        if rest.starts_with(CDATA_OPEN) {
            return self.comment_like(sink, eof, CDATA_OPEN.len(), CDATA_CLOSE, true);
        }
        if !eof && (COMMENT_OPEN.starts_with(rest) || CDATA_OPEN.starts_with(rest)) {
            return Ok(Step::NeedMoreInput);
        }
        match memchr(b'>', &rest[2..]) {
            Some(rel) => {
                let close = start + 2 + rel;
                let span = self.span(start, close);
                sink.declaration(span, &self.buffer[start + 2..close])?;
                self.cursor = close + 1;
                Ok(Step::Progress)
            }
            None if eof => self.flush_as_text(sink),
            None => Ok(Step::NeedMoreInput),
        }
    }

    fn comment_like<S: TokenSink + ?Sized>(
        &mut self,
        sink: &mut S,
        eof: bool,
        open_len: usize,
        close: &[u8],
        cdata: bool,
    ) -> Result<Step, DomError> {
        let start = self.cursor;
        let content_start = start + open_len;
        let (content_end, last) = match self.find_terminator(content_start, close) {
            Some(at) => (at, at + close.len() - 1),
            // Unterminated at end of input: the rest of the stream is content.
            None if eof => (self.buffer.len(), self.buffer.len() - 1),
            None => return Ok(Step::NeedMoreInput),
        };
        let span = self.span(start, last);
        let data = &self.buffer[content_start..content_end];
        if cdata {
            sink.cdata(span, data)?;
        } else {
            sink.comment(span, data)?;
        }
        self.cursor = last + 1;
        self.resume_scan = None;
        Ok(Step::Progress)
    }

    fn processing_instruction<S: TokenSink + ?Sized>(
        &mut self,
        sink: &mut S,
        eof: bool,
    ) -> Result<Step, DomError> {
        let start = self.cursor;
        match memchr(b'>', &self.buffer.as_bytes()[start + 2..]) {
            Some(rel) => {
                let close = start + 2 + rel;
                let span = self.span(start, close);
                sink.processing_instruction(span, &self.buffer[start + 2..close])?;
                self.cursor = close + 1;
                Ok(Step::Progress)
            }
            None if eof => self.flush_as_text(sink),
            None => Ok(Step::NeedMoreInput),
        }
    }

    fn end_tag<S: TokenSink + ?Sized>(&mut self, sink: &mut S, eof: bool) -> Result<Step, DomError> {
        let start = self.cursor;
        let bytes = self.buffer.as_bytes();
        match bytes.get(start + 2).copied() {
            None if eof => return self.flush_as_text(sink),
            None => return Ok(Step::NeedMoreInput),
            Some(b'>') => {
                // `</>` is dropped entirely.
                self.cursor = start + 3;
                return Ok(Step::Progress);
            }
            Some(_) => {}
        }
        let Some(rel) = memchr(b'>', &bytes[start + 2..]) else {
            return if eof { Ok(self.drop_rest()) } else { Ok(Step::NeedMoreInput) };
        };
        let close = start + 2 + rel;
        let span = self.span(start, close);
        if bytes[start + 2].is_ascii_alphabetic() {
            let name_end = bytes[start + 2..close]
                .iter()
                .position(|&b| b.is_ascii_whitespace() || b == b'/')
                .map_or(close, |rel| start + 2 + rel);
            sink.close_tag(span, &self.buffer[start + 2..name_end])?;
        } else {
            // `</3>` and friends become bogus comments.
            sink.comment(span, &self.buffer[start + 2..close])?;
        }
        self.cursor = close + 1;
        Ok(Step::Progress)
    }

    fn start_tag<S: TokenSink + ?Sized>(&mut self, sink: &mut S, eof: bool) -> Result<Step, DomError> {
        let start = self.cursor;
        let Some((tag, close)) = lex_start_tag(&self.buffer, start) else {
            return if eof { Ok(self.drop_rest()) } else { Ok(Step::NeedMoreInput) };
        };
        let span = self.span(start, close);
        let raw_text = if self.xml_mode || tag.self_closing {
            None
        } else {
            raw_text_tag(tag.name)
        };
        sink.open_tag(span, tag)?;
        self.cursor = close + 1;
        if let Some(tag) = raw_text {
            self.state = State::RawText(tag);
        }
        Ok(Step::Progress)
    }

    fn step_raw_text<S: TokenSink + ?Sized>(
        &mut self,
        sink: &mut S,
        eof: bool,
        tag: &'static str,
    ) -> Result<Step, DomError> {
        let bytes = self.buffer.as_bytes();
        let start = self.cursor;
        let mut at = start;
        while let Some(rel) = memchr(b'<', &bytes[at..]) {
            let lt = at + rel;
            match match_raw_text_close(&bytes[lt..], tag) {
                CloseMatch::Full => {
                    self.state = State::Data;
                    return self.emit_text(sink, start, lt);
                }
                CloseMatch::Partial if !eof => {
                    self.emit_text(sink, start, lt)?;
                    return Ok(Step::NeedMoreInput);
                }
                CloseMatch::Partial | CloseMatch::No => at = lt + 1,
            }
        }
        self.flush_as_text(sink)
    }
}

fn raw_text_tag(name: &str) -> Option<&'static str> {
    ["script", "style"]
        .into_iter()
        .find(|tag| name.eq_ignore_ascii_case(tag))
}

enum CloseMatch {
    Full,
    /// The buffer ends before a decision can be made.
    Partial,
    No,
}

/// Whether `rest` (starting at `<`) opens `</tag` followed by whitespace, `/` or `>`.
fn match_raw_text_close(rest: &[u8], tag: &str) -> CloseMatch {
    let tag = tag.as_bytes();
    let prefix_ok = rest
        .iter()
        .take(2 + tag.len())
        .enumerate()
        .all(|(i, &b)| match i {
            0 => b == b'<',
            1 => b == b'/',
            _ => b.eq_ignore_ascii_case(&tag[i - 2]),
        });
    if !prefix_ok {
        return CloseMatch::No;
    }
    match rest.get(2 + tag.len()) {
        None => CloseMatch::Partial,
        Some(&b) if b.is_ascii_whitespace() || b == b'/' || b == b'>' => CloseMatch::Full,
        Some(_) => CloseMatch::No,
    }
}

/// Lex `<name attr=value ...>` starting at `start`. Returns the tag and the
/// index of its closing `>`, or `None` when the buffer ends first.
fn lex_start_tag(input: &str, start: usize) -> Option<(StartTag<'_>, usize)> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let is_name_end = |b: u8| b.is_ascii_whitespace() || b == b'/' || b == b'>';

    let name_start = start + 1;
    let mut i = name_start;
    while i < len && !is_name_end(bytes[i]) {
        i += 1;
    }
    let name = &input[name_start..i];
    let mut attrs = Vec::new();

    loop {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match *bytes.get(i)? {
            b'>' => {
                return Some((
                    StartTag {
                        name,
                        attrs,
                        self_closing: false,
                    },
                    i,
                ));
            }
            b'/' => {
                match *bytes.get(i + 1)? {
                    b'>' => {
                        return Some((
                            StartTag {
                                name,
                                attrs,
                                self_closing: true,
                            },
                            i + 1,
                        ));
                    }
                    // A stray slash separates attributes like whitespace.
                    _ => i += 1,
                }
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        // `=` cannot end an empty name: `<a =x>` names the attribute `=x`.
        i += 1;
        while i < len && !is_name_end(bytes[i]) && bytes[i] != b'=' {
            i += 1;
        }
        let attr_name = &input[attr_start..i];
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if *bytes.get(i)? != b'=' {
            attrs.push((attr_name, None));
            continue;
        }
        i += 1;
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let value = match *bytes.get(i)? {
            quote @ (b'"' | b'\'') => {
                let value_start = i + 1;
                let rel = memchr(quote, &bytes[value_start..])?;
                i = value_start + rel + 1;
                &input[value_start..value_start + rel]
            }
            _ => {
                let value_start = i;
                let end = bytes[value_start..]
                    .iter()
                    .position(|&b| b == b'>' || b.is_ascii_whitespace())
                    .map(|rel| value_start + rel)?;
                i = end;
                &input[value_start..end]
            }
        };
        attrs.push((attr_name, Some(value)));
    }
}
