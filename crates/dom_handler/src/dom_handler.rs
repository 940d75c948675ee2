//! Tree builder: turns tokenizer events into a [`Dom`].
//!
//! The builder owns the open-container stack (bottom is always the document
//! root) and a pending data node used to coalesce adjacent text or comment
//! fragments. Any structural event clears the pending node, so chunked
//! delivery of the same markup produces the same tree as a single write.

use crate::dom::{Dom, NodeRef};
use crate::error::{DomError, ParseError};
use crate::handler::{Handler, SourcePosition};
use crate::node::{Attributes, ElementKind, NodeId, NodeType};

/// Options for a [`DomHandler`]. Everything defaults to off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DomHandlerOptions {
    /// Stamp `start_index` on every node from the current source position.
    pub with_start_indices: bool,
    /// Stamp `end_index` on every node, and refresh it on close and merge.
    pub with_end_indices: bool,
    /// Treat every element as a plain tag (no script/style specialization).
    pub xml_mode: bool,
    /// Collapse whitespace runs in text to a single space. Legacy.
    pub normalize_whitespace: bool,
    /// Record that consumers want the DOM Level 1 accessor view.
    pub with_dom_lvl1: bool,
}

impl DomHandlerOptions {
    pub fn with_start_indices(mut self, enabled: bool) -> Self {
        self.with_start_indices = enabled;
        self
    }

    pub fn with_end_indices(mut self, enabled: bool) -> Self {
        self.with_end_indices = enabled;
        self
    }

    pub fn with_indices(self, enabled: bool) -> Self {
        self.with_start_indices(enabled).with_end_indices(enabled)
    }

    pub fn xml_mode(mut self, enabled: bool) -> Self {
        self.xml_mode = enabled;
        self
    }

    pub fn normalize_whitespace(mut self, enabled: bool) -> Self {
        self.normalize_whitespace = enabled;
        self
    }

    pub fn with_dom_lvl1(mut self, enabled: bool) -> Self {
        self.with_dom_lvl1 = enabled;
        self
    }
}

/// Counters for one parse session. Reset together with the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuilderStats {
    pub nodes_created: u64,
    pub text_merges: u64,
    pub comment_merges: u64,
    pub elements_closed: u64,
}

pub type CompletionCallback = Box<dyn FnMut(Option<ParseError>, &Dom)>;
pub type ElementCallback = Box<dyn FnMut(ClosedElement<'_>)>;

/// The element that just closed, as seen by the element callback.
///
/// The handle can read the whole tree but only detach or remove the closed
/// element itself. Its ancestors are still open and stay out of reach.
pub struct ClosedElement<'a> {
    dom: &'a mut Dom,
    id: NodeId,
}

impl ClosedElement<'_> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn dom(&self) -> &Dom {
        self.dom
    }

    pub fn node(&self) -> NodeRef<'_> {
        self.dom.node(self.id)
    }

    /// Unlink the element from its parent. The subtree stays allocated
    /// under the returned id.
    pub fn detach(self) -> Result<NodeId, DomError> {
        self.dom.detach(self.id)?;
        Ok(self.id)
    }

    /// Unlink the element and free its subtree.
    pub fn remove(self) -> Result<(), DomError> {
        self.dom.remove(self.id)
    }
}

pub struct DomHandler {
    dom: Dom,
    open: Vec<NodeId>,
    pending: Option<NodeId>,
    done: bool,
    options: DomHandlerOptions,
    position: Option<SourcePosition>,
    callback: Option<CompletionCallback>,
    element_cb: Option<ElementCallback>,
    stats: BuilderStats,
}

impl Default for DomHandler {
    fn default() -> Self {
        Self::new(DomHandlerOptions::default())
    }
}

impl DomHandler {
    pub fn new(options: DomHandlerOptions) -> Self {
        let dom = Dom::new().with_dom_lvl1(options.with_dom_lvl1);
        let open = vec![dom.root()];
        Self {
            dom,
            open,
            pending: None,
            done: false,
            options,
            position: None,
            callback: None,
            element_cb: None,
            stats: BuilderStats::default(),
        }
    }

    /// Completion callback, invoked once per session with the finished tree
    /// (and for every forwarded tokenizer error).
    pub fn with_callback(
        mut self,
        callback: impl FnMut(Option<ParseError>, &Dom) + 'static,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Called after each element closes, with its final children and end index.
    pub fn with_element_callback(
        mut self,
        callback: impl FnMut(ClosedElement<'_>) + 'static,
    ) -> Self {
        self.element_cb = Some(Box::new(callback));
        self
    }

    pub fn options(&self) -> DomHandlerOptions {
        self.options
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn into_dom(self) -> Dom {
        self.dom
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Depth of the open-container stack, counting the document.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn stats(&self) -> BuilderStats {
        self.stats
    }

    fn current_container(&self) -> NodeId {
        self.open.last().copied().unwrap_or(self.dom.root())
    }

    /// Shared append procedure: stamp indices, link as last child of the
    /// current container, and stop coalescing.
    fn add_node(&mut self, node: NodeId) {
        if let Some(position) = &self.position {
            if self.options.with_start_indices {
                self.dom.set_start_index(node, position.start_index());
            }
            if self.options.with_end_indices {
                self.dom.set_end_index(node, position.end_index());
            }
        }
        let parent = self.current_container();
        self.dom.link_last(parent, node);
        self.pending = None;
        self.stats.nodes_created += 1;
    }

    fn refresh_end_index(&mut self, node: NodeId) {
        if !self.options.with_end_indices {
            return;
        }
        if let Some(position) = &self.position {
            self.dom.set_end_index(node, position.end_index());
        }
    }

    /// Merge `chunk` into the pending node if it is of `kind`.
    fn try_merge(&mut self, kind: NodeType, chunk: &str) -> bool {
        let Some(pending) = self.pending else {
            return false;
        };
        if self.dom.node_type(pending) != Some(kind) {
            return false;
        }
        let normalize = self.options.normalize_whitespace && kind == NodeType::Text;
        let merged = match self.dom.data_mut(pending) {
            Some(data) if normalize => {
                push_normalized(data, chunk);
                true
            }
            Some(data) => {
                data.push_str(chunk);
                true
            }
            None => false,
        };
        if merged {
            self.refresh_end_index(pending);
        }
        merged
    }

    fn notify_complete(&mut self) {
        if let Some(callback) = &mut self.callback {
            callback(None, &self.dom);
        }
    }

    /// Without a callback the error goes back to the caller.
    fn report_error(&mut self, error: ParseError) -> Result<(), DomError> {
        match &mut self.callback {
            Some(callback) => {
                callback(Some(error), &self.dom);
                Ok(())
            }
            None => Err(DomError::Parse(error)),
        }
    }

    #[cfg(feature = "parser_invariants")]
    fn check_invariants(&self, event: &str) {
        if let Err(violation) = crate::dom_invariants::check_tree(&self.dom, self.dom.root()) {
            panic!("tree invariant broken after {event}: {violation}");
        }
        assert_eq!(
            self.open.first().copied(),
            Some(self.dom.root()),
            "open stack lost the document after {event}"
        );
    }

    #[cfg(not(feature = "parser_invariants"))]
    #[inline(always)]
    fn check_invariants(&self, _event: &str) {}
}

impl Handler for DomHandler {
    fn on_parser_init(&mut self, position: SourcePosition) {
        self.position = Some(position);
    }

    fn on_reset(&mut self) {
        log::debug!(
            target: "dom.handler",
            "reset: dropping {} nodes (depth {})",
            self.dom.len(),
            self.open.len()
        );
        self.dom = Dom::new().with_dom_lvl1(self.options.with_dom_lvl1);
        self.open.clear();
        self.open.push(self.dom.root());
        self.pending = None;
        self.done = false;
        self.position = None;
        self.stats = BuilderStats::default();
    }

    fn on_end(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.position = None;
        log::debug!(
            target: "dom.handler",
            "end: {} top-level nodes, {} total",
            self.dom.top_level().len(),
            self.dom.len()
        );
        self.notify_complete();
    }

    fn on_error(&mut self, error: ParseError) -> Result<(), DomError> {
        log::debug!(target: "dom.handler", "forwarding tokenizer error: {error}");
        self.done = true;
        self.report_error(error)
    }

    fn on_open_tag(&mut self, name: &str, attribs: Attributes) {
        let kind = if self.options.xml_mode {
            ElementKind::Tag
        } else {
            ElementKind::for_name(name)
        };
        let element = self.dom.create_element_with_kind(name, attribs, kind);
        self.add_node(element);
        self.open.push(element);
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "dom.handler", "open <{name}> as {element} (depth {})", self.open.len());
        self.check_invariants("open tag");
    }

    fn on_close_tag(&mut self) -> Result<(), DomError> {
        self.pending = None;
        if self.open.len() <= 1 {
            return Err(DomError::UnbalancedClose);
        }
        let Some(element) = self.open.pop() else {
            return Err(DomError::UnbalancedClose);
        };
        self.refresh_end_index(element);
        self.stats.elements_closed += 1;
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "dom.handler", "close {element} (depth {})", self.open.len());
        if let Some(callback) = &mut self.element_cb {
            callback(ClosedElement {
                dom: &mut self.dom,
                id: element,
            });
        }
        self.check_invariants("close tag");
        Ok(())
    }

    fn on_text(&mut self, data: &str) {
        if self.try_merge(NodeType::Text, data) {
            self.stats.text_merges += 1;
        } else {
            let text = if self.options.normalize_whitespace {
                let mut normalized = String::with_capacity(data.len());
                push_normalized(&mut normalized, data);
                self.dom.create_text(normalized)
            } else {
                self.dom.create_text(data)
            };
            self.add_node(text);
            self.pending = Some(text);
        }
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "dom.handler", "text ({} bytes) into {:?}", data.len(), self.pending);
        self.check_invariants("text");
    }

    fn on_comment(&mut self, data: &str) {
        if self.try_merge(NodeType::Comment, data) {
            self.stats.comment_merges += 1;
        } else {
            let comment = self.dom.create_comment(data);
            self.add_node(comment);
            self.pending = Some(comment);
        }
        self.check_invariants("comment");
    }

    fn on_comment_end(&mut self) {
        self.pending = None;
    }

    fn on_cdata_start(&mut self) {
        let cdata = self.dom.create_cdata();
        self.add_node(cdata);
        // The inner text node gets no indices of its own.
        let text = self.dom.create_text("");
        self.dom.link_last(cdata, text);
        self.stats.nodes_created += 1;
        self.pending = Some(text);
        self.check_invariants("cdata start");
    }

    fn on_cdata_end(&mut self) {
        self.pending = None;
    }

    fn on_processing_instruction(&mut self, name: &str, data: &str) {
        let directive = self.dom.create_directive(name, data);
        self.add_node(directive);
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "dom.handler", "directive {name:?} as {directive}");
        self.check_invariants("processing instruction");
    }
}

/// Append `chunk` to already-normalized `out`, collapsing whitespace runs
/// across the boundary so the result equals normalizing the joined string.
fn push_normalized(out: &mut String, chunk: &str) {
    let mut in_space = out.ends_with(' ');
    out.reserve(chunk.len());
    for ch in chunk.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(ch);
            in_space = false;
        }
    }
}
