//! Arena-backed document tree.
//!
//! All nodes of one document live in `Dom::slots` and are addressed by
//! [`NodeId`]. The only code that writes `parent`/`prev`/`next` is
//! [`Dom::link_last`], [`Dom::unlink`] and the relinking step of
//! [`Dom::clone_node`], so the linkage invariants are enforced in one place:
//!
//! - every child listed by a container points back at it through `parent`;
//! - `prev`/`next` follow the container's `children` order exactly, with
//!   `None` at both ends.

use crate::error::DomError;
use crate::node::{
    Attributes, DirectiveData, DocumentData, DoctypeIds, ElementData, ElementKind, NodeData,
    NodeId, NodeKind, NodeType, QuirksMode, RawNodeId, SourceRange,
};
use std::fmt;
use std::ops::Index;

#[derive(Clone)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

#[derive(Clone)]
pub struct Dom {
    slots: Vec<Slot>,
    free: Vec<RawNodeId>,
    root: NodeId,
    dom_lvl1: bool,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// Empty document: a single `Document` root without children.
    pub fn new() -> Self {
        let root_data = NodeData::new(NodeKind::Document(DocumentData::default()));
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root_data),
            }],
            free: Vec::new(),
            root: NodeId::new(0, 0),
            dom_lvl1: false,
        }
    }

    pub(crate) fn with_dom_lvl1(mut self, enabled: bool) -> Self {
        self.dom_lvl1 = enabled;
        self
    }

    /// Whether the producer asked for the DOM Level 1 accessor view.
    pub fn dom_lvl1(&self) -> bool {
        self.dom_lvl1
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Top-level children of the document, in document order.
    pub fn top_level(&self) -> &[NodeId] {
        self.children(self.root)
    }

    /// Number of live nodes, including the root and detached nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.top_level().is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// The node behind `id`, or `None` once it has been removed.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    fn try_get(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.get(id).ok_or(DomError::StaleNode(id))
    }

    fn try_get_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        self.get_mut(id).ok_or(DomError::StaleNode(id))
    }

    /// Borrowed navigation handle. Panics on a stale id, like indexing.
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        let _ = &self[id];
        NodeRef { dom: self, id }
    }

    pub fn get_ref(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.get(id).map(|_| NodeRef { dom: self, id })
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(NodeData::kind)
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.get(id).map(NodeData::node_type)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(NodeData::parent)
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(NodeData::prev)
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(NodeData::next)
    }

    /// Children of a container; empty for leaves and stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], NodeData::children)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    pub fn data(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(NodeData::data)
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(NodeData::name)
    }

    pub fn attribs(&self, id: NodeId) -> Option<&Attributes> {
        self.get(id).and_then(NodeData::attribs)
    }

    pub fn start_index(&self, id: NodeId) -> Option<usize> {
        self.get(id).and_then(NodeData::start_index)
    }

    pub fn end_index(&self, id: NodeId) -> Option<usize> {
        self.get(id).and_then(NodeData::end_index)
    }

    pub fn set_data(&mut self, id: NodeId, data: impl Into<String>) -> Result<(), DomError> {
        let node = self.try_get_mut(id)?;
        match node.kind.data_mut() {
            Some(slot) => {
                *slot = data.into();
                Ok(())
            }
            None => Err(DomError::NoData(id)),
        }
    }

    pub fn attribs_mut(&mut self, id: NodeId) -> Result<&mut Attributes, DomError> {
        match &mut self.try_get_mut(id)?.kind {
            NodeKind::Element(el) => Ok(&mut el.attribs),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn set_namespace(&mut self, id: NodeId, namespace: Option<String>) -> Result<(), DomError> {
        self.element_mut(id)?.namespace = namespace;
        Ok(())
    }

    pub fn set_attribs_namespace(
        &mut self,
        id: NodeId,
        namespaces: Option<Attributes>,
    ) -> Result<(), DomError> {
        self.element_mut(id)?.attribs_namespace = namespaces;
        Ok(())
    }

    pub fn set_attribs_prefix(
        &mut self,
        id: NodeId,
        prefixes: Option<Attributes>,
    ) -> Result<(), DomError> {
        self.element_mut(id)?.attribs_prefix = prefixes;
        Ok(())
    }

    pub fn set_doctype_ids(&mut self, id: NodeId, ids: Option<DoctypeIds>) -> Result<(), DomError> {
        match &mut self.try_get_mut(id)?.kind {
            NodeKind::Directive(directive) => {
                directive.doctype = ids;
                Ok(())
            }
            _ => Err(DomError::NotADirective(id)),
        }
    }

    pub fn set_quirks_mode(&mut self, mode: Option<QuirksMode>) {
        let root = self.root;
        if let Some(NodeKind::Document(doc)) = self.get_mut(root).map(|node| &mut node.kind) {
            doc.mode = mode;
        }
    }

    pub fn set_source_range(&mut self, id: NodeId, range: Option<SourceRange>) -> Result<(), DomError> {
        self.try_get_mut(id)?.source_range = range;
        Ok(())
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self.try_get_mut(id)?.kind {
            NodeKind::Element(el) => Ok(el),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    pub(crate) fn set_start_index(&mut self, id: NodeId, index: usize) {
        if let Some(node) = self.get_mut(id) {
            node.start_index = Some(index);
        }
    }

    pub(crate) fn set_end_index(&mut self, id: NodeId, index: usize) {
        if let Some(node) = self.get_mut(id) {
            node.end_index = Some(index);
        }
    }

    pub(crate) fn data_mut(&mut self, id: NodeId) -> Option<&mut String> {
        self.get_mut(id).and_then(|node| node.kind.data_mut())
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(data);
            return NodeId::new(index, slot.generation);
        }
        let id = NodeId::new(self.slots.len() as RawNodeId, 0);
        self.slots.push(Slot {
            generation: 0,
            node: Some(data),
        });
        id
    }

    pub fn create_text(&mut self, data: impl Into<String>) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Text(data.into())))
    }

    pub fn create_comment(&mut self, data: impl Into<String>) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Comment(data.into())))
    }

    pub fn create_directive(&mut self, name: impl Into<String>, data: impl Into<String>) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Directive(DirectiveData {
            name: name.into(),
            data: data.into(),
            doctype: None,
        })))
    }

    /// Element whose kind follows its name (`script`/`style` are specialized).
    pub fn create_element(&mut self, name: impl Into<String>, attribs: Attributes) -> NodeId {
        let name = name.into();
        let kind = ElementKind::for_name(&name);
        self.create_element_with_kind(name, attribs, kind)
    }

    pub fn create_element_with_kind(
        &mut self,
        name: impl Into<String>,
        attribs: Attributes,
        kind: ElementKind,
    ) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Element(ElementData::new(
            name, attribs, kind,
        ))))
    }

    pub fn create_cdata(&mut self) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Cdata {
            children: Vec::new(),
        }))
    }

    /// Bare doctype node. Nothing in the builder produces these.
    pub fn create_doctype(&mut self) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Doctype))
    }

    /// Push `child` as the last child of `parent` and link it to its new
    /// previous sibling. Both ids must be live, `parent` a container and
    /// `child` detached.
    pub(crate) fn link_last(&mut self, parent: NodeId, child: NodeId) {
        let previous = {
            let Some(children) = self.get_mut(parent).and_then(|p| p.kind.children_mut()) else {
                debug_assert!(false, "link_last parent {parent} is not a live container");
                return;
            };
            let previous = children.last().copied();
            children.push(child);
            previous
        };
        if let Some(previous) = previous {
            if let Some(prev_node) = self.get_mut(previous) {
                prev_node.next = Some(child);
            }
        }
        if let Some(node) = self.get_mut(child) {
            node.prev = previous;
            node.next = None;
            node.parent = Some(parent);
        }
    }

    /// Append `child` under `parent`, detaching it from its current position first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if !self.try_get(parent)?.has_children() {
            return Err(DomError::NotAContainer(parent));
        }
        self.try_get(child)?;
        if child == self.root || self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        self.unlink(child);
        self.link_last(parent, child);
        Ok(())
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parent(node) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(node) = self.get_mut(id) else {
            return;
        };
        let parent = node.parent.take();
        let prev = node.prev.take();
        let next = node.next.take();

        if let Some(prev) = prev {
            if let Some(prev_node) = self.get_mut(prev) {
                prev_node.next = next;
            }
        }
        if let Some(next) = next {
            if let Some(next_node) = self.get_mut(next) {
                next_node.prev = prev;
            }
        }
        if let Some(children) = parent
            .and_then(|parent| self.get_mut(parent))
            .and_then(|parent| parent.kind.children_mut())
        {
            children.retain(|&child| child != id);
        }
    }

    /// Remove a node from its parent, relinking its former siblings. The
    /// subtree stays allocated and can be re-appended.
    pub fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        if id == self.root {
            return Err(DomError::RootNode);
        }
        self.try_get(id)?;
        self.unlink(id);
        Ok(())
    }

    /// Detach a subtree and free its slots. Ids inside it become stale.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        self.detach(id)?;
        let doomed: Vec<NodeId> = self.descendants(id).collect();
        for node in doomed {
            let slot = &mut self.slots[node.index()];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index() as RawNodeId);
        }
        Ok(())
    }

    /// Pre-order walk of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let stack = if self.contains(id) { vec![id] } else { Vec::new() };
        Descendants { dom: self, stack }
    }

    /// Copy a node, and optionally its whole subtree, into this arena.
    ///
    /// The copy is detached. With `recursive`, cloned children are linked to
    /// their new parent and to each other; nothing points back into the
    /// source tree. Start/end indices and passthrough metadata are copied
    /// verbatim. Nothing is allocated when the subtree holds a kind that
    /// cannot be cloned.
    pub fn clone_node(&mut self, id: NodeId, recursive: bool) -> Result<NodeId, DomError> {
        self.try_get(id)?;
        let unsupported = if recursive {
            self.descendants(id).find(|&node| self[node].node_type() == NodeType::Doctype)
        } else {
            Some(id).filter(|&node| self[node].node_type() == NodeType::Doctype)
        };
        if let Some(node) = unsupported {
            return Err(DomError::UnsupportedKind(self[node].node_type()));
        }

        let top = self.shallow_copy(id);
        if !recursive {
            return Ok(top);
        }

        let mut pending = vec![(id, top)];
        while let Some((source, copy)) = pending.pop() {
            let children = self.children(source).to_vec();
            for child in children {
                let child_copy = self.shallow_copy(child);
                self.link_last(copy, child_copy);
                pending.push((child, child_copy));
            }
        }
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "dom.clone", "cloned {id} -> {top} ({} nodes)", self.descendants(top).count());
        Ok(top)
    }

    fn shallow_copy(&mut self, id: NodeId) -> NodeId {
        let source = &self[id];
        let kind = match &source.kind {
            NodeKind::Document(doc) => NodeKind::Document(DocumentData {
                children: Vec::new(),
                mode: doc.mode,
            }),
            NodeKind::Element(el) => NodeKind::Element(ElementData {
                name: el.name.clone(),
                kind: el.kind,
                attribs: el.attribs.clone(),
                namespace: el.namespace.clone(),
                attribs_namespace: el.attribs_namespace.clone(),
                attribs_prefix: el.attribs_prefix.clone(),
                children: Vec::new(),
            }),
            NodeKind::Cdata { .. } => NodeKind::Cdata {
                children: Vec::new(),
            },
            NodeKind::Text(data) => NodeKind::Text(data.clone()),
            NodeKind::Comment(data) => NodeKind::Comment(data.clone()),
            NodeKind::Directive(directive) => NodeKind::Directive(directive.clone()),
            NodeKind::Doctype => NodeKind::Doctype,
        };
        let mut copy = NodeData::new(kind);
        copy.start_index = source.start_index;
        copy.end_index = source.end_index;
        copy.source_range = source.source_range;
        self.alloc(copy)
    }
}

impl Index<NodeId> for Dom {
    type Output = NodeData;

    fn index(&self, id: NodeId) -> &NodeData {
        match self.get(id) {
            Some(node) => node,
            None => panic!("node {id} does not exist in this dom"),
        }
    }
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dom")
            .field("root", &self.node(self.root))
            .field("live", &self.len())
            .finish()
    }
}

pub struct Descendants<'a> {
    dom: &'a Dom,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.dom.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Borrowed node handle for read-only navigation.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    dom: &'a Dom,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(self) -> NodeId {
        self.id
    }

    pub fn dom(self) -> &'a Dom {
        self.dom
    }

    pub fn data(self) -> &'a NodeData {
        &self.dom[self.id]
    }

    pub fn node_type(self) -> NodeType {
        self.data().node_type()
    }

    fn wrap(self, id: Option<NodeId>) -> Option<NodeRef<'a>> {
        id.and_then(|id| self.dom.get_ref(id))
    }

    pub fn parent(self) -> Option<NodeRef<'a>> {
        self.wrap(self.data().parent)
    }

    pub fn prev(self) -> Option<NodeRef<'a>> {
        self.wrap(self.data().prev)
    }

    pub fn next(self) -> Option<NodeRef<'a>> {
        self.wrap(self.data().next)
    }

    pub fn first_child(self) -> Option<NodeRef<'a>> {
        self.wrap(self.dom.first_child(self.id))
    }

    pub fn last_child(self) -> Option<NodeRef<'a>> {
        self.wrap(self.dom.last_child(self.id))
    }

    pub fn children(self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let dom = self.dom;
        dom.children(self.id).iter().map(move |&id| NodeRef { dom, id })
    }

    pub fn name(self) -> Option<&'a str> {
        self.data().name()
    }

    pub fn text(self) -> Option<&'a str> {
        self.data().data()
    }

    pub fn attribs(self) -> Option<&'a Attributes> {
        self.data().attribs()
    }

    pub fn attr(self, name: &str) -> Option<&'a str> {
        self.attribs().and_then(|attribs| attribs.get(name))
    }

    /// Concatenated text of all text descendants, in document order.
    pub fn text_content(self) -> String {
        let mut out = String::new();
        for id in self.dom.descendants(self.id) {
            if let NodeKind::Text(data) = &self.dom[id].kind {
                out.push_str(data);
            }
        }
        out
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.data();
        match &node.kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => f
                .debug_struct(node.node_type().as_str())
                .field("id", &self.id)
                .field("data", data)
                .finish(),
            NodeKind::Directive(directive) => f
                .debug_struct("directive")
                .field("id", &self.id)
                .field("name", &directive.name)
                .field("data", &directive.data)
                .finish(),
            NodeKind::Doctype => f.debug_struct("doctype").field("id", &self.id).finish(),
            NodeKind::Element(el) => f
                .debug_struct(node.node_type().as_str())
                .field("id", &self.id)
                .field("name", &el.name)
                .field("attribs", &el.attribs)
                .field("children", &self.children().collect::<Vec<_>>())
                .finish(),
            NodeKind::Document(_) | NodeKind::Cdata { .. } => f
                .debug_struct(node.node_type().as_str())
                .field("id", &self.id)
                .field("children", &self.children().collect::<Vec<_>>())
                .finish(),
        }
    }
}
