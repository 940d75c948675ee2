//! Node kinds and per-node payloads.
//!
//! Nodes live in a [`crate::Dom`] arena and refer to each other by [`NodeId`].
//! Containers (`Document`, `Element`, `Cdata`) own an ordered `children`
//! sequence; `parent`/`prev`/`next` are non-owning back-references derived
//! from it and only ever written by the arena's linking code.

use std::fmt;

pub type RawNodeId = u32;

/// Handle to a node slot in a [`crate::Dom`].
///
/// A slot's generation advances each time it is freed, so a handle to a
/// removed node stays stale after the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: RawNodeId,
    generation: u32,
}

impl NodeId {
    pub(crate) const fn new(index: RawNodeId, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation {
            0 => write!(f, "#{}", self.index),
            generation => write!(f, "#{}v{generation}", self.index),
        }
    }
}

/// Classification of a node, as exposed to consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Text,
    Directive,
    Comment,
    Script,
    Style,
    Tag,
    Cdata,
    Doctype,
    Root,
}

impl NodeType {
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeType::Text => "text",
            NodeType::Directive => "directive",
            NodeType::Comment => "comment",
            NodeType::Script => "script",
            NodeType::Style => "style",
            NodeType::Tag => "tag",
            NodeType::Cdata => "cdata",
            NodeType::Doctype => "doctype",
            NodeType::Root => "root",
        }
    }

    /// DOM Level 1 `nodeType` value.
    pub const fn node_type_number(self) -> u16 {
        match self {
            NodeType::Tag | NodeType::Script | NodeType::Style | NodeType::Directive => 1,
            NodeType::Text => 3,
            NodeType::Cdata => 4,
            NodeType::Comment => 8,
            NodeType::Root => 9,
            NodeType::Doctype => 1,
        }
    }

    pub const fn is_tag(self) -> bool {
        matches!(self, NodeType::Tag | NodeType::Script | NodeType::Style)
    }

    pub const fn is_cdata(self) -> bool {
        matches!(self, NodeType::Cdata)
    }

    pub const fn is_text(self) -> bool {
        matches!(self, NodeType::Text)
    }

    pub const fn is_comment(self) -> bool {
        matches!(self, NodeType::Comment)
    }

    pub const fn is_directive(self) -> bool {
        matches!(self, NodeType::Directive)
    }

    pub const fn is_document(self) -> bool {
        matches!(self, NodeType::Root)
    }

    pub const fn has_children(self) -> bool {
        matches!(
            self,
            NodeType::Root | NodeType::Tag | NodeType::Script | NodeType::Style | NodeType::Cdata
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element flavour. Only affects classification, never structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Tag,
    Script,
    Style,
}

impl ElementKind {
    pub fn for_name(name: &str) -> Self {
        match name {
            "script" => ElementKind::Script,
            "style" => ElementKind::Style,
            _ => ElementKind::Tag,
        }
    }

    pub const fn node_type(self) -> NodeType {
        match self {
            ElementKind::Tag => NodeType::Tag,
            ElementKind::Script => NodeType::Script,
            ElementKind::Style => NodeType::Style,
        }
    }
}

/// Attribute map with unique keys that keeps insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    /// Insert or overwrite. An existing key keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Insert only when the key is not present yet. Returns whether it was added.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, value.into()));
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attribs = Attributes::new();
        for (name, value) in iter {
            attribs.insert(name, value);
        }
        attribs
    }
}

/// Document compatibility mode, as reported by an HTML5-aware producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuirksMode {
    NoQuirks,
    Quirks,
    LimitedQuirks,
}

impl QuirksMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            QuirksMode::NoQuirks => "no-quirks",
            QuirksMode::Quirks => "quirks",
            QuirksMode::LimitedQuirks => "limited-quirks",
        }
    }
}

/// Doctype identifiers attached to a `<!doctype ...>` directive by producers
/// that parse them out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DoctypeIds {
    pub name: Option<String>,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

/// Line/column/offset range in the original source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceRange {
    pub start_line: usize,
    pub start_col: usize,
    pub start_offset: usize,
    pub end_line: usize,
    pub end_col: usize,
    pub end_offset: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentData {
    pub(crate) children: Vec<NodeId>,
    pub mode: Option<QuirksMode>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementData {
    pub name: String,
    pub kind: ElementKind,
    pub attribs: Attributes,
    pub namespace: Option<String>,
    pub attribs_namespace: Option<Attributes>,
    pub attribs_prefix: Option<Attributes>,
    pub(crate) children: Vec<NodeId>,
}

impl ElementData {
    pub fn new(name: impl Into<String>, attribs: Attributes, kind: ElementKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attribs,
            namespace: None,
            attribs_namespace: None,
            attribs_prefix: None,
            children: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectiveData {
    pub name: String,
    pub data: String,
    pub doctype: Option<DoctypeIds>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document(DocumentData),
    Element(ElementData),
    Cdata { children: Vec<NodeId> },
    Text(String),
    Comment(String),
    Directive(DirectiveData),
    /// Reserved: representable, but never produced by the builder and not clonable.
    Doctype,
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Document(_) => NodeType::Root,
            NodeKind::Element(el) => el.kind.node_type(),
            NodeKind::Cdata { .. } => NodeType::Cdata,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Directive(_) => NodeType::Directive,
            NodeKind::Doctype => NodeType::Doctype,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match self {
            NodeKind::Document(doc) => &doc.children,
            NodeKind::Element(el) => &el.children,
            NodeKind::Cdata { children } => children,
            NodeKind::Text(_) | NodeKind::Comment(_) | NodeKind::Directive(_) | NodeKind::Doctype => {
                &[]
            }
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            NodeKind::Document(doc) => Some(&mut doc.children),
            NodeKind::Element(el) => Some(&mut el.children),
            NodeKind::Cdata { children } => Some(children),
            NodeKind::Text(_) | NodeKind::Comment(_) | NodeKind::Directive(_) | NodeKind::Doctype => {
                None
            }
        }
    }

    /// Payload of a leaf data node.
    pub fn data(&self) -> Option<&str> {
        match self {
            NodeKind::Text(data) | NodeKind::Comment(data) => Some(data),
            NodeKind::Directive(directive) => Some(&directive.data),
            _ => None,
        }
    }

    pub(crate) fn data_mut(&mut self) -> Option<&mut String> {
        match self {
            NodeKind::Text(data) | NodeKind::Comment(data) => Some(data),
            NodeKind::Directive(directive) => Some(&mut directive.data),
            _ => None,
        }
    }

    /// Tag name of an element or name of a directive.
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeKind::Element(el) => Some(&el.name),
            NodeKind::Directive(directive) => Some(&directive.name),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.node_type().has_children()
    }
}

/// A node slot: kind payload plus derived linkage and optional source offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) start_index: Option<usize>,
    pub(crate) end_index: Option<usize>,
    pub(crate) source_range: Option<SourceRange>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            prev: None,
            next: None,
            start_index: None,
            end_index: None,
            source_range: None,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn prev(&self) -> Option<NodeId> {
        self.prev
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub fn children(&self) -> &[NodeId] {
        self.kind.children()
    }

    pub fn start_index(&self) -> Option<usize> {
        self.start_index
    }

    pub fn end_index(&self) -> Option<usize> {
        self.end_index
    }

    pub fn source_range(&self) -> Option<SourceRange> {
        self.source_range
    }

    pub fn data(&self) -> Option<&str> {
        self.kind.data()
    }

    pub fn name(&self) -> Option<&str> {
        self.kind.name()
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_directive(&self) -> Option<&DirectiveData> {
        match &self.kind {
            NodeKind::Directive(directive) => Some(directive),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&DocumentData> {
        match &self.kind {
            NodeKind::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn attribs(&self) -> Option<&Attributes> {
        self.as_element().map(|el| &el.attribs)
    }

    pub fn is_tag(&self) -> bool {
        self.node_type().is_tag()
    }

    pub fn is_text(&self) -> bool {
        self.node_type().is_text()
    }

    pub fn is_comment(&self) -> bool {
        self.node_type().is_comment()
    }

    pub fn is_cdata(&self) -> bool {
        self.node_type().is_cdata()
    }

    pub fn is_directive(&self) -> bool {
        self.node_type().is_directive()
    }

    pub fn is_document(&self) -> bool {
        self.node_type().is_document()
    }

    pub fn has_children(&self) -> bool {
        self.node_type().has_children()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_and_style_names_pick_specialized_kinds() {
        assert_eq!(ElementKind::for_name("script"), ElementKind::Script);
        assert_eq!(ElementKind::for_name("style"), ElementKind::Style);
        assert_eq!(ElementKind::for_name("div"), ElementKind::Tag);
        // Names are compared as supplied; case folding is the tokenizer's job.
        assert_eq!(ElementKind::for_name("SCRIPT"), ElementKind::Tag);
    }

    #[test]
    fn type_guards_cover_every_kind() {
        assert!(NodeType::Tag.is_tag());
        assert!(NodeType::Script.is_tag());
        assert!(NodeType::Style.is_tag());
        assert!(!NodeType::Directive.is_tag());

        assert!(NodeType::Root.has_children());
        assert!(NodeType::Cdata.has_children());
        assert!(!NodeType::Text.has_children());
        assert!(!NodeType::Comment.has_children());
        assert!(!NodeType::Directive.has_children());
        assert!(!NodeType::Doctype.has_children());
    }

    #[test]
    fn level1_node_type_numbers() {
        assert_eq!(NodeType::Tag.node_type_number(), 1);
        assert_eq!(NodeType::Directive.node_type_number(), 1);
        assert_eq!(NodeType::Text.node_type_number(), 3);
        assert_eq!(NodeType::Cdata.node_type_number(), 4);
        assert_eq!(NodeType::Comment.node_type_number(), 8);
        assert_eq!(NodeType::Root.node_type_number(), 9);
    }

    #[test]
    fn attributes_keep_insertion_order_and_unique_keys() {
        let mut attribs = Attributes::new();
        attribs.insert("b", "1");
        attribs.insert("a", "2");
        attribs.insert("c", "3");
        assert_eq!(attribs.insert("a", "4"), Some("2".to_string()));
        assert!(!attribs.insert_if_absent("b", "5"));

        let collected: Vec<_> = attribs.iter().collect();
        assert_eq!(collected, vec![("b", "1"), ("a", "4"), ("c", "3")]);
        assert_eq!(attribs.remove("a"), Some("4".to_string()));
        assert_eq!(attribs.len(), 2);
    }

    #[test]
    fn container_kinds_have_no_data_payload() {
        let doc = NodeKind::Document(DocumentData::default());
        assert_eq!(doc.data(), None);
        assert!(doc.is_container());

        let text = NodeKind::Text("hi".to_string());
        assert_eq!(text.data(), Some("hi"));
        assert!(text.children().is_empty());
        assert!(!text.is_container());
    }
}
