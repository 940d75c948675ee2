//! DOM Level 1 style accessors over the canonical tree.
//!
//! This is a view, not a second tree: every accessor reads straight from the
//! [`Dom`] arena, so coalescing and indexing behave identically in both modes.

use crate::dom::{Dom, NodeRef};
use crate::node::{NodeId, NodeKind};

/// One entry of [`Level1::attributes`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Level1Attribute<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub namespace: Option<&'a str>,
    pub prefix: Option<&'a str>,
}

#[derive(Clone, Copy, Debug)]
pub struct Level1<'a> {
    node: NodeRef<'a>,
}

impl<'a> Level1<'a> {
    pub fn new(node: NodeRef<'a>) -> Self {
        Self { node }
    }

    pub fn of(dom: &'a Dom, id: NodeId) -> Option<Self> {
        dom.get_ref(id).map(Self::new)
    }

    pub fn id(self) -> NodeId {
        self.node.id()
    }

    pub fn node_type(self) -> u16 {
        self.node.node_type().node_type_number()
    }

    pub fn parent_node(self) -> Option<Level1<'a>> {
        self.node.parent().map(Self::new)
    }

    pub fn previous_sibling(self) -> Option<Level1<'a>> {
        self.node.prev().map(Self::new)
    }

    pub fn next_sibling(self) -> Option<Level1<'a>> {
        self.node.next().map(Self::new)
    }

    pub fn child_nodes(self) -> Vec<Level1<'a>> {
        self.node.children().map(Self::new).collect()
    }

    pub fn first_child(self) -> Option<Level1<'a>> {
        self.node.first_child().map(Self::new)
    }

    pub fn last_child(self) -> Option<Level1<'a>> {
        self.node.last_child().map(Self::new)
    }

    /// Text, comment and directive payloads.
    pub fn node_value(self) -> Option<&'a str> {
        self.node.text()
    }

    /// Element tag name. Directives have a name but no tag name.
    pub fn tag_name(self) -> Option<&'a str> {
        match self.node.data().kind() {
            NodeKind::Element(el) => Some(&el.name),
            _ => None,
        }
    }

    pub fn attributes(self) -> Vec<Level1Attribute<'a>> {
        let NodeKind::Element(el) = self.node.data().kind() else {
            return Vec::new();
        };
        el.attribs
            .iter()
            .map(|(name, value)| Level1Attribute {
                name,
                value,
                namespace: el.attribs_namespace.as_ref().and_then(|ns| ns.get(name)),
                prefix: el.attribs_prefix.as_ref().and_then(|p| p.get(name)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attributes;

    #[test]
    fn level1_view_reads_the_arena() {
        let mut dom = Dom::new();
        let root = dom.root();
        let el = dom.create_element("svg", [("xlink:href", "#a"), ("width", "3")].into_iter().collect());
        let text = dom.create_text("hi");
        let comment = dom.create_comment("note");
        dom.append_child(root, el).expect("append");
        dom.append_child(el, text).expect("append");
        dom.append_child(el, comment).expect("append");
        dom.set_attribs_namespace(
            el,
            Some([("xlink:href", "http://www.w3.org/1999/xlink")].into_iter().collect()),
        )
        .expect("element");
        dom.set_attribs_prefix(el, Some([("xlink:href", "xlink")].into_iter().collect()))
            .expect("element");

        let view = Level1::of(&dom, el).expect("live");
        assert_eq!(view.node_type(), 1);
        assert_eq!(view.tag_name(), Some("svg"));
        assert_eq!(view.node_value(), None);
        assert_eq!(view.parent_node().map(|p| p.node_type()), Some(9));

        let children = view.child_nodes();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].node_type(), 3);
        assert_eq!(children[0].node_value(), Some("hi"));
        assert_eq!(children[1].node_type(), 8);
        assert_eq!(view.first_child().map(Level1::id), Some(text));
        assert_eq!(view.last_child().map(Level1::id), Some(comment));
        assert_eq!(children[0].next_sibling().map(Level1::id), Some(comment));
        assert_eq!(children[1].previous_sibling().map(Level1::id), Some(text));

        let attributes = view.attributes();
        assert_eq!(
            attributes,
            vec![
                Level1Attribute {
                    name: "xlink:href",
                    value: "#a",
                    namespace: Some("http://www.w3.org/1999/xlink"),
                    prefix: Some("xlink"),
                },
                Level1Attribute {
                    name: "width",
                    value: "3",
                    namespace: None,
                    prefix: None,
                },
            ]
        );
    }

    #[test]
    fn cdata_and_directives_map_to_level1_types() {
        let mut dom = Dom::new();
        let root = dom.root();
        let cdata = dom.create_cdata();
        let pi = dom.create_directive("?xml", "?xml version=\"1.0\"");
        let el = dom.create_element("a", Attributes::new());
        for id in [cdata, pi, el] {
            dom.append_child(root, id).expect("append");
        }

        let types: Vec<_> = Level1::of(&dom, root)
            .expect("root")
            .child_nodes()
            .into_iter()
            .map(Level1::node_type)
            .collect();
        assert_eq!(types, vec![4, 1, 1]);
        assert_eq!(Level1::of(&dom, pi).and_then(Level1::tag_name), None);
        assert!(Level1::of(&dom, el).expect("el").attributes().is_empty());
    }
}
