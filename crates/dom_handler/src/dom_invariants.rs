//! Structural checks over a subtree.
//!
//! Used by tests and by the `parser_invariants` feature, which re-checks
//! the whole tree after every builder event.

use crate::dom::Dom;
use crate::node::NodeId;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A container lists a child that no longer exists.
    MissingChild { parent: NodeId, child: NodeId },
    /// `child.parent` does not point at the container listing it.
    WrongParent {
        parent: NodeId,
        child: NodeId,
        found: Option<NodeId>,
    },
    /// `prev`/`next` disagree with the container's children order.
    BrokenSiblingLink {
        parent: NodeId,
        index: usize,
        link: &'static str,
        expected: Option<NodeId>,
        found: Option<NodeId>,
    },
    /// A leaf node reports children.
    LeafWithChildren(NodeId),
    /// `start_index` is past `end_index`.
    InvertedIndices {
        node: NodeId,
        start: usize,
        end: usize,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::MissingChild { parent, child } => {
                write!(f, "{parent} lists missing child {child}")
            }
            InvariantViolation::WrongParent {
                parent,
                child,
                found,
            } => write!(f, "{child} is a child of {parent} but its parent is {found:?}"),
            InvariantViolation::BrokenSiblingLink {
                parent,
                index,
                link,
                expected,
                found,
            } => write!(
                f,
                "child {index} of {parent}: `{link}` is {found:?}, expected {expected:?}"
            ),
            InvariantViolation::LeafWithChildren(id) => write!(f, "leaf {id} has children"),
            InvariantViolation::InvertedIndices { node, start, end } => {
                write!(f, "{node} starts at {start} but ends at {end}")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Verify parent/sibling linkage, leaf shape and index order for every node
/// under `id` (inclusive). Reports the first violation in document order.
pub fn check_tree(dom: &Dom, id: NodeId) -> Result<(), InvariantViolation> {
    for node_id in dom.descendants(id) {
        let node = &dom[node_id];
        if let (Some(start), Some(end)) = (node.start_index(), node.end_index()) {
            if start > end {
                return Err(InvariantViolation::InvertedIndices {
                    node: node_id,
                    start,
                    end,
                });
            }
        }
        let children = node.children();
        if !node.has_children() {
            if !children.is_empty() {
                return Err(InvariantViolation::LeafWithChildren(node_id));
            }
            continue;
        }
        for (index, &child) in children.iter().enumerate() {
            let Some(child_node) = dom.get(child) else {
                return Err(InvariantViolation::MissingChild {
                    parent: node_id,
                    child,
                });
            };
            if child_node.parent() != Some(node_id) {
                return Err(InvariantViolation::WrongParent {
                    parent: node_id,
                    child,
                    found: child_node.parent(),
                });
            }
            let expected_prev = index.checked_sub(1).map(|i| children[i]);
            let expected_next = children.get(index + 1).copied();
            for (link, expected, found) in [
                ("prev", expected_prev, child_node.prev()),
                ("next", expected_next, child_node.next()),
            ] {
                if expected != found {
                    return Err(InvariantViolation::BrokenSiblingLink {
                        parent: node_id,
                        index,
                        link,
                        expected,
                        found,
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attributes;

    #[test]
    fn well_formed_tree_passes() {
        let mut dom = Dom::new();
        let root = dom.root();
        let div = dom.create_element("div", Attributes::new());
        dom.append_child(root, div).expect("append");
        for text in ["a", "b", "c"] {
            let t = dom.create_text(text);
            dom.append_child(div, t).expect("append");
        }
        assert_eq!(check_tree(&dom, root), Ok(()));
    }

    #[test]
    fn inverted_indices_are_reported() {
        let mut dom = Dom::new();
        let root = dom.root();
        let t = dom.create_text("x");
        dom.append_child(root, t).expect("append");
        dom.set_start_index(t, 9);
        dom.set_end_index(t, 3);
        assert_eq!(
            check_tree(&dom, root),
            Err(InvariantViolation::InvertedIndices {
                node: t,
                start: 9,
                end: 3
            })
        );
    }
}
