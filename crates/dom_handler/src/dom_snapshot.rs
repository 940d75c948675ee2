use crate::dom::Dom;
use crate::node::{NodeData, NodeId, NodeKind};
use std::fmt::{self, Write};
use std::sync::OnceLock;

/// Deterministic DOM serialization and equality rules for streaming/corpus tests.
/// Not a public stable format; intended for internal test comparisons.
///
/// Equivalence rules:
/// - Node kinds must match (script/style/tag are distinct kinds).
/// - Element and directive names must match.
/// - Attribute order is significant; names and values must match.
/// - Text, comment and directive payloads must match exactly.
/// - Start/end indices and passthrough metadata are compared only when the
///   corresponding option is set.
/// - Node ids never participate.
#[derive(Clone, Copy, Debug, Default)]
pub struct DomSnapshotOptions {
    pub include_indices: bool,
    pub include_metadata: bool,
}

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(dom: &Dom, id: NodeId, options: DomSnapshotOptions) -> Self {
        let mut lines = Vec::new();
        const INDENT_STEP: usize = 2;
        // Iterative pre-order walk; documents can nest deeper than the stack allows.
        let mut stack = vec![(id, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = dom.get(id) else {
                continue;
            };
            let mut line = " ".repeat(depth.saturating_mul(INDENT_STEP));
            write_node_line(&mut line, node, &options);
            lines.push(line);
            stack.extend(node.children().iter().rev().map(|&child| (child, depth + 1)));
        }
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct DomMismatch<'a> {
    path: String,
    detail: String,
    expected: String,
    actual: String,
    expected_dom: &'a Dom,
    expected_node: NodeId,
    actual_dom: &'a Dom,
    actual_node: NodeId,
    options: DomSnapshotOptions,
    expected_subtree: OnceLock<String>,
    actual_subtree: OnceLock<String>,
}

impl DomMismatch<'_> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for DomMismatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected_subtree = self.expected_subtree.get_or_init(|| {
            DomSnapshot::new(self.expected_dom, self.expected_node, self.options).render()
        });
        let actual_subtree = self.actual_subtree.get_or_init(|| {
            DomSnapshot::new(self.actual_dom, self.actual_node, self.options).render()
        });
        writeln!(f, "DOM mismatch at {}: {}", self.path, self.detail)?;
        writeln!(f, "expected: {}", self.expected)?;
        writeln!(f, "actual:   {}", self.actual)?;
        writeln!(f, "expected subtree:\n{}", expected_subtree)?;
        writeln!(f, "actual subtree:\n{}", actual_subtree)?;
        Ok(())
    }
}

impl std::error::Error for DomMismatch<'_> {}

/// Compare two whole documents.
pub fn assert_dom_eq(expected: &Dom, actual: &Dom, options: DomSnapshotOptions) {
    if let Err(mismatch) = compare_dom(expected, expected.root(), actual, actual.root(), options) {
        panic!("{mismatch}");
    }
}

/// Compare the subtree at `expected_id` with the one at `actual_id`.
///
/// The two subtrees may live in the same arena.
pub fn compare_dom<'a>(
    expected_dom: &'a Dom,
    expected_id: NodeId,
    actual_dom: &'a Dom,
    actual_id: NodeId,
    options: DomSnapshotOptions,
) -> Result<(), Box<DomMismatch<'a>>> {
    let ctx = CompareCtx {
        expected_dom,
        actual_dom,
        options,
    };
    // (expected, actual, path depth) pairs still to visit.
    let mut pending = vec![(expected_id, actual_id, 0usize)];
    let mut path = vec![node_label(expected_dom, expected_id)];
    while let Some((expected, actual, depth)) = pending.pop() {
        path.truncate(depth + 1);
        if depth > 0 {
            let index = expected_dom
                .parent(expected)
                .map(|parent| expected_dom.children(parent))
                .and_then(|siblings| siblings.iter().position(|&id| id == expected))
                .unwrap_or(0);
            path.push(format!("{}[{}]", node_label(expected_dom, expected), index));
        }
        ctx.compare_node(expected, actual, &path)?;
        let expected_children = expected_dom.children(expected);
        let actual_children = actual_dom.children(actual);
        pending.extend(
            expected_children
                .iter()
                .zip(actual_children)
                .rev()
                .map(|(&e, &a)| (e, a, depth + 1)),
        );
    }
    Ok(())
}

struct CompareCtx<'a> {
    expected_dom: &'a Dom,
    actual_dom: &'a Dom,
    options: DomSnapshotOptions,
}

impl<'a> CompareCtx<'a> {
    fn compare_node(
        &self,
        expected: NodeId,
        actual: NodeId,
        path: &[String],
    ) -> Result<(), Box<DomMismatch<'a>>> {
        let fail = |detail: &str| Err(Box::new(self.mismatch(path, detail, expected, actual)));
        let (Some(exp), Some(act)) = (self.expected_dom.get(expected), self.actual_dom.get(actual))
        else {
            return fail("missing node");
        };

        if exp.node_type() != act.node_type() {
            return fail("node kind");
        }
        match (exp.kind(), act.kind()) {
            (NodeKind::Element(e), NodeKind::Element(a)) => {
                if e.name != a.name {
                    return fail("element name");
                }
                if e.attribs.len() != a.attribs.len() {
                    return fail("attribute count");
                }
                for (i, (exp_attr, act_attr)) in e.attribs.iter().zip(a.attribs.iter()).enumerate() {
                    if exp_attr.0 != act_attr.0 {
                        return fail(&format!("attribute name at index {i}"));
                    }
                    if exp_attr.1 != act_attr.1 {
                        return fail(&format!("attribute value at index {i}"));
                    }
                }
                if self.options.include_metadata
                    && (e.namespace != a.namespace
                        || e.attribs_namespace != a.attribs_namespace
                        || e.attribs_prefix != a.attribs_prefix)
                {
                    return fail("element metadata");
                }
            }
            (NodeKind::Text(e), NodeKind::Text(a)) => {
                if e != a {
                    return fail("text");
                }
            }
            (NodeKind::Comment(e), NodeKind::Comment(a)) => {
                if e != a {
                    return fail("comment");
                }
            }
            (NodeKind::Directive(e), NodeKind::Directive(a)) => {
                if e.name != a.name || e.data != a.data {
                    return fail("directive");
                }
                if self.options.include_metadata && e.doctype != a.doctype {
                    return fail("doctype identifiers");
                }
            }
            (NodeKind::Document(e), NodeKind::Document(a)) => {
                if self.options.include_metadata && e.mode != a.mode {
                    return fail("document mode");
                }
            }
            _ => {}
        }

        if self.options.include_indices
            && (exp.start_index() != act.start_index() || exp.end_index() != act.end_index())
        {
            return fail("source indices");
        }
        if self.options.include_metadata && exp.source_range() != act.source_range() {
            return fail("source range");
        }

        let (exp_children, act_children) = (exp.children().len(), act.children().len());
        if exp_children != act_children {
            return fail(&format!(
                "child count (expected {exp_children}, actual {act_children})"
            ));
        }
        Ok(())
    }

    fn mismatch(
        &self,
        path: &[String],
        detail: &str,
        expected: NodeId,
        actual: NodeId,
    ) -> DomMismatch<'a> {
        let path = format!("/{}", path.join("/"));
        let expected_line = format_node_line(self.expected_dom, expected, &self.options);
        let actual_line = format_node_line(self.actual_dom, actual, &self.options);
        DomMismatch {
            path,
            detail: detail.to_string(),
            expected: truncate_line(expected_line, 160),
            actual: truncate_line(actual_line, 160),
            expected_dom: self.expected_dom,
            expected_node: expected,
            actual_dom: self.actual_dom,
            actual_node: actual,
            options: self.options,
            expected_subtree: OnceLock::new(),
            actual_subtree: OnceLock::new(),
        }
    }
}

fn node_label(dom: &Dom, id: NodeId) -> String {
    let Some(node) = dom.get(id) else {
        return "#missing".to_string();
    };
    match node.kind() {
        NodeKind::Document(_) => "#document".to_string(),
        NodeKind::Element(el) => {
            let mut label = el.name.clone();
            let id_attr = el.attribs.get("id").filter(|value| !value.is_empty());
            let class_attr = el.attribs.get("class").filter(|value| !value.is_empty());
            if let Some(id_value) = id_attr {
                label.push('#');
                write_escaped(&mut label, id_value);
            } else if let Some(class_value) = class_attr {
                label.push_str(".class=");
                write_escaped(&mut label, class_value);
            }
            label
        }
        NodeKind::Text(_) => "#text".to_string(),
        NodeKind::Comment(_) => "#comment".to_string(),
        NodeKind::Cdata { .. } => "#cdata".to_string(),
        NodeKind::Directive(directive) => format!("#directive({})", directive.name),
        NodeKind::Doctype => "#doctype".to_string(),
    }
}

fn truncate_line(mut line: String, max_len: usize) -> String {
    if line.len() > max_len {
        let mut cut = max_len.saturating_sub(3);
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        line.truncate(cut);
        line.push_str("...");
    }
    line
}

fn format_node_line(dom: &Dom, id: NodeId, options: &DomSnapshotOptions) -> String {
    let mut line = String::new();
    match dom.get(id) {
        Some(node) => write_node_line(&mut line, node, options),
        None => line.push_str("#missing"),
    }
    line
}

fn write_node_line(out: &mut String, node: &NodeData, options: &DomSnapshotOptions) {
    match node.kind() {
        NodeKind::Document(doc) => {
            out.push_str("#document");
            if let (true, Some(mode)) = (options.include_metadata, doc.mode) {
                out.push_str(" mode=");
                out.push_str(mode.as_str());
            }
        }
        NodeKind::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (attr, value) in el.attribs.iter() {
                out.push(' ');
                out.push_str(attr);
                out.push_str("=\"");
                write_escaped(out, value);
                out.push('"');
            }
            if options.include_metadata {
                if let Some(namespace) = &el.namespace {
                    out.push_str(" ns=\"");
                    write_escaped(out, namespace);
                    out.push('"');
                }
            }
            out.push('>');
        }
        NodeKind::Text(text) => {
            out.push('"');
            write_escaped(out, text);
            out.push('"');
        }
        NodeKind::Comment(text) => {
            out.push_str("<!-- ");
            write_escaped(out, text);
            out.push_str(" -->");
        }
        NodeKind::Cdata { .. } => out.push_str("#cdata"),
        NodeKind::Directive(directive) => {
            out.push_str("#directive ");
            out.push_str(&directive.name);
            out.push_str(" \"");
            write_escaped(out, &directive.data);
            out.push('"');
        }
        NodeKind::Doctype => out.push_str("#doctype"),
    }
    if options.include_indices {
        let _ = write!(
            out,
            " [{}..{}]",
            IndexLabel(node.start_index()),
            IndexLabel(node.end_index())
        );
    }
}

struct IndexLabel(Option<usize>);

impl fmt::Display for IndexLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(index) => write!(f, "{index}"),
            None => f.write_str("_"),
        }
    }
}

fn write_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ if ch.is_ascii() => out.push(ch),
            _ => {
                let _ = write!(out, "\\u{{{:X}}}", ch as u32);
            }
        }
    }
}
