//! Parsed-document model: a flat arena of structural nodes over the
//! original text.
//!
//! Nodes never own text. Each one carries a [`Location`] into the
//! document it was parsed from, so every later pass can splice the
//! original bytes instead of re-serializing a tree.

use std::fmt;

use crate::location::{LineIndex, Location};

/// Arena index of a node within its [`Document`].
pub type NodeId = usize;

/// Which of the three documents of a merge a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocRole {
    /// The file on disk, possibly hand-edited.
    Current,
    /// The freshly generated fragment.
    New,
    /// The reconstructed output of the previous generation.
    Previous,
}

impl fmt::Display for DocRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocRole::Current => write!(f, "current"),
            DocRole::New => write!(f, "new"),
            DocRole::Previous => write!(f, "previous"),
        }
    }
}

/// Granularity units that are not derived from a syntax tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    File,
    Line,
}

/// Structural category of a node. Matching never pairs nodes of
/// different kinds, whatever their signatures say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Named program element: type, function, method, field.
    Declaration,
    /// Executable statement inside a declaration body.
    Statement,
    /// Whole-file or per-line unit used by the plain granularities.
    Custom(UnitKind),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Declaration => write!(f, "declaration"),
            NodeKind::Statement => write!(f, "statement"),
            NodeKind::Custom(UnitKind::File) => write!(f, "file"),
            NodeKind::Custom(UnitKind::Line) => write!(f, "line"),
        }
    }
}

/// Identity string distilled from a node's semantically relevant
/// parts. Two nodes with equal kind and equal signature are treated
/// as the same structural element across documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn new(s: impl Into<String>) -> Self {
        Signature(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One structural element of a document.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub signature: Signature,
    pub location: Location,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Caret just inside the opening of this node's body, where a
    /// splice can land when no child offers an anchor. Set for
    /// container nodes and the root, `None` for leaves.
    pub body_insert: Option<Location>,
}

impl Node {
    /// Structural equivalence: same kind, same signature. Textual
    /// differences inside the span are invisible at this level.
    pub fn is_equivalent(&self, other: &Node) -> bool {
        self.kind == other.kind && self.signature == other.signature
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A parsed document: original text, its line index, and the node
/// arena. `nodes[0]` is always the root, which anchors the top-level
/// scope but never takes part in matching itself.
#[derive(Debug, Clone)]
pub struct Document {
    role: DocRole,
    text: String,
    index: LineIndex,
    nodes: Vec<Node>,
}

impl Document {
    pub fn role(&self) -> DocRole {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn index(&self) -> &LineIndex {
        &self.index
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Original bytes under a node's span.
    pub fn node_text(&self, id: NodeId) -> &str {
        &self.text[self.index.byte_range(&self.nodes[id].location)]
    }

    /// Original bytes under an arbitrary span of this document.
    pub fn text_at(&self, loc: &Location) -> &str {
        &self.text[self.index.byte_range(loc)]
    }

    /// Node whose span is exactly `loc`, if any.
    pub fn node_at(&self, loc: &Location) -> Option<&Node> {
        self.nodes.iter().find(|n| n.location == *loc)
    }

    /// Preorder walk of a node's descendants, excluding the node.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev());
        }
        out
    }

    /// A document with no content worth matching. Such a document
    /// exposes no units at any granularity, so everything on the other
    /// side of a comparison comes back unmatched.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Incremental constructor used by the parsers. Creates the root up
/// front; children are appended in document order.
#[derive(Debug)]
pub struct DocumentBuilder {
    role: DocRole,
    text: String,
    index: LineIndex,
    nodes: Vec<Node>,
}

impl DocumentBuilder {
    pub fn new(role: DocRole, text: impl Into<String>) -> Self {
        let text = text.into();
        let index = LineIndex::new(&text);
        let location = index.location_of(0..text.len());
        let root = Node {
            id: 0,
            kind: NodeKind::Custom(UnitKind::File),
            signature: Signature::new("<document>"),
            location,
            parent: None,
            children: Vec::new(),
            body_insert: Some(Location::caret(1, 1)),
        };
        DocumentBuilder {
            role,
            text,
            index,
            nodes: vec![root],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn index(&self) -> &LineIndex {
        &self.index
    }

    /// Append a leaf node under `parent`.
    pub fn add(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        signature: Signature,
        location: Location,
    ) -> NodeId {
        self.add_container(parent, kind, signature, location, None)
    }

    /// Append a node that may hold children, with an optional caret
    /// for splices into an empty body.
    pub fn add_container(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        signature: Signature,
        location: Location,
        body_insert: Option<Location>,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            kind,
            signature,
            location,
            parent: Some(parent),
            children: Vec::new(),
            body_insert,
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn finish(self) -> Document {
        Document {
            role: self.role,
            text: self.text,
            index: self.index,
            nodes: self.nodes,
        }
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
/// This is the textual-equality lens: layout drift is invisible, any
/// token change is not.
pub(crate) fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_gap = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            in_gap = true;
        } else {
            if in_gap && !out.is_empty() {
                out.push(' ');
            }
            in_gap = false;
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let text = "class A {\n    int x;\n}\n";
        let mut b = DocumentBuilder::new(DocRole::Current, text);
        let class = b.add_container(
            b.root(),
            NodeKind::Declaration,
            Signature::new("class A"),
            Location::new(1, 1, 3, 2),
            Some(Location::caret(1, 10)),
        );
        b.add(
            class,
            NodeKind::Declaration,
            Signature::new("field x int"),
            Location::new(2, 5, 2, 11),
        );
        b.finish()
    }

    #[test]
    fn builder_wires_parents_and_children() {
        let doc = sample();
        assert_eq!(doc.node_count(), 3);
        assert_eq!(doc.root().children, vec![1]);
        assert_eq!(doc.node(1).children, vec![2]);
        assert_eq!(doc.node(2).parent, Some(1));
        assert_eq!(doc.descendants(0), vec![1, 2]);
        assert_eq!(doc.descendants(1), vec![2]);
    }

    #[test]
    fn node_text_slices_original_bytes() {
        let doc = sample();
        assert_eq!(doc.node_text(2), "int x;");
        assert_eq!(doc.node_text(1), "class A {\n    int x;\n}");
    }

    #[test]
    fn node_at_finds_exact_spans_only() {
        let doc = sample();
        assert!(doc.node_at(&Location::new(2, 5, 2, 11)).is_some());
        assert!(doc.node_at(&Location::new(2, 5, 2, 10)).is_none());
    }

    #[test]
    fn equivalence_requires_kind_and_signature() {
        let doc = sample();
        let field = doc.node(2);
        let mut same = field.clone();
        same.location = Location::new(9, 1, 9, 7);
        assert!(field.is_equivalent(&same));
        let mut other_kind = field.clone();
        other_kind.kind = NodeKind::Statement;
        assert!(!field.is_equivalent(&other_kind));
        let mut other_sig = field.clone();
        other_sig.signature = Signature::new("field y int");
        assert!(!field.is_equivalent(&other_sig));
    }

    #[test]
    fn blank_documents_are_detected() {
        let blank = DocumentBuilder::new(DocRole::Current, "  \n\t\n").finish();
        assert!(blank.is_blank());
        assert!(!sample().is_blank());
    }

    #[test]
    fn normalize_collapses_layout_only() {
        assert_eq!(normalize_text("  this.s   =\n\ta;  "), "this.s = a;");
        assert_eq!(normalize_text("this.s = a;"), "this.s = a;");
        assert_ne!(normalize_text("this.s = a;"), normalize_text("this.s = b;"));
        assert_eq!(normalize_text("   \n\t"), "");
    }
}
