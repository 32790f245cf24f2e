//! Owned, typed view of a tree-sitter parse tree.
//!
//! The extractor works on [`SyntaxNode`] rather than on raw tree-sitter nodes,
//! which keeps the traversal and name lookup independent of the parser and
//! lets tests build trees by hand.

use tree_sitter::{Tree, TreeCursor};

/// Byte and line extent of a node. Lines are 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub end_line: usize,
}

/// Trees can be as deep as the source nests, so building and dropping one
/// never recurses.
#[derive(Debug)]
pub struct SyntaxNode {
    kind: &'static str,
    /// Field name under which the parent holds this node, if any
    field: Option<&'static str>,
    named: bool,
    span: Span,
    children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: &'static str, span: Span) -> Self {
        Self {
            kind,
            field: None,
            named: true,
            span,
            children: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_child(mut self, child: SyntaxNode) -> Self {
        self.children.push(child);
        self
    }

    /// Convert a whole tree-sitter tree, starting at its root.
    pub fn from_tree(tree: &Tree) -> Self {
        let mut cursor = tree.walk();
        // Current node followed by its ancestors, innermost last
        let mut open = vec![Self::at(&cursor)];

        loop {
            if cursor.goto_first_child() {
                open.push(Self::at(&cursor));
                continue;
            }

            // Close finished nodes until one has a next sibling
            while let Some(finished) = open.pop() {
                match open.last_mut() {
                    Some(parent) => parent.children.push(finished),
                    None => return finished,
                }

                if cursor.goto_next_sibling() {
                    open.push(Self::at(&cursor));
                    break;
                }
                cursor.goto_parent();
            }
        }
    }

    fn at(cursor: &TreeCursor) -> Self {
        let node = cursor.node();
        Self {
            kind: node.kind(),
            field: cursor.field_name(),
            named: node.is_named(),
            span: Span {
                start_byte: node.start_byte(),
                end_byte: node.end_byte(),
                start_line: node.start_position().row + 1,
                end_line: node.end_position().row + 1,
            },
            children: Vec::with_capacity(node.child_count()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn is_named(&self) -> bool {
        self.named
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// All children, anonymous tokens included, in source order.
    pub fn children(&self) -> &[SyntaxNode] {
        &self.children
    }

    pub fn named_children(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.children.iter().filter(|c| c.named)
    }

    pub fn child_by_field(&self, field: &str) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| c.field == Some(field))
    }

    /// Source text covered by this node.
    pub fn text<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.span.start_byte..self.span.end_byte)
    }
}

impl Drop for SyntaxNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}
