use super::error::{ParseError, Result};
use super::grammar::{Grammar, GrammarRegistry};
use super::language::Language;
use super::syntax::SyntaxNode;
use super::SyntaxUnit;

/// Parse `content` and extract its syntax units.
///
/// Returns [`ParseError::GrammarNotLoaded`] when the registry has no grammar
/// for `language`; callers fall back to line-based chunking.
pub fn extract(registry: &GrammarRegistry, content: &str, language: Language) -> Result<Vec<SyntaxUnit>> {
    let grammar = registry.get(language)?;
    let mut parser = grammar.parser()?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| ParseError::ParseFailed(language.to_string()))?;

    let root = SyntaxNode::from_tree(&tree);
    Ok(extract_units(grammar, &root, content))
}

/// Pre-order walk collecting maximal extractable nodes.
///
/// A matching node is emitted whole and its children are not visited; any
/// other node is searched for matches among its descendants.
pub fn extract_units(grammar: &Grammar, root: &SyntaxNode, source: &str) -> Vec<SyntaxUnit> {
    let mut units = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if grammar.is_extractable(node.kind()) {
            let Some(content) = node.text(source) else {
                tracing::debug!("Skipping {} with span outside source", node.kind());
                continue;
            };
            if content.trim().is_empty() {
                continue;
            }
            let span = node.span();
            units.push(SyntaxUnit {
                kind: node.kind().to_string(),
                name: unit_name(grammar, node, source),
                start_line: span.start_line,
                end_line: span.end_line,
                content: content.to_string(),
            });
            continue;
        }

        // Reverse so children pop in source order
        stack.extend(node.children().iter().rev());
    }

    units
}

fn unit_name(grammar: &Grammar, node: &SyntaxNode, source: &str) -> Option<String> {
    let by_field = node.child_by_field("name").or_else(|| {
        node.child_by_field("declarator")
            .and_then(|declarator| declarator.child_by_field("name"))
    });

    if let Some(name) = by_field {
        return name.text(source).map(str::to_string);
    }

    if grammar.scans_identifiers() {
        return node
            .children()
            .iter()
            .find(|child| child.kind() == "identifier")
            .and_then(|child| child.text(source))
            .map(str::to_string);
    }

    None
}
