use super::error::{ParseError, Result};
use super::language::Language;
use std::collections::HashMap;
use tree_sitter::Parser;

const TYPESCRIPT_NODES: &[&str] = &[
    "function_declaration",
    "arrow_function",
    "method_definition",
    "class_declaration",
    "interface_declaration",
    "type_alias_declaration",
    "export_statement",
    "lexical_declaration",
];

const JAVASCRIPT_NODES: &[&str] = &[
    "function_declaration",
    "arrow_function",
    "method_definition",
    "class_declaration",
    "export_statement",
    "lexical_declaration",
];

const PYTHON_NODES: &[&str] = &["function_definition", "class_definition", "decorated_definition"];

const GO_NODES: &[&str] = &["function_declaration", "method_declaration", "type_declaration"];

const RUST_NODES: &[&str] = &["function_item", "impl_item", "struct_item", "enum_item", "trait_item"];

const JAVA_NODES: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "method_declaration",
    "constructor_declaration",
];

const CPP_NODES: &[&str] = &[
    "function_definition",
    "class_specifier",
    "struct_specifier",
    "enum_specifier",
];

const CSHARP_NODES: &[&str] = &[
    "class_declaration",
    "struct_declaration",
    "interface_declaration",
    "enum_declaration",
    "method_declaration",
    "constructor_declaration",
];

/// A loaded tree-sitter grammar plus the node types worth extracting from it
#[derive(Clone, Copy)]
pub struct Grammar {
    language: Language,
    ts_language: tree_sitter::Language,
    extractable: &'static [&'static str],
    scan_identifier: bool,
}

impl Grammar {
    pub fn new(
        language: Language,
        ts_language: tree_sitter::Language,
        extractable: &'static [&'static str],
    ) -> Self {
        Self {
            language,
            ts_language,
            extractable,
            scan_identifier: false,
        }
    }

    /// Resolve unit names by scanning immediate children for a bare
    /// `identifier` token when no `name` field is wired up.
    pub fn with_identifier_scan(mut self) -> Self {
        self.scan_identifier = true;
        self
    }

    /// Built-in grammar for a language, as shipped with the binary.
    pub fn builtin(language: Language) -> Self {
        match language {
            Language::TypeScript => Self::new(
                language,
                tree_sitter_typescript::language_typescript(),
                TYPESCRIPT_NODES,
            ),
            Language::Tsx => Self::new(language, tree_sitter_typescript::language_tsx(), TYPESCRIPT_NODES),
            Language::JavaScript => Self::new(language, tree_sitter_javascript::language(), JAVASCRIPT_NODES),
            Language::Python => {
                Self::new(language, tree_sitter_python::language(), PYTHON_NODES).with_identifier_scan()
            }
            Language::Go => Self::new(language, tree_sitter_go::language(), GO_NODES).with_identifier_scan(),
            Language::Rust => Self::new(language, tree_sitter_rust::language(), RUST_NODES),
            Language::Java => Self::new(language, tree_sitter_java::language(), JAVA_NODES),
            Language::Cpp => Self::new(language, tree_sitter_cpp::language(), CPP_NODES),
            Language::CSharp => Self::new(language, tree_sitter_c_sharp::language(), CSHARP_NODES),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn is_extractable(&self, kind: &str) -> bool {
        self.extractable.contains(&kind)
    }

    pub fn scans_identifiers(&self) -> bool {
        self.scan_identifier
    }

    /// Fresh parser bound to this grammar. Parsers are never shared between
    /// calls, so concurrent parses cannot interfere.
    pub fn parser(&self) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(self.ts_language)
            .map_err(|e| ParseError::SetLanguage {
                language: self.language,
                message: e.to_string(),
            })?;
        Ok(parser)
    }
}

/// Grammars available to the extractor, built once at startup
#[derive(Clone, Default)]
pub struct GrammarRegistry {
    grammars: HashMap<Language, Grammar>,
}

impl GrammarRegistry {
    /// Empty registry; every lookup reports the grammar as not loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in grammar loaded.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        for language in Language::ALL {
            registry.register(Grammar::builtin(language));
        }
        registry
    }

    pub fn register(&mut self, grammar: Grammar) {
        tracing::debug!("Registered {} grammar", grammar.language());
        self.grammars.insert(grammar.language(), grammar);
    }

    pub fn get(&self, language: Language) -> Result<&Grammar> {
        self.grammars
            .get(&language)
            .ok_or(ParseError::GrammarNotLoaded(language))
    }

    pub fn is_loaded(&self, language: Language) -> bool {
        self.grammars.contains_key(&language)
    }

    pub fn len(&self) -> usize {
        self.grammars.len()
    }
}
