pub mod assembler;
pub mod code_parser;
pub mod error;
pub mod extractor;
pub mod fallback;
pub mod grammar;
pub mod language;
pub mod syntax;

use serde::{Deserialize, Serialize};

/// Target size of a chunk produced by splitting, in characters.
pub const MAX_CHUNK_SIZE: usize = 1500;

/// Trailing lines carried into the next chunk at a split boundary.
pub const OVERLAP_LINES: usize = 3;

/// One tracked file of a repository snapshot, already decoded as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Named syntactic element found by the extractor (function, class, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxUnit {
    /// Raw grammar node type, e.g. `function_declaration`
    pub kind: String,
    pub name: Option<String>,
    /// 1-based, inclusive
    pub start_line: usize,
    /// 1-based, inclusive
    pub end_line: usize,
    /// Exact source text of the node
    pub content: String,
}

impl SyntaxUnit {
    /// Size used for chunk classification, in characters.
    pub fn size(&self) -> usize {
        self.content.chars().count()
    }
}

/// Code chunk: the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub file_path: String,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub chunk_type: ChunkType,
    pub name: Option<String>,
    pub language: String,
}

impl Chunk {
    /// Text handed to the embedding provider: location metadata followed by the code.
    pub fn embedding_text(&self) -> String {
        let mut text = format!("File: {}\n", self.file_path);
        if let Some(name) = &self.name {
            text.push_str(&format!("{}: {}\n", self.chunk_type.as_str(), name));
        }
        text.push_str(&format!("Lines {}-{}:\n", self.start_line, self.end_line));
        text.push_str(&self.content);
        text
    }
}

/// Type of code chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Function,
    Class,
    Method,
    Module,
    Imports,
    Other,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Method => "method",
            ChunkType::Module => "module",
            ChunkType::Imports => "imports",
            ChunkType::Other => "other",
        }
    }

    /// Map a raw grammar node type onto a chunk type.
    ///
    /// Checks run in order, so `method_definition` is not a function but
    /// `function_item` inside anything is.
    pub fn from_node_kind(kind: &str) -> Self {
        if kind.contains("function") || kind.contains("arrow") {
            ChunkType::Function
        } else if kind.contains("class") || kind.contains("struct") || kind.contains("impl") {
            ChunkType::Class
        } else if kind.contains("method") {
            ChunkType::Method
        } else if kind.contains("interface") || kind.contains("type") || kind.contains("trait") {
            ChunkType::Module
        } else {
            ChunkType::Other
        }
    }
}

/// Split text into lines the way the chunkers count them: on `\n` only, so a
/// trailing newline yields a final empty line.
pub(crate) fn split_lines(content: &str) -> Vec<&str> {
    content.split('\n').collect()
}

/// Last `n` lines of a chunk, joined back together.
pub(crate) fn tail_lines(chunk: &str, n: usize) -> String {
    let lines: Vec<&str> = chunk.split('\n').collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Line accumulator shared by the fallback chunker and the large-unit
/// splitter. Tracks the character count so size checks stay linear.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    text: String,
    chars: usize,
}

impl LineBuffer {
    pub fn seeded(text: String) -> Self {
        let chars = text.chars().count();
        Self { text, chars }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Size of the buffer if `line` were appended.
    pub fn len_with(&self, line: &str) -> usize {
        let separator = usize::from(!self.text.is_empty());
        self.chars + separator + line.chars().count()
    }

    pub fn push_line(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
            self.chars += 1;
        }
        self.text.push_str(line);
        self.chars += line.chars().count();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn take(&mut self) -> String {
        self.chars = 0;
        std::mem::take(&mut self.text)
    }
}
