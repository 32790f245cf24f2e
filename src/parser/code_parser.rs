use super::assembler::assemble;
use super::error::Result;
use super::extractor::extract;
use super::fallback::fallback_chunks;
use super::grammar::GrammarRegistry;
use super::language::{self, Language};
use super::{Chunk, SourceFile};
use sha2::{Digest, Sha256};

/// Code parser using tree-sitter for AST-based code chunking
pub struct CodeParser {
    registry: GrammarRegistry,
}

impl CodeParser {
    pub fn new() -> Self {
        Self::with_registry(GrammarRegistry::with_builtin())
    }

    pub fn with_registry(registry: GrammarRegistry) -> Self {
        Self { registry }
    }

    /// Get content hash for change detection and ids
    pub fn hash_file(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Chunk every file of a repository snapshot, in input order.
    ///
    /// Files producing no chunks (empty content) contribute nothing.
    pub fn ingest(&self, files: &[SourceFile]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for file in files {
            let file_chunks = self.parse_file(file);
            tracing::debug!("{}: {} chunks", file.path, file_chunks.len());
            chunks.extend(file_chunks);
        }
        chunks
    }

    /// Chunk a single file. Never fails: any problem with syntax-aware
    /// chunking degrades the file to line-based chunking.
    pub fn parse_file(&self, file: &SourceFile) -> Vec<Chunk> {
        let language = match language::detect(&file.path) {
            Some(lang) if self.registry.is_loaded(lang) => lang,
            _ => return fallback_chunks(&file.path, &file.content),
        };

        match self.parse_with_ast(file, language) {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!("Failed to parse {}, using line chunks: {}", file.path, e);
                fallback_chunks(&file.path, &file.content)
            }
        }
    }

    fn parse_with_ast(&self, file: &SourceFile, language: Language) -> Result<Vec<Chunk>> {
        let units = extract(&self.registry, &file.content, language)?;
        Ok(assemble(units, &file.path, &file.content, language))
    }
}

impl Default for CodeParser {
    fn default() -> Self {
        Self::new()
    }
}
