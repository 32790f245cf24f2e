use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::mcp::types::Content;
use crate::parser::code_parser::CodeParser;
use crate::parser::{Chunk, SourceFile};
use crate::retrieval::{build_context, EmbeddedChunk, RankedChunk};
use crate::snapshot::{now_secs, RepositoryEntry, SnapshotManager};
use crate::source::collect_source_files;
use crate::vector_db::VectorDatabase;
use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

/// Upper bound on `limit` for search_code
const MAX_SEARCH_LIMIT: usize = 50;

/// Outcome of one indexing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub repository_id: String,
    pub files_indexed: usize,
    pub chunks_created: usize,
    pub generation: String,
}

/// Tool handlers for MCP server
pub struct ToolHandlers {
    embedding: Arc<dyn EmbeddingProvider>,
    vector_db: Arc<dyn VectorDatabase>,
    snapshot_manager: Arc<SnapshotManager>,
    code_parser: Arc<CodeParser>,
    search_top_k: usize,
    max_file_size: u64,
}

impl ToolHandlers {
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        vector_db: Arc<dyn VectorDatabase>,
        snapshot_manager: Arc<SnapshotManager>,
        search_top_k: usize,
        max_file_size: u64,
    ) -> Self {
        Self {
            embedding,
            vector_db,
            snapshot_manager,
            code_parser: Arc::new(CodeParser::new()),
            search_top_k,
            max_file_size,
        }
    }

    /// Handle index_codebase tool
    pub async fn handle_index_codebase(&self, args: &Value) -> Result<Vec<Content>> {
        let path = required_str(args, "path")?;
        let force = args.get("force").and_then(|v| v.as_bool()).unwrap_or(false);

        let root = resolve_path(path).await;
        if !root.exists() {
            anyhow::bail!("Path does not exist: {}", root.display());
        }
        if !root.is_dir() {
            anyhow::bail!("Path is not a directory: {}", root.display());
        }

        let repository_id = repository_id(&root);

        if let Some(existing) = self.snapshot_manager.get(&repository_id).await {
            if !force {
                return Ok(text(format!(
                    "Codebase already indexed ({} files, {} chunks). Use force=true to re-index.\nRepository: {}",
                    existing.files_indexed, existing.chunk_count, repository_id
                )));
            }
        }

        tracing::info!("Indexing codebase at: {}", root.display());
        let files = collect_source_files(&root, self.max_file_size).await?;
        let summary = self.index_files(&repository_id, &root, files).await?;

        Ok(text(format!(
            "Indexed {} files, {} chunks\nRepository: {}",
            summary.files_indexed, summary.chunks_created, summary.repository_id
        )))
    }

    /// Chunk, embed and store a repository's file set, replacing whatever
    /// was stored for it before. Nothing is written unless every chunk
    /// received a vector.
    pub async fn index_files(&self, repository_id: &str, root: &Path, files: Vec<SourceFile>) -> Result<IndexSummary> {
        if files.is_empty() {
            anyhow::bail!("No code files found in {}", root.display());
        }

        let files_indexed = files.len();
        let content_fingerprint = fingerprint(&files);

        let parser = self.code_parser.clone();
        let chunks = tokio::task::spawn_blocking(move || parser.ingest(&files))
            .await
            .context("Chunking task failed")?;

        if chunks.is_empty() {
            anyhow::bail!("No content to index in {}", root.display());
        }
        tracing::debug!("{} files produced {} chunks", files_indexed, chunks.len());

        let embedded = self.embed_chunks(chunks).await?;
        let dimension = embedded.first().map(|c| c.vector.len()).unwrap_or_default();

        if let Err(e) = self.vector_db.replace_repository(repository_id, dimension, &embedded).await {
            // The store may now hold part of the new set; stop reporting the old one as indexed
            if self.snapshot_manager.remove(repository_id).await.is_some() {
                if let Err(save_err) = self.snapshot_manager.save().await {
                    tracing::error!("Failed to save snapshot after dropping {}: {:#}", repository_id, save_err);
                }
            }
            return Err(e.context("Failed to store chunks"));
        }

        let generation = Uuid::new_v4().to_string();
        self.snapshot_manager
            .record(
                repository_id.to_string(),
                RepositoryEntry {
                    root: root.to_path_buf(),
                    files_indexed,
                    chunk_count: embedded.len(),
                    content_fingerprint,
                    generation: generation.clone(),
                    indexed_at: now_secs(),
                },
            )
            .await;
        self.snapshot_manager.save().await?;

        tracing::info!(
            "Indexed {} ({} files, {} chunks, generation {})",
            repository_id,
            files_indexed,
            embedded.len(),
            generation
        );

        Ok(IndexSummary {
            repository_id: repository_id.to_string(),
            files_indexed,
            chunks_created: embedded.len(),
            generation,
        })
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let texts: Vec<String> = chunks.iter().map(Chunk::embedding_text).collect();
        let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();

        let embeddings = self
            .embedding
            .embed_batch(&text_refs)
            .await
            .map_err(embedding_failure)?;

        if embeddings.len() != chunks.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        let dimension = embeddings.first().map(|e| e.values.len()).unwrap_or_default();
        if dimension == 0 || embeddings.iter().any(|e| e.values.len() != dimension) {
            anyhow::bail!("Embedding provider returned vectors of inconsistent dimension");
        }
        if dimension != self.embedding.dimension() {
            tracing::warn!(
                "Embedding model returned {}-dimensional vectors, expected {}",
                dimension,
                self.embedding.dimension()
            );
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk {
                chunk,
                vector: embedding.values,
            })
            .collect())
    }

    /// Handle search_code tool
    pub async fn handle_search_code(&self, args: &Value) -> Result<Vec<Content>> {
        let path = required_str(args, "path")?;
        let query = required_str(args, "query")?;
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|l| l as usize)
            .unwrap_or(self.search_top_k)
            .clamp(1, MAX_SEARCH_LIMIT);

        let repository_id = repository_id(&resolve_path(path).await);
        if self.snapshot_manager.get(&repository_id).await.is_none() {
            anyhow::bail!("Codebase is not indexed. Please index it first.");
        }

        let results = self.search(&repository_id, query, limit).await?;
        if results.is_empty() {
            return Ok(text(
                "I couldn't find any relevant code in this repository to answer your question.".to_string(),
            ));
        }

        Ok(text(format_results(&results)))
    }

    /// Embed `query` and return the closest chunks of a repository.
    pub async fn search(&self, repository_id: &str, query: &str, limit: usize) -> Result<Vec<RankedChunk>> {
        let embedding = self.embedding.embed(query).await.map_err(embedding_failure)?;
        self.vector_db.search(repository_id, &embedding.values, limit).await
    }

    /// Handle clear_index tool
    pub async fn handle_clear_index(&self, args: &Value) -> Result<Vec<Content>> {
        let path = required_str(args, "path")?;
        let repository_id = repository_id(&resolve_path(path).await);

        self.snapshot_manager
            .get(&repository_id)
            .await
            .context("No indexed codebase found.")?;

        self.vector_db.drop_repository(&repository_id).await?;
        self.snapshot_manager.remove(&repository_id).await;
        self.snapshot_manager.save().await?;

        Ok(text(format!("Cleared index: {}", repository_id)))
    }

    /// Handle get_indexing_status tool
    pub async fn handle_get_indexing_status(&self, args: &Value) -> Result<Vec<Content>> {
        let path = required_str(args, "path")?;
        let repository_id = repository_id(&resolve_path(path).await);

        match self.snapshot_manager.get(&repository_id).await {
            Some(entry) => Ok(text(format!(
                "Status: Indexed\nRepository: {}\nFiles: {}\nChunks: {}\nLast indexed: {} (unix time)",
                repository_id, entry.files_indexed, entry.chunk_count, entry.indexed_at
            ))),
            None => Ok(text("Status: Not indexed".to_string())),
        }
    }
}

fn text(text: String) -> Vec<Content> {
    vec![Content::Text { text }]
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .with_context(|| format!("Missing '{}' argument", key))
}

/// Absolute form of a user-supplied path; unresolvable paths are kept as given.
async fn resolve_path(path: &str) -> PathBuf {
    fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| PathBuf::from(path))
}

/// Stable id of a repository checkout, derived from its absolute path
pub fn repository_id(root: &Path) -> String {
    let path_hash = CodeParser::hash_file(&root.to_string_lossy());
    format!("code_index_{}", &path_hash[..16])
}

/// Hash over every path and content of a file set.
fn fingerprint(files: &[SourceFile]) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(file.content.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Keep the invalid-key message as is so the user sees what to fix.
fn embedding_failure(e: EmbeddingError) -> anyhow::Error {
    if e.is_invalid_api_key() {
        anyhow::Error::new(e)
    } else {
        anyhow::Error::new(e).context("Failed to generate embeddings")
    }
}

fn format_results(results: &[RankedChunk]) -> String {
    let mut formatted = String::from("Search results:\n\n");
    for (i, result) in results.iter().enumerate() {
        let chunk = &result.chunk;
        let label = match &chunk.name {
            Some(name) => format!("{} {}", chunk.chunk_type.as_str(), name),
            None => chunk.chunk_type.as_str().to_string(),
        };
        formatted.push_str(&format!(
            "{}. `{}:{}-{}` ({}, {}) score {:.2}%\n",
            i + 1,
            chunk.file_path,
            chunk.start_line,
            chunk.end_line,
            label,
            chunk.language,
            result.similarity * 100.0
        ));
    }
    formatted.push('\n');
    formatted.push_str(&build_context(results));
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{Embedding, Result as EmbeddingResult};
    use crate::vector_db::memory::InMemoryVectorDatabase;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Deterministic bag-of-bytes embedding
    struct FakeEmbedding {
        fail: AtomicBool,
    }

    impl FakeEmbedding {
        fn new() -> Self {
            Self {
                fail: AtomicBool::new(false),
            }
        }

        fn vector(text: &str) -> Vec<f32> {
            let mut values = vec![0.0; 16];
            for byte in text.bytes() {
                values[(byte % 16) as usize] += 1.0;
            }
            values
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for FakeEmbedding {
        async fn embed(&self, text: &str) -> EmbeddingResult<Embedding> {
            Ok(Embedding {
                values: Self::vector(text),
            })
        }

        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Embedding>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(EmbeddingError::InvalidApiKey {
                    provider: "OpenAI",
                    env_var: "OPENAI_API_KEY",
                });
            }
            Ok(texts
                .iter()
                .map(|t| Embedding {
                    values: Self::vector(t),
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            16
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        embedding: Arc<FakeEmbedding>,
        db: Arc<InMemoryVectorDatabase>,
        handlers: ToolHandlers,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let embedding = Arc::new(FakeEmbedding::new());
        let db = Arc::new(InMemoryVectorDatabase::new());
        let snapshot = Arc::new(SnapshotManager::new(dir.path().join("snapshot.json")));
        let handlers = ToolHandlers::new(embedding.clone(), db.clone(), snapshot, 8, 100 * 1024);
        Fixture {
            _dir: dir,
            embedding,
            db,
            handlers,
        }
    }

    fn content_text(content: &[Content]) -> &str {
        match &content[0] {
            Content::Text { text } => text,
        }
    }

    #[tokio::test]
    async fn test_reindex_supersedes_previous_chunks() {
        let f = fixture();
        let root = Path::new("/work/repo");

        let first = vec![
            SourceFile::new("old.py", "def old():\n    return 1\n"),
            SourceFile::new("legacy.rb", "puts 'legacy'\n"),
        ];
        let summary = f.handlers.index_files("repo", root, first).await.unwrap();
        assert_eq!(summary.chunks_created, 2);

        let second = vec![SourceFile::new("new.rs", "fn fresh() -> u32 {\n    2\n}\n")];
        let summary = f.handlers.index_files("repo", root, second).await.unwrap();
        assert_eq!(summary.files_indexed, 1);

        assert_eq!(f.db.count("repo").await, summary.chunks_created);
        let results = f.handlers.search("repo", "fresh", 10).await.unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.chunk.file_path == "new.rs"));
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_previous_index() {
        let f = fixture();
        let root = Path::new("/work/repo");

        f.handlers
            .index_files("repo", root, vec![SourceFile::new("a.go", "package a\n\nfunc A() {}\n")])
            .await
            .unwrap();
        let before = f.db.count("repo").await;
        let entry_before = f.handlers.snapshot_manager.get("repo").await;

        f.embedding.fail.store(true, Ordering::SeqCst);
        let err = f
            .handlers
            .index_files("repo", root, vec![SourceFile::new("b.go", "package b\n")])
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Invalid OpenAI API key"));
        assert_eq!(f.db.count("repo").await, before);
        assert_eq!(f.handlers.snapshot_manager.get("repo").await, entry_before);
    }

    /// Store that keeps only the first chunk of a replacement when told to fail
    struct PartialStore {
        inner: InMemoryVectorDatabase,
        fail: AtomicBool,
    }

    #[async_trait::async_trait]
    impl VectorDatabase for PartialStore {
        async fn replace_repository(&self, repository_id: &str, dimension: usize, chunks: &[EmbeddedChunk]) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                self.inner.replace_repository(repository_id, dimension, &chunks[..1]).await?;
                anyhow::bail!("insert batch rejected");
            }
            self.inner.replace_repository(repository_id, dimension, chunks).await
        }

        async fn search(&self, repository_id: &str, vector: &[f32], limit: usize) -> Result<Vec<RankedChunk>> {
            self.inner.search(repository_id, vector, limit).await
        }

        async fn drop_repository(&self, repository_id: &str) -> Result<()> {
            self.inner.drop_repository(repository_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_store_marks_repository_unindexed() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_path = dir.path().join("snapshot.json");
        let store = Arc::new(PartialStore {
            inner: InMemoryVectorDatabase::new(),
            fail: AtomicBool::new(false),
        });
        let handlers = ToolHandlers::new(
            Arc::new(FakeEmbedding::new()),
            store.clone(),
            Arc::new(SnapshotManager::new(snapshot_path.clone())),
            8,
            100 * 1024,
        );
        let root = Path::new("/work/repo");

        handlers
            .index_files("repo", root, vec![SourceFile::new("old.go", "package old\n\nfunc Old() {}\n")])
            .await
            .unwrap();
        assert!(handlers.snapshot_manager.get("repo").await.is_some());

        store.fail.store(true, Ordering::SeqCst);
        let files = (0..4)
            .map(|i| SourceFile::new(format!("new{}.rb", i), format!("puts {}\n", i)))
            .collect();
        let err = handlers.index_files("repo", root, files).await.unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to store chunks: insert batch rejected"));
        assert_eq!(store.inner.count("repo").await, 1);
        assert!(handlers.snapshot_manager.get("repo").await.is_none());

        let reloaded = SnapshotManager::new(snapshot_path);
        reloaded.load().await.unwrap();
        assert!(reloaded.get("repo").await.is_none());
    }

    #[tokio::test]
    async fn test_index_rejects_empty_sets() {
        let f = fixture();
        let root = Path::new("/work/repo");

        let err = f.handlers.index_files("repo", root, Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("No code files found"));

        let err = f
            .handlers
            .index_files("repo", root, vec![SourceFile::new("empty.ts", "  \n")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No content to index"));
        assert_eq!(f.db.count("repo").await, 0);
    }

    #[tokio::test]
    async fn test_tools_end_to_end() {
        let f = fixture();
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(
            repo.path().join("math.ts"),
            "import { log } from \"./log\";\n\nexport function add(a: number, b: number) {\n  return a + b;\n}\n",
        )
        .unwrap();
        let path = repo.path().to_string_lossy().to_string();

        let status = f.handlers.handle_get_indexing_status(&json!({ "path": path })).await.unwrap();
        assert_eq!(content_text(&status), "Status: Not indexed");

        let indexed = f.handlers.handle_index_codebase(&json!({ "path": path })).await.unwrap();
        assert!(content_text(&indexed).starts_with("Indexed 1 files, 2 chunks"));

        let again = f.handlers.handle_index_codebase(&json!({ "path": path })).await.unwrap();
        assert!(content_text(&again).contains("already indexed"));

        let found = f
            .handlers
            .handle_search_code(&json!({ "path": path, "query": "add numbers", "limit": 1 }))
            .await
            .unwrap();
        let found = content_text(&found);
        assert!(found.starts_with("Search results:"));
        assert!(found.contains("--- Source 1: math.ts"));
        assert!(!found.contains("--- Source 2"));

        let status = f.handlers.handle_get_indexing_status(&json!({ "path": path })).await.unwrap();
        assert!(content_text(&status).contains("Chunks: 2"));

        let cleared = f.handlers.handle_clear_index(&json!({ "path": path })).await.unwrap();
        assert!(content_text(&cleared).starts_with("Cleared index: code_index_"));

        let err = f
            .handlers
            .handle_search_code(&json!({ "path": path, "query": "add" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not indexed"));
    }

    #[tokio::test]
    async fn test_missing_arguments() {
        let f = fixture();
        let err = f.handlers.handle_search_code(&json!({ "path": "/tmp" })).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing 'query' argument");
    }

    #[test]
    fn test_repository_id_is_stable() {
        let a = repository_id(Path::new("/work/repo"));
        assert_eq!(a, repository_id(Path::new("/work/repo")));
        assert_ne!(a, repository_id(Path::new("/work/other")));
        assert_eq!(a.len(), "code_index_".len() + 16);
    }
}
