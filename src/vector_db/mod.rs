pub mod memory;
pub mod milvus;

use crate::retrieval::{EmbeddedChunk, RankedChunk};
use anyhow::Result;

/// Vector database trait
///
/// Chunk sets are kept per repository. Writing a repository always replaces
/// its previous chunk set as a whole.
#[async_trait::async_trait]
pub trait VectorDatabase: Send + Sync {
    /// Delete every stored chunk of `repository_id`, then store `chunks`.
    async fn replace_repository(&self, repository_id: &str, dimension: usize, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Top `limit` chunks of `repository_id` by cosine similarity to `vector`,
    /// most similar first. An empty result is not an error.
    async fn search(&self, repository_id: &str, vector: &[f32], limit: usize) -> Result<Vec<RankedChunk>>;

    async fn drop_repository(&self, repository_id: &str) -> Result<()>;
}
