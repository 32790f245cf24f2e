//! In-process vector store. Contents live as long as the server process.

use super::VectorDatabase;
use crate::retrieval::{self, EmbeddedChunk, RankedChunk, StoredChunk};
use anyhow::Result;
use tokio::sync::RwLock;

/// Brute-force cosine search over chunks kept in insertion order
#[derive(Default)]
pub struct InMemoryVectorDatabase {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryVectorDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, repository_id: &str) -> usize {
        self.chunks
            .read()
            .await
            .iter()
            .filter(|c| c.repository_id == repository_id)
            .count()
    }
}

#[async_trait::async_trait]
impl VectorDatabase for InMemoryVectorDatabase {
    async fn replace_repository(&self, repository_id: &str, _dimension: usize, chunks: &[EmbeddedChunk]) -> Result<()> {
        // One write lock covers delete and insert, so readers never see a mix
        let mut stored = self.chunks.write().await;
        stored.retain(|c| c.repository_id != repository_id);
        stored.extend(chunks.iter().map(|c| StoredChunk {
            repository_id: repository_id.to_string(),
            chunk: c.chunk.clone(),
            vector: Some(c.vector.clone()),
        }));
        Ok(())
    }

    async fn search(&self, repository_id: &str, vector: &[f32], limit: usize) -> Result<Vec<RankedChunk>> {
        let stored = self.chunks.read().await;
        Ok(retrieval::rank(vector, repository_id, stored.iter(), limit))
    }

    async fn drop_repository(&self, repository_id: &str) -> Result<()> {
        self.chunks.write().await.retain(|c| c.repository_id != repository_id);
        Ok(())
    }
}
