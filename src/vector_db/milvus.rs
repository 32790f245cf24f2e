use super::VectorDatabase;
use crate::parser::Chunk;
use crate::retrieval::{self, EmbeddedChunk, RankedChunk};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Rows per insert request
const INSERT_BATCH_SIZE: usize = 500;

/// Milvus vector database client (using REST API)
///
/// Each repository maps to one collection named after its repository id.
pub struct MilvusVectorDatabase {
    client: Client,
    address: String,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest<'a> {
    #[serde(rename = "collectionName")]
    collection_name: &'a str,
    dimension: usize,
    #[serde(rename = "metricType")]
    metric_type: &'a str,
}

#[derive(Debug, Serialize)]
struct InsertRequest<'a> {
    #[serde(rename = "collectionName")]
    collection_name: &'a str,
    data: Vec<InsertData<'a>>,
}

#[derive(Debug, Serialize)]
struct InsertData<'a> {
    /// Position in the indexing run; doubles as the tie-breaker on search
    id: usize,
    vector: &'a [f32],
    metadata: &'a Chunk,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    #[serde(rename = "collectionName")]
    collection_name: &'a str,
    data: Vec<&'a [f32]>,
    limit: usize,
    #[serde(rename = "outputFields")]
    output_fields: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchResultData>,
}

#[derive(Debug, Deserialize)]
struct SearchResultData {
    #[serde(default)]
    id: u64,
    #[serde(alias = "score")]
    distance: f32,
    metadata: Chunk,
}

impl MilvusVectorDatabase {
    pub fn new(address: &str) -> Self {
        Self {
            client: Client::new(),
            address: address.trim_end_matches('/').to_string(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/v2/vectordb/collections/create", self.address)
    }

    fn insert_url(&self) -> String {
        format!("{}/v2/vectordb/entities/insert", self.address)
    }

    fn search_url(&self) -> String {
        format!("{}/v2/vectordb/entities/search", self.address)
    }

    fn drop_url(&self) -> String {
        format!("{}/v2/vectordb/collections/drop", self.address)
    }

    /// POST a request and return the response body, failing on HTTP errors
    /// and on Milvus error codes reported inside a 200 response.
    async fn post<T: Serialize + ?Sized>(&self, url: String, body: &T, action: &str) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", action))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Milvus API error ({}): {}", status, body);
        }

        let value: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", action))?;

        match value.get("code").and_then(Value::as_i64) {
            Some(0) | None => Ok(value),
            Some(code) => {
                let message = value.get("message").and_then(Value::as_str).unwrap_or("");
                anyhow::bail!("Milvus {} failed (code {}): {}", action, code, message)
            }
        }
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let request = CreateCollectionRequest {
            collection_name: name,
            dimension,
            metric_type: "COSINE",
        };
        self.post(self.collection_url(), &request, "create collection").await?;
        Ok(())
    }

    async fn insert(&self, collection: &str, chunks: &[EmbeddedChunk]) -> Result<()> {
        for (batch_index, batch) in chunks.chunks(INSERT_BATCH_SIZE).enumerate() {
            let data = batch
                .iter()
                .enumerate()
                .map(|(i, c)| InsertData {
                    id: batch_index * INSERT_BATCH_SIZE + i,
                    vector: &c.vector,
                    metadata: &c.chunk,
                })
                .collect();

            let request = InsertRequest {
                collection_name: collection,
                data,
            };
            self.post(self.insert_url(), &request, "insert").await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorDatabase for MilvusVectorDatabase {
    async fn replace_repository(&self, repository_id: &str, dimension: usize, chunks: &[EmbeddedChunk]) -> Result<()> {
        // Dropping a collection that does not exist yet is expected on first index
        if let Err(e) = self.drop_repository(repository_id).await {
            tracing::debug!("Drop before re-index of {} failed: {}", repository_id, e);
        }

        self.create_collection(repository_id, dimension).await?;
        self.insert(repository_id, chunks).await
    }

    async fn search(&self, repository_id: &str, vector: &[f32], limit: usize) -> Result<Vec<RankedChunk>> {
        let request = SearchRequest {
            collection_name: repository_id,
            data: vec![vector],
            limit,
            output_fields: ["metadata"],
        };

        let value = self.post(self.search_url(), &request, "search").await?;
        let search_response: SearchResponse =
            serde_json::from_value(value).context("Failed to parse search response")?;

        let mut hits = search_response.data;
        hits.sort_by_key(|hit| hit.id);

        let candidates = hits
            .into_iter()
            .map(|hit| RankedChunk {
                chunk: hit.metadata,
                similarity: hit.distance,
            })
            .collect();

        Ok(retrieval::top_k(candidates, limit))
    }

    async fn drop_repository(&self, repository_id: &str) -> Result<()> {
        let request = json!({
            "collectionName": repository_id
        });
        self.post(self.drop_url(), &request, "drop collection").await?;
        Ok(())
    }
}
