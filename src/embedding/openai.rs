use super::{Embedding, EmbeddingError, EmbeddingProvider, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "OpenAI";
const API_KEY_VAR: &str = "OPENAI_API_KEY";
const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Inputs per request; the API accepts more but large batches time out
pub const BATCH_SIZE: usize = 100;

/// OpenAI embedding provider
pub struct OpenAIEmbedding {
    client: Client,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbedding {
    pub fn new(api_key: &str, model: &str) -> Self {
        let dimension = match model {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536,
        };

        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
        }
    }

    async fn embed_request(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let request = OpenAIEmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| EmbeddingError::Request { provider: PROVIDER, source })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI embeddings request failed ({}): {}", status, body);
            return Err(EmbeddingError::from_status(PROVIDER, Some(API_KEY_VAR), status, body));
        }

        let embedding_response: OpenAIEmbeddingResponse = response
            .json()
            .await
            .map_err(|source| EmbeddingError::Decode { provider: PROVIDER, source })?;

        if embedding_response.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                provider: PROVIDER,
                expected: texts.len(),
                got: embedding_response.data.len(),
            });
        }

        // Sort by index to maintain order
        let mut sorted_data = embedding_response.data;
        sorted_data.sort_by_key(|d| d.index);

        Ok(sorted_data
            .into_iter()
            .map(|d| Embedding { values: d.embedding })
            .collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAIEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.embed_request(&[text]).await?;
        embeddings.pop().ok_or(EmbeddingError::CountMismatch {
            provider: PROVIDER,
            expected: 1,
            got: 0,
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            embeddings.extend(self.embed_request(batch).await?);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
