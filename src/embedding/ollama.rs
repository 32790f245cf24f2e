use super::{Embedding, EmbeddingError, EmbeddingProvider, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "Ollama";

/// Requests kept in flight while embedding a batch
const CONCURRENT_REQUESTS: usize = 4;

/// Output size of the common Ollama embedding models; unknown models are
/// assumed to match nomic-embed-text.
fn model_dimension(model: &str) -> usize {
    const KNOWN: &[(&str, usize)] = &[("nomic", 768), ("mxbai", 1024), ("all-minilm", 384), ("bge-m3", 1024)];
    KNOWN
        .iter()
        .find(|(prefix, _)| model.contains(prefix))
        .map_or(768, |(_, dimension)| *dimension)
}

/// Ollama has no API key, so auth failures are ordinary API errors.
fn status_error(status: u16, body: String) -> EmbeddingError {
    EmbeddingError::from_status(PROVIDER, None, status, body)
}

/// Ollama embedding provider
pub struct OllamaEmbedding {
    client: Client,
    host: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    pub fn new(host: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension: model_dimension(model),
        }
    }

    async fn embed_single(&self, text: &str) -> Result<Embedding> {
        let url = format!("{}/api/embeddings", self.host);

        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| EmbeddingError::Request { provider: PROVIDER, source })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let embedding_response: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|source| EmbeddingError::Decode { provider: PROVIDER, source })?;

        Ok(Embedding {
            values: embedding_response.embedding,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_single(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        // Ollama has no batch endpoint; `buffered` keeps results in input order
        let requests: Vec<_> = texts.iter().map(|text| self.embed_single(text)).collect();
        stream::iter(requests)
            .buffered(CONCURRENT_REQUESTS)
            .try_collect()
            .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_is_not_an_api_key_error() {
        let err = status_error(401, "unauthorized".to_string());
        assert!(!err.is_invalid_api_key());
        assert!(matches!(err, EmbeddingError::Api { status: 401, .. }));
        assert!(!err.to_string().contains("OLLAMA_HOST"));
        assert!(matches!(status_error(429, String::new()), EmbeddingError::RateLimited("Ollama")));
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let provider = OllamaEmbedding::new("http://127.0.0.1:9", "nomic-embed-text");
        let embeddings = provider.embed_batch(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[test]
    fn test_dimension_from_model_name() {
        assert_eq!(OllamaEmbedding::new("http://h", "nomic-embed-text").dimension(), 768);
        assert_eq!(OllamaEmbedding::new("http://h", "mxbai-embed-large").dimension(), 1024);
        assert_eq!(OllamaEmbedding::new("http://h", "all-minilm").dimension(), 384);
        assert_eq!(OllamaEmbedding::new("http://h/", "custom").host, "http://h");
    }
}
