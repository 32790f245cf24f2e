pub mod ollama;
pub mod openai;

use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Embedding vector result
#[derive(Debug, Clone, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

/// Embedding failures, split by what the user can do about them
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Invalid {provider} API key. Please check your {env_var} environment variable.")]
    InvalidApiKey {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("{0} rate limit reached, try again later")]
    RateLimited(&'static str),

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to send request to {provider}: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse {provider} response: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned {got} embeddings for {expected} inputs")]
    CountMismatch {
        provider: &'static str,
        expected: usize,
        got: usize,
    },
}

impl EmbeddingError {
    /// Classify a non-success HTTP status. `key_var` names the variable holding
    /// the provider's API key; providers without one report auth failures as
    /// plain API errors.
    pub fn from_status(provider: &'static str, key_var: Option<&'static str>, status: u16, body: String) -> Self {
        match (status, key_var) {
            (401 | 403, Some(env_var)) => EmbeddingError::InvalidApiKey { provider, env_var },
            (429, _) => EmbeddingError::RateLimited(provider),
            _ => EmbeddingError::Api { provider, status, body },
        }
    }

    pub fn is_invalid_api_key(&self) -> bool {
        matches!(self, EmbeddingError::InvalidApiKey { .. })
    }
}

/// Embedding provider trait
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;
    fn dimension(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = EmbeddingError::from_status("OpenAI", Some("OPENAI_API_KEY"), 401, String::new());
        assert!(err.is_invalid_api_key());
        assert_eq!(
            err.to_string(),
            "Invalid OpenAI API key. Please check your OPENAI_API_KEY environment variable."
        );

        let err = EmbeddingError::from_status("OpenAI", Some("OPENAI_API_KEY"), 429, String::new());
        assert!(matches!(err, EmbeddingError::RateLimited("OpenAI")));

        let err = EmbeddingError::from_status("Ollama", None, 500, "boom".to_string());
        assert_eq!(err.to_string(), "Ollama API error (500): boom");
        assert!(!err.is_invalid_api_key());
    }

    #[test]
    fn test_auth_status_without_api_key() {
        for status in [401, 403] {
            let err = EmbeddingError::from_status("Ollama", None, status, "forbidden".to_string());
            assert!(!err.is_invalid_api_key());
            assert_eq!(err.to_string(), format!("Ollama API error ({}): forbidden", status));
        }
    }
}
