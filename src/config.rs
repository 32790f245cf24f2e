use crate::embedding::ollama::OllamaEmbedding;
use crate::embedding::openai::OpenAIEmbedding;
use crate::embedding::EmbeddingProvider;
use crate::retrieval::DEFAULT_TOP_K;
use crate::snapshot::default_snapshot_path;
use crate::source::DEFAULT_MAX_FILE_SIZE;
use crate::vector_db::memory::InMemoryVectorDatabase;
use crate::vector_db::milvus::MilvusVectorDatabase;
use crate::vector_db::VectorDatabase;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingConfig {
    Ollama { host: String, model: String },
    OpenAI { api_key: String, model: String },
}

impl EmbeddingConfig {
    pub fn provider_name(&self) -> &'static str {
        match self {
            EmbeddingConfig::Ollama { .. } => "Ollama",
            EmbeddingConfig::OpenAI { .. } => "OpenAI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorDbConfig {
    Milvus { address: String },
    Memory,
}

/// Server configuration, read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub vector_db: VectorDbConfig,
    pub snapshot_path: PathBuf,
    pub search_top_k: usize,
    pub max_file_size: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = var("EMBEDDING_PROVIDER").unwrap_or_else(|| "ollama".to_string());
        let embedding = match provider.to_ascii_lowercase().as_str() {
            "ollama" => EmbeddingConfig::Ollama {
                host: var("OLLAMA_HOST").unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
                model: var("EMBEDDING_MODEL").unwrap_or_else(|| "nomic-embed-text".to_string()),
            },
            "openai" => EmbeddingConfig::OpenAI {
                api_key: var("OPENAI_API_KEY")
                    .context("OPENAI_API_KEY must be set when EMBEDDING_PROVIDER=openai")?,
                model: var("EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-3-small".to_string()),
            },
            other => anyhow::bail!("Unknown EMBEDDING_PROVIDER '{}' (expected ollama or openai)", other),
        };

        let backend = var("VECTOR_DB").unwrap_or_else(|| "milvus".to_string());
        let vector_db = match backend.to_ascii_lowercase().as_str() {
            "milvus" => VectorDbConfig::Milvus {
                address: var("MILVUS_ADDRESS").unwrap_or_else(|| "http://127.0.0.1:19530".to_string()),
            },
            "memory" => VectorDbConfig::Memory,
            other => anyhow::bail!("Unknown VECTOR_DB '{}' (expected milvus or memory)", other),
        };

        let search_top_k = match var("SEARCH_TOP_K") {
            Some(v) => v.parse().with_context(|| format!("Invalid SEARCH_TOP_K '{}'", v))?,
            None => DEFAULT_TOP_K,
        };

        let max_file_size = match var("MAX_FILE_SIZE") {
            Some(v) => v.parse().with_context(|| format!("Invalid MAX_FILE_SIZE '{}'", v))?,
            None => DEFAULT_MAX_FILE_SIZE,
        };

        Ok(Self {
            embedding,
            vector_db,
            snapshot_path: var("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_snapshot_path),
            search_top_k,
            max_file_size,
        })
    }

    pub fn embedding_provider(&self) -> Arc<dyn EmbeddingProvider> {
        match &self.embedding {
            EmbeddingConfig::Ollama { host, model } => Arc::new(OllamaEmbedding::new(host, model)),
            EmbeddingConfig::OpenAI { api_key, model } => Arc::new(OpenAIEmbedding::new(api_key, model)),
        }
    }

    pub fn vector_database(&self) -> Arc<dyn VectorDatabase> {
        match &self.vector_db {
            VectorDbConfig::Milvus { address } => Arc::new(MilvusVectorDatabase::new(address)),
            VectorDbConfig::Memory => Arc::new(InMemoryVectorDatabase::new()),
        }
    }
}
