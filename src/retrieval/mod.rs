//! Nearest-neighbour chunk selection for a query vector.

use crate::parser::Chunk;
use serde::{Deserialize, Serialize};

/// Number of chunks retrieved per question unless the caller asks otherwise
pub const DEFAULT_TOP_K: usize = 8;

/// A chunk together with its embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk as held by a vector store. `vector` is `None` for rows that were
/// written without an embedding; those are never ranked.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub repository_id: String,
    pub chunk: Chunk,
    pub vector: Option<Vec<f32>>,
}

/// Retrieval result with its query-time similarity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// Cosine similarity (`1 - cosine distance`). Zero-length or zero-magnitude
/// vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Top `k` chunks of one repository by similarity to `query`.
///
/// Only chunks of `repository_id` with a vector of the query's dimension are
/// considered. Results are in descending similarity; equal scores keep the
/// order in which the chunks were stored.
pub fn rank<'a>(
    query: &[f32],
    repository_id: &str,
    stored: impl IntoIterator<Item = &'a StoredChunk>,
    k: usize,
) -> Vec<RankedChunk> {
    let candidates = stored
        .into_iter()
        .filter(|s| s.repository_id == repository_id)
        .filter_map(|s| {
            let vector = s.vector.as_deref()?;
            if vector.len() != query.len() {
                tracing::debug!(
                    "Skipping {}:{} with dimension {} (query has {})",
                    s.chunk.file_path,
                    s.chunk.start_line,
                    vector.len(),
                    query.len()
                );
                return None;
            }
            Some(RankedChunk {
                chunk: s.chunk.clone(),
                similarity: cosine_similarity(query, vector),
            })
        })
        .collect();

    top_k(candidates, k)
}

/// Order scored candidates by descending similarity and keep the first `k`.
/// Non-finite scores are dropped. The sort is stable, so candidates arriving
/// in storage order keep it on ties.
pub fn top_k(mut candidates: Vec<RankedChunk>, k: usize) -> Vec<RankedChunk> {
    candidates.retain(|c| c.similarity.is_finite());
    candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    candidates.truncate(k);
    candidates
}

/// Render retrieved chunks as numbered sources for a language-model prompt.
pub fn build_context(results: &[RankedChunk]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            format!(
                "--- Source {}: {} (lines {}-{}) ---\n{}",
                index + 1,
                result.chunk.file_path,
                result.chunk.start_line,
                result.chunk.end_line,
                result.chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ChunkType;

    fn chunk(path: &str) -> Chunk {
        Chunk {
            file_path: path.to_string(),
            content: format!("// {}", path),
            start_line: 1,
            end_line: 1,
            chunk_type: ChunkType::Other,
            name: None,
            language: "rust".to_string(),
        }
    }

    fn stored(repo: &str, path: &str, vector: Option<Vec<f32>>) -> StoredChunk {
        StoredChunk {
            repository_id: repo.to_string(),
            chunk: chunk(path),
            vector,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_orders_by_similarity() {
        let rows = vec![
            stored("repo", "far.rs", Some(vec![0.0, 1.0])),
            stored("repo", "near.rs", Some(vec![1.0, 0.1])),
            stored("repo", "mid.rs", Some(vec![1.0, 1.0])),
        ];
        let results = rank(&[1.0, 0.0], "repo", &rows, 2);

        let paths: Vec<&str> = results.iter().map(|r| r.chunk.file_path.as_str()).collect();
        assert_eq!(paths, vec!["near.rs", "mid.rs"]);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[test]
    fn test_rank_filters_repository_and_missing_vectors() {
        let rows = vec![
            stored("other", "foreign.rs", Some(vec![1.0, 0.0])),
            stored("repo", "pending.rs", None),
            stored("repo", "wrong_dim.rs", Some(vec![1.0, 0.0, 0.0])),
            stored("repo", "kept.rs", Some(vec![0.5, 0.5])),
        ];
        let results = rank(&[1.0, 0.0], "repo", &rows, 8);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.file_path, "kept.rs");
    }

    #[test]
    fn test_rank_k_larger_than_available() {
        let rows: Vec<StoredChunk> = (0..5)
            .map(|i| stored("repo", &format!("{}.rs", i), Some(vec![1.0, i as f32])))
            .collect();
        let results = rank(&[1.0, 0.0], "repo", &rows, 50);

        assert_eq!(results.len(), 5);
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        assert_eq!(results[0].chunk.file_path, "0.rs");
    }

    #[test]
    fn test_rank_ties_keep_insertion_order() {
        let rows = vec![
            stored("repo", "first.rs", Some(vec![1.0, 0.0])),
            stored("repo", "unrelated.rs", Some(vec![0.0, 1.0])),
            stored("repo", "second.rs", Some(vec![1.0, 0.0])),
        ];
        let results = rank(&[1.0, 0.0], "repo", &rows, 3);
        let paths: Vec<&str> = results.iter().map(|r| r.chunk.file_path.as_str()).collect();
        assert_eq!(paths, vec!["first.rs", "second.rs", "unrelated.rs"]);
    }

    #[test]
    fn test_top_k_drops_non_finite_scores() {
        let scored = |path: &str, similarity: f32| RankedChunk { chunk: chunk(path), similarity };
        let candidates = vec![
            scored("low.rs", 0.1),
            scored("nan.rs", f32::NAN),
            scored("high.rs", 0.9),
            scored("inf.rs", f32::INFINITY),
            scored("mid.rs", 0.5),
        ];
        let results = top_k(candidates, 10);
        let paths: Vec<&str> = results.iter().map(|r| r.chunk.file_path.as_str()).collect();
        assert_eq!(paths, vec!["high.rs", "mid.rs", "low.rs"]);
    }

    #[test]
    fn test_rank_skips_nan_vectors() {
        let rows = vec![
            stored("repo", "broken.rs", Some(vec![f32::NAN, 1.0])),
            stored("repo", "ok.rs", Some(vec![1.0, 0.0])),
        ];
        let results = rank(&[1.0, 0.0], "repo", &rows, 8);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.file_path, "ok.rs");
    }

    #[test]
    fn test_rank_empty_repository() {
        let rows = vec![stored("other", "a.rs", Some(vec![1.0]))];
        assert!(rank(&[1.0], "repo", &rows, 8).is_empty());
    }

    #[test]
    fn test_build_context() {
        let results = vec![
            RankedChunk { chunk: chunk("a.rs"), similarity: 0.9 },
            RankedChunk { chunk: chunk("b.rs"), similarity: 0.5 },
        ];
        assert_eq!(
            build_context(&results),
            "--- Source 1: a.rs (lines 1-1) ---\n// a.rs\n\n--- Source 2: b.rs (lines 1-1) ---\n// b.rs"
        );
    }
}
