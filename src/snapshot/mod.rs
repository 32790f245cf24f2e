use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

/// Indexed repositories keyed by repository id
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub repositories: HashMap<String, RepositoryEntry>,
}

/// Record of the chunk set currently stored for one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub root: PathBuf,
    pub files_indexed: usize,
    pub chunk_count: usize,
    /// Hash over all indexed paths and contents
    pub content_fingerprint: String,
    /// Id of the indexing run that produced the stored chunk set
    pub generation: String,
    pub indexed_at: u64,
}

/// Manages the persisted index bookkeeping
pub struct SnapshotManager {
    snapshot_path: PathBuf,
    snapshot: RwLock<Snapshot>,
}

impl SnapshotManager {
    pub fn new(snapshot_path: PathBuf) -> Self {
        Self {
            snapshot_path,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    pub async fn load(&self) -> Result<()> {
        if self.snapshot_path.exists() {
            let data = fs::read_to_string(&self.snapshot_path)
                .await
                .with_context(|| format!("Failed to read {}", self.snapshot_path.display()))?;
            let snapshot = serde_json::from_str(&data).context("Corrupt snapshot file")?;
            *self.snapshot.write().await = snapshot;
        }
        Ok(())
    }

    pub async fn save(&self) -> Result<()> {
        let data = {
            let snapshot = self.snapshot.read().await;
            serde_json::to_string_pretty(&*snapshot)?
        };

        if let Some(parent) = self.snapshot_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&self.snapshot_path, data)
            .await
            .with_context(|| format!("Failed to write {}", self.snapshot_path.display()))?;
        Ok(())
    }

    pub async fn get(&self, repository_id: &str) -> Option<RepositoryEntry> {
        self.snapshot.read().await.repositories.get(repository_id).cloned()
    }

    /// Record a completed indexing run, replacing any earlier entry.
    pub async fn record(&self, repository_id: String, entry: RepositoryEntry) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.repositories.insert(repository_id, entry);
    }

    pub async fn remove(&self, repository_id: &str) -> Option<RepositoryEntry> {
        self.snapshot.write().await.repositories.remove(repository_id)
    }
}

/// Seconds since the Unix epoch
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Default bookkeeping location under the user's home directory.
pub fn default_snapshot_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    Path::new(&home).join(".code-ask").join("snapshot.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(chunks: usize) -> RepositoryEntry {
        RepositoryEntry {
            root: PathBuf::from("/work/repo"),
            files_indexed: 2,
            chunk_count: chunks,
            content_fingerprint: "abc".to_string(),
            generation: "gen-1".to_string(),
            indexed_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/snapshot.json");

        let manager = SnapshotManager::new(path.clone());
        manager.record("code_index_1".to_string(), entry(5)).await;
        manager.save().await.unwrap();

        let reloaded = SnapshotManager::new(path);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.get("code_index_1").await, Some(entry(5)));
        assert_eq!(reloaded.get("code_index_2").await, None);
    }

    #[tokio::test]
    async fn test_record_replaces_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SnapshotManager::new(dir.path().join("s.json"));

        manager.record("repo".to_string(), entry(5)).await;
        manager.record("repo".to_string(), entry(9)).await;
        assert_eq!(manager.get("repo").await.map(|e| e.chunk_count), Some(9));

        assert!(manager.remove("repo").await.is_some());
        assert!(manager.get("repo").await.is_none());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SnapshotManager::new(dir.path().join("absent.json"));
        manager.load().await.unwrap();
        assert!(manager.get("anything").await.is_none());
    }
}
