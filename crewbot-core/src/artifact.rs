//! Keyed store of task-produced artifacts.
//!
//! This is the cross-task handoff point: the tester writes its report here and
//! the reviewer reads one back. The `ArtifactStore` trait keeps the
//! `upsert`/`query` contract so a real similarity index can replace the
//! in-memory implementation later.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Length of the placeholder embedding attached to every artifact.
pub const EMBEDDING_DIM: usize = 8;

/// Zero vector of [`EMBEDDING_DIM`] length.
pub fn placeholder_embedding() -> Vec<f32> {
    vec![0.0; EMBEDDING_DIM]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub key: String,
    pub payload: serde_json::Value,
    /// Unused for correctness.
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `payload` under `key`, replacing any previous value. Never fails.
    async fn upsert(&self, key: &str, payload: serde_json::Value, embedding: Vec<f32>);

    /// Return at most `top_k` artifacts currently present.
    ///
    /// Callers must not depend on the selection or ordering policy.
    async fn query(&self, query_vector: &[f32], top_k: usize) -> Vec<Artifact>;

    /// Look up a single artifact by key.
    async fn get(&self, key: &str) -> Option<Artifact>;

    async fn len(&self) -> usize;
}

/// In-memory artifact store.
///
/// Entries keep the position of their first insertion; `query` ignores the
/// query vector and returns the first `top_k` entries in that order.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    entries: RwLock<Vec<Artifact>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn upsert(&self, key: &str, payload: serde_json::Value, embedding: Vec<f32>) {
        let mut entries = self.entries.write().await;
        let artifact = Artifact {
            key: key.to_string(),
            payload,
            embedding,
        };
        match entries.iter_mut().find(|existing| existing.key == key) {
            Some(existing) => *existing = artifact,
            None => entries.push(artifact),
        }
    }

    async fn query(&self, _query_vector: &[f32], top_k: usize) -> Vec<Artifact> {
        let entries = self.entries.read().await;
        entries.iter().take(top_k).cloned().collect()
    }

    async fn get(&self, key: &str) -> Option<Artifact> {
        let entries = self.entries.read().await;
        entries.iter().find(|artifact| artifact.key == key).cloned()
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
