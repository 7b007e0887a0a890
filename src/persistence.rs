//! Snapshot-file persistence backend: one directory per container tag,
//! `search.json` (chunks) and an optional `graph.json` (entities/edges),
//! written atomically via a temp-file-then-rename.

use crate::error::{MemsieveError, Result};
use crate::types::{Chunk, EntityNode, RelationshipEdge};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize, Default)]
struct SearchPayload {
    chunks: Vec<Chunk>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct GraphPayload {
    nodes: Vec<EntityNode>,
    edges: Vec<RelationshipEdge>,
}

/// The contract both the snapshot-file backend and any future
/// relational/vector-store backend must satisfy.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load_chunks(&self, container_tag: &str) -> Result<Vec<Chunk>>;
    async fn save_chunks(&self, container_tag: &str, chunks: &[Chunk]) -> Result<()>;
    async fn load_graph(&self, container_tag: &str) -> Result<(Vec<EntityNode>, Vec<RelationshipEdge>)>;
    async fn save_graph(
        &self,
        container_tag: &str,
        nodes: &[EntityNode],
        edges: &[RelationshipEdge],
    ) -> Result<()>;
    async fn clear(&self, container_tag: &str) -> Result<()>;
}

/// File-backed implementation under `<root>/<containerTag>/{search,graph}.json`.
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn container_dir(&self, container_tag: &str) -> PathBuf {
        self.root.join(container_tag)
    }

    fn search_path(&self, container_tag: &str) -> PathBuf {
        self.container_dir(container_tag).join("search.json")
    }

    fn graph_path(&self, container_tag: &str) -> PathBuf {
        self.container_dir(container_tag).join("graph.json")
    }
}

/// Serialize `value` and write it to `path` via a sibling temp file then
/// an atomic rename, so a crash mid-write never leaves a truncated file.
async fn atomic_write_json<T: Serialize + Sync>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| MemsieveError::Parse(format!("creating {}: {e}", dir.display())))?;
    }
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| MemsieveError::Parse(format!("serializing {}: {e}", path.display())))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &body)
        .await
        .map_err(|e| MemsieveError::Parse(format!("writing {}: {e}", tmp_path.display())))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| MemsieveError::Parse(format!("renaming into {}: {e}", path.display())))?;
    Ok(())
}

async fn read_json_if_present<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| MemsieveError::Parse(format!("parsing {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(MemsieveError::Parse(format!("reading {}: {e}", path.display()))),
    }
}

#[async_trait::async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load_chunks(&self, container_tag: &str) -> Result<Vec<Chunk>> {
        let path = self.search_path(container_tag);
        debug!(container = container_tag, path = %path.display(), "loading snapshot");
        let payload: SearchPayload = read_json_if_present(&path).await?;
        Ok(payload.chunks)
    }

    async fn save_chunks(&self, container_tag: &str, chunks: &[Chunk]) -> Result<()> {
        let path = self.search_path(container_tag);
        let payload = SearchPayload {
            chunks: chunks.to_vec(),
        };
        atomic_write_json(&path, &payload).await
    }

    async fn load_graph(&self, container_tag: &str) -> Result<(Vec<EntityNode>, Vec<RelationshipEdge>)> {
        let path = self.graph_path(container_tag);
        let payload: GraphPayload = read_json_if_present(&path).await?;
        Ok((payload.nodes, payload.edges))
    }

    async fn save_graph(
        &self,
        container_tag: &str,
        nodes: &[EntityNode],
        edges: &[RelationshipEdge],
    ) -> Result<()> {
        let path = self.graph_path(container_tag);
        let payload = GraphPayload {
            nodes: nodes.to_vec(),
            edges: edges.to_vec(),
        };
        atomic_write_json(&path, &payload).await
    }

    async fn clear(&self, container_tag: &str) -> Result<()> {
        let dir = self.container_dir(container_tag);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(container = container_tag, "failed to clear snapshot dir: {e}");
                Err(MemsieveError::Parse(format!(
                    "clearing {}: {e}",
                    dir.display()
                )))
            }
        }
    }
}
