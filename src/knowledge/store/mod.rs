
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::{Granularity, KnowledgeRecord, KnowledgeRow};
use crate::embeddings::{Embedder, Embedding};
use crate::{Result, SupportError};

/// Index-aligned embeddings and metadata records.
///
/// `vectors[i]` belongs to `metadata[i]`; both always have the same length.
/// The store is built once from source rows and read-only afterwards, so it
/// can be shared between concurrent searches behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Snapshot")]
pub struct VectorStore {
    vectors: Vec<Embedding>,
    metadata: Vec<KnowledgeRecord>,
}

/// On-disk document, validated before it becomes a store
#[derive(Deserialize)]
struct Snapshot {
    vectors: Vec<Embedding>,
    metadata: Vec<KnowledgeRecord>,
}

impl TryFrom<Snapshot> for VectorStore {
    type Error = String;

    fn try_from(snapshot: Snapshot) -> std::result::Result<Self, Self::Error> {
        if snapshot.vectors.len() != snapshot.metadata.len() {
            return Err(format!(
                "{} vectors but {} metadata records",
                snapshot.vectors.len(),
                snapshot.metadata.len()
            ));
        }
        Ok(Self {
            vectors: snapshot.vectors,
            metadata: snapshot.metadata,
        })
    }
}

impl VectorStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a store from already aligned parts
    #[inline]
    pub fn from_parts(vectors: Vec<Embedding>, metadata: Vec<KnowledgeRecord>) -> Result<Self> {
        Self::try_from(Snapshot { vectors, metadata }).map_err(SupportError::Snapshot)
    }

    /// Embed every row in one pass and pair the vectors with fresh records.
    ///
    /// Record ids are row positions. Rows whose embedding failed are kept
    /// with [`Embedding::Unavailable`] and are never scored.
    #[inline]
    pub fn build(rows: &[KnowledgeRow], granularity: Granularity, embedder: &dyn Embedder) -> Self {
        let texts: Vec<String> = rows
            .iter()
            .map(|row| row.embedding_text(granularity))
            .collect();

        info!(
            "Embedding {} knowledge base rows at {:?} granularity",
            texts.len(),
            granularity
        );
        let mut vectors = embedder.embed(&texts);

        if vectors.len() != rows.len() {
            error!(
                "Embedder returned {} vectors for {} texts; realigning",
                vectors.len(),
                rows.len()
            );
            vectors.resize(rows.len(), Embedding::Unavailable);
        }

        let metadata = rows
            .iter()
            .enumerate()
            .map(|(id, row)| KnowledgeRecord::from_row(id, row, granularity))
            .collect();

        let store = Self { vectors, metadata };

        let missing = store.len() - store.available_count();
        if missing > 0 {
            warn!("{} of {} rows have no embedding", missing, store.len());
        }
        info!("Vector store built with {} records", store.len());

        store
    }

    /// Write the store as a pretty-printed JSON document
    #[inline]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SupportError::Snapshot(format!("Failed to serialize store: {}", e)))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;

        info!("Vector store saved to {}", path.display());
        Ok(())
    }

    /// Read a store written by [`VectorStore::save`].
    ///
    /// A missing file is reported as [`SupportError::SnapshotNotFound`].
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SupportError::SnapshotNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let store: Self = serde_json::from_str(&content).map_err(|e| {
            SupportError::Snapshot(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        info!(
            "Vector store loaded from {} ({} records)",
            path.display(),
            store.len()
        );
        Ok(store)
    }

    /// Startup policy: load the snapshot, or build from source and persist it
    /// when no snapshot exists yet. Any other load failure is returned.
    #[inline]
    pub fn load_or_build<P, F>(
        path: P,
        granularity: Granularity,
        embedder: &dyn Embedder,
        rows: F,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        F: FnOnce() -> Result<Vec<KnowledgeRow>>,
    {
        let path = path.as_ref();

        match Self::load(path) {
            Ok(store) => Ok(store),
            Err(SupportError::SnapshotNotFound(_)) => {
                info!(
                    "No snapshot at {}, building from source",
                    path.display()
                );
                Self::rebuild(path, granularity, embedder, rows()?)
            }
            Err(e) => Err(e),
        }
    }

    /// Build from `rows` and overwrite the snapshot at `path`
    #[inline]
    pub fn rebuild<P: AsRef<Path>>(
        path: P,
        granularity: Granularity,
        embedder: &dyn Embedder,
        rows: Vec<KnowledgeRow>,
    ) -> Result<Self> {
        let store = Self::build(&rows, granularity, embedder);
        store.save(path)?;
        Ok(store)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    #[inline]
    pub fn vectors(&self) -> &[Embedding] {
        &self.vectors
    }

    #[inline]
    pub fn metadata(&self) -> &[KnowledgeRecord] {
        &self.metadata
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<(&Embedding, &KnowledgeRecord)> {
        Some((self.vectors.get(index)?, self.metadata.get(index)?))
    }

    /// Entries in insertion order with their index
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Embedding, &KnowledgeRecord)> {
        self.vectors
            .iter()
            .zip(self.metadata.iter())
            .enumerate()
            .map(|(i, (vector, record))| (i, vector, record))
    }

    /// Number of entries that carry an embedding
    #[inline]
    pub fn available_count(&self) -> usize {
        self.vectors.iter().filter(|v| v.is_available()).count()
    }

    /// Dimension of the first available embedding
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        let dimension = self.vectors.iter().find_map(Embedding::dimension);
        debug!("Vector store dimension: {:?}", dimension);
        dimension
    }
}
