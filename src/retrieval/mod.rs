// Retrieval module
// Query-time orchestration: embed, search, resolve metadata, hydrate content


use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::corpus::ChunkStore;
use crate::database::{MetadataRecord, VectorStore};
use crate::embeddings::Embedder;
use crate::{RagError, Result};

/// One hit of a query, in index rank order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub chunk_id: String,
    /// Raw index distance; lower is closer
    pub score: f32,
    /// Chunk text, or empty when the chunk file could not be read
    pub content: String,
}

impl RetrievalResult {
    fn new(record: &MetadataRecord, score: f32, content: String) -> Self {
        Self {
            title: record.title.clone(),
            url: record.url.clone(),
            tags: record.tags.clone(),
            chunk_id: record.chunk_id.clone(),
            score,
            content,
        }
    }
}

/// Answers top-k queries over a loaded vector store.
///
/// Built once at start-up and shared as `Arc<Retriever>`; all state is
/// read-only after construction.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: VectorStore,
    chunks: ChunkStore,
}

impl std::fmt::Debug for Retriever {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("model", &self.embedder.model_name())
            .field("store", &self.store)
            .field("chunks", &self.chunks)
            .finish()
    }
}

impl Retriever {
    /// Load the vector store at `vectorstore_dir` and pair it with the chunk
    /// directory. The embedder must produce vectors of the index dimension.
    #[inline]
    pub async fn open(
        embedder: Arc<dyn Embedder>,
        vectorstore_dir: &Path,
        chunks_dir: &Path,
    ) -> Result<Self> {
        let store = VectorStore::open(vectorstore_dir).await?;
        Self::from_parts(embedder, store, ChunkStore::new(chunks_dir))
    }

    #[inline]
    pub fn from_parts(embedder: Arc<dyn Embedder>, store: VectorStore, chunks: ChunkStore) -> Result<Self> {
        if embedder.dimension() != store.index().dimension() {
            return Err(RagError::Config(format!(
                "Embedder {} produces {} dimensions but the index holds {}",
                embedder.model_name(),
                embedder.dimension(),
                store.index().dimension()
            )));
        }

        if embedder.model_name() != store.manifest().model {
            warn!(
                "Index was built with model {} but queries use {}",
                store.manifest().model,
                embedder.model_name()
            );
        }

        info!(
            "Retriever ready: {} vectors, {} metadata records",
            store.index().len(),
            store.metadata().len()
        );

        Ok(Self {
            embedder,
            store,
            chunks,
        })
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Return up to `top_k` hydrated results, nearest first
    #[inline]
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".to_string()));
        }

        debug!("Retrieving top {} for query of {} chars", top_k, query.chars().count());

        let embedder = Arc::clone(&self.embedder);
        let owned_query = query.to_string();
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed_query(&owned_query))
            .await
            .map_err(|e| RagError::Embedding(format!("Query embedding task failed: {}", e)))??;

        let neighbors = self.store.index().search(&query_vector, top_k).await?;

        let metadata = self.store.metadata();
        let mut results = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let record = match metadata.get(neighbor.position) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping search hit: {}", e);
                    continue;
                }
            };
            let content = self.chunks.hydrate(&record.chunk_id).unwrap_or_default();
            results.push(RetrievalResult::new(record, neighbor.distance, content));
        }

        debug!("Query returned {} results", results.len());
        Ok(results)
    }
}
