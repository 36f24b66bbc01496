// Indexer module
// Builds the vector store from the chunk directory in one offline pass


pub mod consistency;

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::corpus::{Chunk, ChunkStore};
use crate::database::{BuildManifest, IndexEntry, MetadataRecord, VectorStore, VectorStoreWriter};
use crate::embeddings::{Embedder, check_embeddings};
use crate::{RagError, Result};

pub use consistency::{ConsistencyReport, ConsistencyValidator};

const DEFAULT_BATCH_SIZE: usize = 32;

/// Statistics from an embed build
#[derive(Debug, Clone, PartialEq)]
pub struct IndexingStats {
    pub chunks_embedded: usize,
    pub batches: usize,
    pub manifest: BuildManifest,
    pub consistency: ConsistencyReport,
}

/// Embeds every chunk and writes vectors, metadata and manifest together
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    show_progress: bool,
}

impl Indexer {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: console::user_attended_stderr(),
        }
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Rebuild the vector store at `vectorstore_dir` from `chunks_dir`.
    ///
    /// Chunks are embedded in file-name order. Each batch of vectors is
    /// appended together with its metadata, so position `i` in the index
    /// always describes the `i`-th chunk.
    #[inline]
    pub async fn build(&self, chunks_dir: &Path, vectorstore_dir: &Path) -> Result<IndexingStats> {
        let chunk_store = ChunkStore::new(chunks_dir);
        let chunks = chunk_store.load_all()?;
        let dimension = self.embedder.dimension();

        info!(
            "Embedding {} chunks from {} with model {} ({} dimensions)",
            chunks.len(),
            chunks_dir.display(),
            self.embedder.model_name(),
            dimension
        );

        let mut writer =
            VectorStoreWriter::create(vectorstore_dir, self.embedder.model_name(), dimension)
                .await?;

        let bar = self.progress_bar(chunks.len());
        let mut batches = 0;
        for batch in chunks.chunks(self.batch_size) {
            let vectors = self.embed_batch(batch).await?;
            let entries = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry {
                    vector,
                    metadata: MetadataRecord::from(chunk),
                })
                .collect();
            writer.append(entries).await?;

            batches += 1;
            bar.inc(batch.len() as u64);
            debug!("Embedded batch {} ({} chunks)", batches, batch.len());
        }
        bar.finish_and_clear();

        let manifest = writer.finish().await?;

        let store = VectorStore::open(vectorstore_dir).await?;
        let consistency = ConsistencyValidator::new(&store, &chunk_store)
            .validate()
            .await?;
        if consistency.is_consistent {
            info!("{}", consistency.summary());
        } else {
            warn!("{}", consistency.summary());
        }

        Ok(IndexingStats {
            chunks_embedded: chunks.len(),
            batches,
            manifest,
            consistency,
        })
    }

    /// Embed one batch on a blocking worker thread
    async fn embed_batch(&self, batch: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
        let embedder = Arc::clone(&self.embedder);

        let vectors = tokio::task::spawn_blocking(move || embedder.embed(&texts))
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))??;

        check_embeddings(&vectors, batch.len(), self.embedder.dimension())?;
        Ok(vectors)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {wide_bar}") {
            bar.set_style(style);
        }
        bar
    }
}
