// Database module
// Persisted vector store: LanceDB vectors, JSON metadata and a build manifest


pub mod manifest;
pub mod metadata;
pub mod vector_index;

pub use manifest::{BuildManifest, MANIFEST_FORMAT_VERSION};
pub use metadata::{MetadataRecord, MetadataStore};
pub use vector_index::{Neighbor, VectorIndex};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{RagError, Result};

const VECTORS_DIR: &str = "vectors";
const METADATA_FILE: &str = "metadata.json";
const MANIFEST_FILE: &str = "manifest.json";

/// File layout of a vector store directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorStorePaths {
    root: PathBuf,
}

impl VectorStorePaths {
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn vectors(&self) -> PathBuf {
        self.root.join(VECTORS_DIR)
    }

    #[inline]
    pub fn metadata(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    #[inline]
    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }
}

/// A vector and the metadata describing it. Builders only accept the two
/// together so that both stores always grow in lockstep.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub metadata: MetadataRecord,
}

/// Builds a vector store from scratch.
///
/// The old manifest is removed first and the new one is written by
/// [`VectorStoreWriter::finish`], so an interrupted build is never mistaken
/// for a complete one.
#[derive(Debug)]
pub struct VectorStoreWriter {
    paths: VectorStorePaths,
    model: String,
    index: VectorIndex,
    metadata: MetadataStore,
}

impl VectorStoreWriter {
    #[inline]
    pub async fn create(root: &Path, model: &str, dimension: usize) -> Result<Self> {
        let paths = VectorStorePaths::new(root);
        fs::create_dir_all(paths.root())?;

        for stale in [paths.manifest(), paths.metadata()] {
            if stale.exists() {
                fs::remove_file(&stale)?;
            }
        }

        let index = VectorIndex::create(&paths.vectors(), dimension).await?;

        Ok(Self {
            paths,
            model: model.to_string(),
            index,
            metadata: MetadataStore::new(),
        })
    }

    /// Append entries at the next positions. Dimensions are checked before
    /// anything is written.
    #[inline]
    pub async fn append(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        let (vectors, records): (Vec<Vec<f32>>, Vec<MetadataRecord>) = entries
            .into_iter()
            .map(|entry| (entry.vector, entry.metadata))
            .unzip();

        self.index.check_dimensions(&vectors)?;
        self.index.append(&vectors).await?;
        self.metadata.extend(records);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Persist metadata, then the manifest
    #[inline]
    pub async fn finish(self) -> Result<BuildManifest> {
        let vector_count = self.index.count_rows().await?;
        if vector_count != self.metadata.len() {
            return Err(RagError::Index(format!(
                "Vector index holds {} vectors but {} metadata records were written",
                vector_count,
                self.metadata.len()
            )));
        }

        self.metadata.persist(&self.paths.metadata())?;

        let manifest = BuildManifest::new(
            &self.model,
            self.index.dimension(),
            vector_count,
            self.metadata.len(),
        );
        manifest.persist(&self.paths.manifest())?;

        info!(
            "Vector store at {} holds {} vectors",
            self.paths.root().display(),
            vector_count
        );
        Ok(manifest)
    }
}

/// A complete vector store opened for reading
#[derive(Debug, Clone)]
pub struct VectorStore {
    paths: VectorStorePaths,
    index: VectorIndex,
    metadata: MetadataStore,
    manifest: BuildManifest,
}

impl VectorStore {
    /// Open the store at `root`. Missing or unreadable artifacts are
    /// `NotFound`; count disagreements are only logged, since queries guard
    /// every position individually.
    #[inline]
    pub async fn open(root: &Path) -> Result<Self> {
        let paths = VectorStorePaths::new(root);

        let manifest = BuildManifest::load(&paths.manifest())?;
        let index = VectorIndex::open(&paths.vectors()).await?;
        let metadata = MetadataStore::load(&paths.metadata())?;

        if manifest.dimension != index.dimension() {
            return Err(RagError::Config(format!(
                "Manifest records {} dimensions but the vector index holds {}",
                manifest.dimension,
                index.dimension()
            )));
        }

        if index.len() != metadata.len() {
            warn!(
                "Vector index has {} vectors but metadata has {} records; out-of-range hits will be skipped",
                index.len(),
                metadata.len()
            );
        }

        Ok(Self {
            paths,
            index,
            metadata,
            manifest,
        })
    }

    #[inline]
    pub fn paths(&self) -> &VectorStorePaths {
        &self.paths
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    #[inline]
    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }
}
