// Vector store consistency validation
// Checks that index, metadata, manifest and chunk files agree


use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::Result;
use crate::corpus::ChunkStore;
use crate::database::VectorStore;

/// Results of a consistency check over one vector store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Vectors stored in the index
    pub vector_count: usize,
    /// Records in the metadata store
    pub metadata_count: usize,
    /// Vector count recorded in the manifest at build time
    pub manifest_vector_count: usize,
    /// Metadata count recorded in the manifest at build time
    pub manifest_metadata_count: usize,
    /// Metadata chunk ids with no readable chunk file
    pub missing_chunks: Vec<String>,
    /// Chunk ids that appear more than once in the metadata
    pub duplicate_chunk_ids: Vec<String>,
    /// Whether the index dimension matches the manifest
    pub dimension_matches: bool,
    /// Overall consistency status
    pub is_consistent: bool,
}

/// Validates a vector store against the chunk directory it was built from
pub struct ConsistencyValidator<'a> {
    store: &'a VectorStore,
    chunks: &'a ChunkStore,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(store: &'a VectorStore, chunks: &'a ChunkStore) -> Self {
        Self { store, chunks }
    }

    /// Run every check
    #[inline]
    pub async fn validate(&self) -> Result<ConsistencyReport> {
        info!("Starting vector store consistency validation");

        let vector_count = self.store.index().count_rows().await?;
        let metadata = self.store.metadata();
        let manifest = self.store.manifest();
        debug!(
            "Index holds {} vectors, metadata holds {} records",
            vector_count,
            metadata.len()
        );

        let mut seen = HashSet::new();
        let mut duplicate_chunk_ids = Vec::new();
        let mut missing_chunks = Vec::new();
        for record in metadata {
            if !seen.insert(record.chunk_id.as_str()) {
                duplicate_chunk_ids.push(record.chunk_id.clone());
                continue;
            }
            let exists = self
                .chunks
                .chunk_path(&record.chunk_id)
                .is_some_and(|path| path.is_file());
            if !exists {
                missing_chunks.push(record.chunk_id.clone());
            }
        }

        let dimension_matches = self.store.index().dimension() == manifest.dimension;

        let is_consistent = vector_count == metadata.len()
            && manifest.vector_count == vector_count
            && manifest.metadata_count == metadata.len()
            && missing_chunks.is_empty()
            && duplicate_chunk_ids.is_empty()
            && dimension_matches;

        let report = ConsistencyReport {
            vector_count,
            metadata_count: metadata.len(),
            manifest_vector_count: manifest.vector_count,
            manifest_metadata_count: manifest.metadata_count,
            missing_chunks,
            duplicate_chunk_ids,
            dimension_matches,
            is_consistent,
        };

        if report.is_consistent {
            info!("Vector store consistency validation passed");
        } else {
            warn!("Vector store consistency validation found issues");
            log_consistency_issues(&report);
        }

        Ok(report)
    }
}

fn log_consistency_issues(report: &ConsistencyReport) {
    if report.vector_count != report.metadata_count {
        warn!(
            "Index holds {} vectors but metadata holds {} records",
            report.vector_count, report.metadata_count
        );
    }

    if report.manifest_vector_count != report.vector_count
        || report.manifest_metadata_count != report.metadata_count
    {
        warn!(
            "Manifest recorded {} vectors and {} records at build time",
            report.manifest_vector_count, report.manifest_metadata_count
        );
    }

    if !report.missing_chunks.is_empty() {
        warn!(
            "Found {} metadata records without a chunk file",
            report.missing_chunks.len()
        );
    }

    if !report.duplicate_chunk_ids.is_empty() {
        warn!(
            "Found {} duplicate chunk ids in metadata",
            report.duplicate_chunk_ids.len()
        );
    }

    if !report.dimension_matches {
        warn!("Index dimension disagrees with the build manifest");
    }
}

impl ConsistencyReport {
    /// Get a human-readable summary of the consistency report
    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            format!(
                "Vector store is consistent: {} vectors, {} metadata records",
                self.vector_count, self.metadata_count
            )
        } else {
            format!(
                "Vector store inconsistencies found: {} vectors vs {} metadata records (manifest {}/{}), {} missing chunks, {} duplicate ids{}",
                self.vector_count,
                self.metadata_count,
                self.manifest_vector_count,
                self.manifest_metadata_count,
                self.missing_chunks.len(),
                self.duplicate_chunk_ids.len(),
                if self.dimension_matches {
                    ""
                } else {
                    ", dimension mismatch"
                }
            )
        }
    }

    /// Get the total number of consistency issues
    #[inline]
    pub fn total_issues(&self) -> usize {
        let count_mismatches = [
            self.vector_count != self.metadata_count,
            self.manifest_vector_count != self.vector_count,
            self.manifest_metadata_count != self.metadata_count,
            !self.dimension_matches,
        ]
        .into_iter()
        .filter(|mismatch| *mismatch)
        .count();

        count_mismatches + self.missing_chunks.len() + self.duplicate_chunk_ids.len()
    }
}
