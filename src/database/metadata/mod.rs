#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::corpus::Chunk;
use crate::{RagError, Result};

/// Descriptive fields of one indexed chunk. The chunk text itself stays in
/// the chunk store and is resolved through `chunk_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub chunk_id: String,
}

impl From<&Chunk> for MetadataRecord {
    #[inline]
    fn from(chunk: &Chunk) -> Self {
        Self {
            title: chunk.title.clone(),
            url: chunk.url.clone(),
            tags: chunk.tags.clone(),
            chunk_id: chunk.chunk_id.clone(),
        }
    }
}

/// Ordered list of metadata records. Record `i` describes index position `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    records: Vec<MetadataRecord>,
}

impl MetadataStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn from_records(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    /// Append a record at the next position and return that position
    #[inline]
    pub fn push(&mut self, record: MetadataRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    #[inline]
    pub fn extend<I: IntoIterator<Item = MetadataRecord>>(&mut self, records: I) {
        self.records.extend(records);
    }

    /// Record describing index position `position`
    #[inline]
    pub fn get(&self, position: usize) -> Result<&MetadataRecord> {
        self.records.get(position).ok_or(RagError::OutOfRange {
            position,
            len: self.records.len(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, MetadataRecord> {
        self.records.iter()
    }

    #[cfg(test)]
    pub(crate) fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    /// Write the store as a JSON array. The file is replaced atomically so a
    /// reader never sees a partial list.
    #[inline]
    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;
        debug!("Persisted {} metadata records to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a store written by [`MetadataStore::persist`]
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RagError::NotFound(format!("Metadata file {}: {}", path.display(), e))
        })?;
        let records: Vec<MetadataRecord> = serde_json::from_str(&content).map_err(|e| {
            RagError::NotFound(format!(
                "Metadata file {} is corrupt: {}",
                path.display(),
                e
            ))
        })?;
        debug!("Loaded {} metadata records from {}", records.len(), path.display());
        Ok(Self { records })
    }
}

impl<'a> IntoIterator for &'a MetadataStore {
    type Item = &'a MetadataRecord;
    type IntoIter = std::slice::Iter<'a, MetadataRecord>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
