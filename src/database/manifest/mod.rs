#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{RagError, Result};

/// Current on-disk layout version of a vector store
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Describes how a vector store was built. Written last, so its presence
/// marks a complete build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub format_version: u32,
    pub model: String,
    pub dimension: usize,
    pub vector_count: usize,
    pub metadata_count: usize,
    pub built_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

impl BuildManifest {
    #[inline]
    pub fn new(model: &str, dimension: usize, vector_count: usize, metadata_count: usize) -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            model: model.to_string(),
            dimension,
            vector_count,
            metadata_count,
            built_at: Utc::now(),
        }
    }

    #[inline]
    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load a manifest, rejecting layouts this build does not understand
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RagError::NotFound(format!("Build manifest {}: {}", path.display(), e))
        })?;

        let probe: VersionProbe = serde_json::from_str(&content).map_err(|e| {
            RagError::NotFound(format!(
                "Build manifest {} is corrupt: {}",
                path.display(),
                e
            ))
        })?;

        if probe.format_version != MANIFEST_FORMAT_VERSION {
            return Err(RagError::Config(format!(
                "Unsupported vector store format version {} (expected {}); rebuild with `embed`",
                probe.format_version, MANIFEST_FORMAT_VERSION
            )));
        }

        serde_json::from_str(&content).map_err(|e| {
            RagError::NotFound(format!(
                "Build manifest {} is corrupt: {}",
                path.display(),
                e
            ))
        })
    }
}
