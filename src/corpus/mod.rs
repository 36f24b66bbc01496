// Corpus module
// Source documents, persisted chunk records and the chunk build


use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::embeddings::chunking::{ChunkingConfig, chunk_id, chunk_text};
use crate::{RagError, Result};

const JSON_EXTENSION: &str = "json";

/// A source document as supplied in the input directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: String,
}

/// One window of a document, persisted as its own file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub content: String,
    pub chunk_id: String,
}

/// Statistics from a chunk build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkingStats {
    pub documents: usize,
    pub chunks: usize,
    pub stale_files_removed: usize,
}

/// List the `*.json` files of a directory in file-name order
#[inline]
pub fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == JSON_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File name without its `.json` extension
fn document_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            RagError::Config(format!(
                "Document file name is not valid UTF-8: {}",
                path.display()
            ))
        })
}

/// Read one document file
#[inline]
pub fn read_document(path: &Path) -> Result<Document> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        RagError::Config(format!("Invalid document {}: {}", path.display(), e))
    })
}

/// Split a document into chunk records with ids derived from `stem`
#[inline]
pub fn chunk_document(document: &Document, stem: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let windows = chunk_text(&document.content, config)?;

    Ok(windows
        .into_iter()
        .enumerate()
        .map(|(ordinal, window)| Chunk {
            title: document.title.clone(),
            url: document.url.clone(),
            tags: document.tags.clone(),
            content: window.to_string(),
            chunk_id: chunk_id(stem, ordinal),
        })
        .collect())
}

/// Directory of persisted chunk records, one `<chunk_id>.json` file each
#[derive(Debug, Clone)]
pub struct ChunkStore {
    dir: PathBuf,
}

impl ChunkStore {
    #[inline]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `chunk_id`, or `None` for ids that would
    /// escape the store directory
    #[inline]
    pub fn chunk_path(&self, chunk_id: &str) -> Option<PathBuf> {
        let is_safe = !chunk_id.is_empty()
            && !chunk_id.contains(['/', '\\'])
            && chunk_id != "."
            && chunk_id != "..";
        is_safe.then(|| self.dir.join(format!("{}.{}", chunk_id, JSON_EXTENSION)))
    }

    /// Persist a chunk record
    #[inline]
    pub fn write(&self, chunk: &Chunk) -> Result<()> {
        let path = self.chunk_path(&chunk.chunk_id).ok_or_else(|| {
            RagError::Config(format!("Invalid chunk id: {:?}", chunk.chunk_id))
        })?;
        let json = serde_json::to_string_pretty(chunk)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a chunk record back
    #[inline]
    pub fn read(&self, chunk_id: &str) -> Result<Chunk> {
        let path = self
            .chunk_path(chunk_id)
            .ok_or_else(|| RagError::NotFound(format!("Invalid chunk id: {:?}", chunk_id)))?;
        let content = fs::read_to_string(&path).map_err(|e| {
            RagError::NotFound(format!("Chunk file {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Resolve a chunk id to its text. Failures are logged and reported as
    /// `None` so that one bad record never fails a whole query.
    #[inline]
    pub fn hydrate(&self, chunk_id: &str) -> Option<String> {
        match self.read(chunk_id) {
            Ok(chunk) => Some(chunk.content),
            Err(e) => {
                warn!("Failed to hydrate chunk {}: {}", chunk_id, e);
                None
            }
        }
    }

    /// Load every chunk record in file-name order
    #[inline]
    pub fn load_all(&self) -> Result<Vec<Chunk>> {
        if !self.dir.is_dir() {
            return Err(RagError::NotFound(format!(
                "Chunk directory not found: {}",
                self.dir.display()
            )));
        }

        let mut chunks = Vec::new();
        for path in list_json_files(&self.dir)? {
            let content = fs::read_to_string(&path)?;
            let chunk: Chunk = serde_json::from_str(&content).map_err(|e| {
                RagError::Config(format!("Invalid chunk file {}: {}", path.display(), e))
            })?;
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    /// Remove every `*.json` file so a build starts from an empty directory
    fn clear(&self) -> Result<usize> {
        let stale = list_json_files(&self.dir)?;
        for path in &stale {
            fs::remove_file(path)?;
        }
        Ok(stale.len())
    }
}

/// Chunk every document in `input_dir` into `output_dir`.
///
/// Documents are processed in file-name order and the output directory is
/// regenerated from scratch, so identical input and parameters always
/// produce byte-identical chunk files.
#[inline]
pub fn chunk_corpus(input_dir: &Path, output_dir: &Path, config: &ChunkingConfig) -> Result<ChunkingStats> {
    config.validate()?;

    if !input_dir.is_dir() {
        return Err(RagError::NotFound(format!(
            "Document directory not found: {}",
            input_dir.display()
        )));
    }

    fs::create_dir_all(output_dir)?;
    if fs::canonicalize(input_dir)? == fs::canonicalize(output_dir)? {
        return Err(RagError::Config(format!(
            "Chunk output directory must differ from the document directory: {}",
            output_dir.display()
        )));
    }
    let store = ChunkStore::new(output_dir);

    let documents = list_json_files(input_dir)?;
    info!(
        "Chunking {} documents from {} (window {}, overlap {})",
        documents.len(),
        input_dir.display(),
        config.window,
        config.overlap
    );

    let mut planned = Vec::new();
    let mut seen_ids = HashSet::new();
    for path in &documents {
        let stem = document_stem(path)?;
        let document = read_document(path)?;
        let chunks = chunk_document(&document, &stem, config)?;
        debug!("Document {} produced {} chunks", stem, chunks.len());

        for chunk in chunks {
            if !seen_ids.insert(chunk.chunk_id.clone()) {
                return Err(RagError::Config(format!(
                    "Duplicate chunk id {} produced by {}",
                    chunk.chunk_id,
                    path.display()
                )));
            }
            planned.push(chunk);
        }
    }

    let stale_files_removed = store.clear()?;
    if stale_files_removed > 0 {
        debug!(
            "Removed {} stale chunk files from {}",
            stale_files_removed,
            output_dir.display()
        );
    }

    for chunk in &planned {
        store.write(chunk)?;
    }

    let stats = ChunkingStats {
        documents: documents.len(),
        chunks: planned.len(),
        stale_files_removed,
    };

    info!(
        "Wrote {} chunks for {} documents to {}",
        stats.chunks,
        stats.documents,
        output_dir.display()
    );

    Ok(stats)
}
