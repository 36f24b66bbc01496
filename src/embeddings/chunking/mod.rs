
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

pub const DEFAULT_WINDOW: usize = 500;
pub const DEFAULT_OVERLAP: usize = 50;

/// Configuration for sliding-window chunking. Sizes are counted in
/// characters (Unicode scalar values), never bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Width of each window
    pub window: usize,
    /// Characters shared by two consecutive windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    /// Build a validated configuration
    #[inline]
    pub fn new(window: usize, overlap: usize) -> Result<Self, ConfigError> {
        let config = Self { window, overlap };
        config.validate()?;
        Ok(config)
    }

    /// A zero window or an overlap that is not smaller than the window would
    /// leave the stride at zero and never terminate.
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::InvalidChunkWindow(self.window));
        }

        if self.overlap >= self.window {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.overlap,
                window: self.window,
            });
        }

        Ok(())
    }

    /// Distance between the starts of two consecutive windows
    #[inline]
    pub fn stride(&self) -> usize {
        self.window - self.overlap
    }
}

/// Split `text` into overlapping windows.
///
/// Starting at offset 0, each window covers `config.window` characters (or
/// whatever remains). The loop stops after the first window that reaches the
/// end of the text, so no empty trailing window is produced. Empty text
/// yields no windows.
#[inline]
pub fn chunk_text<'a>(text: &'a str, config: &ChunkingConfig) -> Result<Vec<&'a str>, ConfigError> {
    config.validate()?;

    // Byte offset of every character plus the end of the string
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < char_count {
        let end = (start + config.window).min(char_count);
        if let Some(segment) = text.get(boundaries[start]..boundaries[end]) {
            chunks.push(segment);
        }
        if end == char_count {
            break;
        }
        start += config.stride();
    }

    debug!(
        "Chunked {} characters into {} windows (window {}, overlap {})",
        char_count,
        chunks.len(),
        config.window,
        config.overlap
    );

    Ok(chunks)
}

/// Number of windows `chunk_text` produces for a text of `char_count`
/// characters
#[inline]
pub fn expected_chunk_count(char_count: usize, config: &ChunkingConfig) -> usize {
    if char_count == 0 {
        return 0;
    }
    if char_count <= config.window {
        return 1;
    }
    (char_count - config.overlap).div_ceil(config.stride())
}

/// Build the identifier of the `ordinal`-th chunk of a document
#[inline]
pub fn chunk_id(document_stem: &str, ordinal: usize) -> String {
    format!("{}_chunk_{}", document_stem, ordinal)
}
