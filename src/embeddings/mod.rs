// Embeddings module
// Sliding-window chunking and the embedding model seam (Ollama in production)

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, chunk_id, chunk_text, expected_chunk_count};
pub use ollama::OllamaClient;

use crate::{RagError, Result};

/// Maps text to fixed-width dense vectors with one consistent model.
///
/// Implementations must return exactly one vector per input text, in input
/// order, each `dimension()` wide. Build-time chunk embeddings and query-time
/// embeddings must come from the same model for distances to mean anything.
pub trait Embedder: Send + Sync {
    /// Name of the model producing the vectors
    fn model_name(&self) -> &str;

    /// Width of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Embed `texts`, preserving order
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text
    #[inline]
    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed(&[query.to_string()])?;
        check_embeddings(&embeddings, 1, self.dimension())?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("Embedder returned no vector for query".to_string()))
    }
}

/// Check that an embedder honoured its contract for a batch of `expected`
/// texts. A count mismatch is an embedding failure; a width mismatch means the
/// model does not produce `dimension`-wide vectors, which is a configuration
/// error.
#[inline]
pub fn check_embeddings(
    embeddings: &[Vec<f32>],
    expected: usize,
    dimension: usize,
) -> Result<()> {
    if embeddings.len() != expected {
        return Err(RagError::Embedding(format!(
            "Mismatch between request and response counts: {} vs {}",
            expected,
            embeddings.len()
        )));
    }

    if let Some((position, vector)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, vector)| vector.len() != dimension)
    {
        return Err(RagError::Config(format!(
            "Embedding {} has {} dimensions, expected {}",
            position,
            vector.len(),
            dimension
        )));
    }

    Ok(())
}
