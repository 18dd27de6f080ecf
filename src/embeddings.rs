use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dimensionality of every vector produced by the embedding model
pub const EMBEDDING_DIMENSION: usize = 768;

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Embedding { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// Failure of a single embedding request
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("no embedding API key configured")]
    MissingApiKey,

    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("embedding API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding service unavailable: {0}")]
    Unavailable(String),
}

/// Anything that can turn text into an embedding.
///
/// The same implementation (and model) must be used when building an index
/// and when querying it: vectors from different models are not comparable,
/// and nothing here can detect the mix-up.
#[allow(async_fn_in_trait)]
pub trait Embedder {
    /// Generate an embedding for a single piece of text
    async fn embed(&self, text: &str) -> Result<Embedding, EmbedError>;
}

impl<E: Embedder> Embedder for &E {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        (**self).embed(text).await
    }
}

/// Check that an embedding has the expected dimensionality
pub fn ensure_dimension(embedding: Embedding, expected: usize) -> Result<Embedding, EmbedError> {
    if embedding.dimension() != expected {
        return Err(EmbedError::Dimension {
            expected,
            actual: embedding.dimension(),
        });
    }
    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dimension() {
        let ok = ensure_dimension(Embedding::new(vec![0.0; 4]), 4);
        assert!(ok.is_ok());

        let err = ensure_dimension(Embedding::new(vec![0.0; 3]), 4).unwrap_err();
        assert!(matches!(
            err,
            EmbedError::Dimension {
                expected: 4,
                actual: 3
            }
        ));
    }
}
