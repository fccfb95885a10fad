// Embeddings module
// Text-to-vector conversion through the remote embedding service

pub mod client;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

pub use client::{DEFAULT_BATCH_SIZE, EmbeddingClient};

/// Embedding of one text.
///
/// A failed remote call yields [`Embedding::Unavailable`], which is kept apart
/// from a legitimate all-zero vector. Serialized as a plain float array, with
/// `Unavailable` written as `[]` and `[]` read back as `Unavailable`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub enum Embedding {
    Available(Vec<f32>),
    #[default]
    Unavailable,
}

impl Embedding {
    /// Wrap a vector returned by the service; an empty vector is unavailable
    #[inline]
    pub fn from_vector(vector: Vec<f32>) -> Self {
        if vector.is_empty() {
            Self::Unavailable
        } else {
            Self::Available(vector)
        }
    }

    #[inline]
    pub fn as_slice(&self) -> Option<&[f32]> {
        match self {
            Self::Available(vector) => Some(vector),
            Self::Unavailable => None,
        }
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.as_slice().map(<[f32]>::len)
    }
}

impl From<Vec<f32>> for Embedding {
    #[inline]
    fn from(vector: Vec<f32>) -> Self {
        Self::from_vector(vector)
    }
}

impl From<Embedding> for Vec<f32> {
    #[inline]
    fn from(embedding: Embedding) -> Self {
        match embedding {
            Embedding::Available(vector) => vector,
            Embedding::Unavailable => Vec::new(),
        }
    }
}

/// Turns texts into embeddings.
///
/// Implementations must return exactly one embedding per input text, in input
/// order, whatever fails along the way.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Vec<Embedding>;

    /// Embed a single query text
    #[inline]
    fn embed_query(&self, text: &str) -> Embedding {
        self.embed(&[text.to_string()])
            .into_iter()
            .next()
            .unwrap_or(Embedding::Unavailable)
    }
}
