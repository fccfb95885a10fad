//! Cosine similarity ranking over a [`VectorStore`]

pub mod composite;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::embeddings::Embedder;
use crate::knowledge::{KnowledgeRecord, VectorStore};

pub use composite::{CompositeMatch, CompositeMatcher, MatchParams};

/// One ranked entry of a store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub similarity_score: f32,
    pub metadata: KnowledgeRecord,
    pub source_index: usize,
}

/// Ranking limits for a single search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub top_k: usize,
    pub min_similarity: f32,
}

impl Default for SearchParams {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 3,
            min_similarity: 0.5,
        }
    }
}

/// Cosine similarity of two vectors.
///
/// Returns 0 when the lengths differ, either vector is empty, or either has
/// zero norm.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Score every available entry of `store` against `query`, keep those at or
/// above `min_similarity` and return the best `top_k`, highest first.
///
/// Equal scores keep insertion order.
#[inline]
pub fn rank(
    store: &VectorStore,
    query: &[f32],
    top_k: usize,
    min_similarity: f32,
) -> Vec<SimilarityResult> {
    let mut scored: Vec<(usize, f32)> = store
        .vectors()
        .iter()
        .enumerate()
        .filter_map(|(index, vector)| {
            vector
                .as_slice()
                .map(|vector| (index, cosine_similarity(query, vector)))
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    scored
        .into_iter()
        .filter(|(_, score)| *score >= min_similarity)
        .take(top_k)
        .filter_map(|(index, score)| {
            store.metadata().get(index).map(|record| SimilarityResult {
                similarity_score: score,
                metadata: record.clone(),
                source_index: index,
            })
        })
        .collect()
}

/// Query-text search against one store
#[derive(Clone)]
pub struct Searcher {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Searcher {
    /// `embedder` must be the one the store was built with
    #[inline]
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Embed `query` and rank the store against it.
    ///
    /// A failed query embedding gives an empty result.
    #[inline]
    pub fn search(&self, query: &str, top_k: usize, min_similarity: f32) -> Vec<SimilarityResult> {
        let embedding = self.embedder.embed_query(query);
        let Some(vector) = embedding.as_slice() else {
            debug!("Query embedding unavailable, no results");
            return Vec::new();
        };

        let results = rank(&self.store, vector, top_k, min_similarity);
        debug!(
            "Search returned {} results (top_k={}, min_similarity={})",
            results.len(),
            top_k,
            min_similarity
        );
        results
    }

    #[inline]
    pub fn search_with(&self, query: &str, params: SearchParams) -> Vec<SimilarityResult> {
        self.search(query, params.top_k, params.min_similarity)
    }
}
