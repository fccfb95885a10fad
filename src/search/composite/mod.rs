
use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use super::{SimilarityResult, rank};
use crate::embeddings::Embedder;
use crate::knowledge::VectorStore;

/// Candidate counts, category floor and blend weights for a composite match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    pub top_categories: usize,
    pub top_questions: usize,
    pub min_category_similarity: f32,
    /// Weight of the category score
    pub category_weight: f32,
    /// Weight of the question score
    pub question_weight: f32,
}

impl Default for MatchParams {
    #[inline]
    fn default() -> Self {
        Self {
            top_categories: 3,
            top_questions: 3,
            min_category_similarity: 0.5,
            category_weight: 0.3,
            question_weight: 0.7,
        }
    }
}

/// Best (category, question) pairing for a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeMatch {
    pub combined_score: f32,
    pub category: String,
    pub subcategory: String,
    pub question: Option<String>,
    pub answer: String,
    pub question_score: f32,
    pub category_score: f32,
}

impl CompositeMatch {
    fn from_pair(
        category: &SimilarityResult,
        question: &SimilarityResult,
        combined_score: f32,
    ) -> Self {
        Self {
            combined_score,
            category: category.metadata.category.clone(),
            subcategory: category.metadata.subcategory.clone(),
            question: question.metadata.question.clone(),
            answer: question.metadata.answer.clone(),
            question_score: question.similarity_score,
            category_score: category.similarity_score,
        }
    }
}

/// Blends a category-level store with a question-level store.
///
/// Both stores must have been built with the same embedder.
#[derive(Clone)]
pub struct CompositeMatcher {
    categories: Arc<VectorStore>,
    questions: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl CompositeMatcher {
    #[inline]
    pub fn new(
        categories: Arc<VectorStore>,
        questions: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            categories,
            questions,
            embedder,
        }
    }

    /// Embed `query` once and match it against both stores.
    ///
    /// `None` means no match: the query could not be embedded, or either pass
    /// produced no candidates.
    #[inline]
    pub fn match_query(&self, query: &str, params: &MatchParams) -> Option<CompositeMatch> {
        let embedding = self.embedder.embed_query(query);
        let Some(vector) = embedding.as_slice() else {
            debug!("Query embedding unavailable, no composite match");
            return None;
        };
        self.match_vector(vector, params)
    }

    /// Match an already embedded query
    #[inline]
    pub fn match_vector(&self, query: &[f32], params: &MatchParams) -> Option<CompositeMatch> {
        let categories = rank(
            &self.categories,
            query,
            params.top_categories,
            params.min_category_similarity,
        );
        if categories.is_empty() {
            debug!(
                "No category candidates above {}",
                params.min_category_similarity
            );
            return None;
        }

        let questions = rank(&self.questions, query, params.top_questions, f32::NEG_INFINITY);
        if questions.is_empty() {
            debug!("No question candidates");
            return None;
        }

        best_pair(&categories, &questions, params)
    }
}

/// Highest blended score over the full cross product, category-major.
/// On equal scores the earlier pair is kept.
fn best_pair(
    categories: &[SimilarityResult],
    questions: &[SimilarityResult],
    params: &MatchParams,
) -> Option<CompositeMatch> {
    let mut best: Option<(f32, &SimilarityResult, &SimilarityResult)> = None;

    for (category, question) in categories.iter().cartesian_product(questions) {
        let combined = params.category_weight * category.similarity_score
            + params.question_weight * question.similarity_score;
        match best {
            Some((score, _, _)) if combined <= score => {}
            _ => best = Some((combined, category, question)),
        }
    }

    best.map(|(score, category, question)| {
        debug!(
            "Composite match {} / {:?} scored {:.4}",
            category.metadata.category, question.metadata.question, score
        );
        CompositeMatch::from_pair(category, question, score)
    })
}
