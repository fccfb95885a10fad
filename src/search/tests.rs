use super::*;
use crate::embeddings::Embedding;
use crate::embeddings::testing::StaticEmbedder;
use crate::knowledge::{Granularity, KnowledgeRow};

fn record(id: usize, question: &str, answer: &str, category: &str) -> KnowledgeRecord {
    KnowledgeRecord {
        id,
        question: Some(question.to_string()),
        answer: answer.to_string(),
        category: category.to_string(),
        subcategory: String::new(),
        priority: None,
        audience: None,
    }
}

fn store_of(vectors: Vec<Vec<f32>>) -> VectorStore {
    let metadata = vectors
        .iter()
        .enumerate()
        .map(|(i, _)| record(i, &format!("q{}", i), &format!("a{}", i), "c"))
        .collect();
    let vectors = vectors.into_iter().map(Embedding::from_vector).collect();
    VectorStore::from_parts(vectors, metadata).expect("aligned store")
}

fn indices(results: &[SimilarityResult]) -> Vec<usize> {
    results.iter().map(|r| r.source_index).collect()
}

#[test]
fn cosine_is_symmetric() {
    let a = [0.3, -1.2, 4.0];
    let b = [2.5, 0.7, -0.1];
    assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
}

#[test]
fn cosine_of_vector_with_itself_is_one() {
    let a = [0.12, 0.5, 3.3, 0.0, 7.1];
    assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_known_values() {
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
}

#[test]
fn cosine_guards() {
    assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    assert_eq!(cosine_similarity(&[], &[]), 0.0);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
}

#[test]
fn rank_orders_by_descending_score() {
    let store = store_of(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]]);
    let results = rank(&store, &[1.0, 0.1], 3, -1.0);

    assert_eq!(indices(&results), vec![1, 2, 0]);
    assert!(
        results
            .windows(2)
            .all(|w| w[0].similarity_score >= w[1].similarity_score)
    );
}

#[test]
fn rank_never_returns_scores_below_threshold() {
    let store = store_of(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]);
    let results = rank(&store, &[1.0, 0.0], 10, 0.5);

    assert_eq!(indices(&results), vec![0, 2]);
    assert!(results.iter().all(|r| r.similarity_score >= 0.5));
}

#[test]
fn rank_truncates_to_top_k() {
    let store = store_of(vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.8, 0.2], vec![0.7, 0.3]]);

    assert_eq!(rank(&store, &[1.0, 0.0], 2, 0.0).len(), 2);
    assert!(rank(&store, &[1.0, 0.0], 0, 0.0).is_empty());
    // fewer qualifying entries than top_k returns all of them
    assert_eq!(rank(&store, &[1.0, 0.0], 10, 0.0).len(), 4);
}

#[test]
fn rank_ties_keep_insertion_order() {
    let store = store_of(vec![vec![0.0, 1.0], vec![2.0, 0.0], vec![0.5, 0.0], vec![1.0, 0.0]]);
    let results = rank(&store, &[1.0, 0.0], 4, 0.5);

    assert_eq!(indices(&results), vec![1, 2, 3]);
}

#[test]
fn rank_is_deterministic() {
    let store = store_of(vec![
        vec![0.2, 0.9, 0.1],
        vec![0.3, 0.3, 0.3],
        vec![0.9, 0.1, 0.4],
        vec![0.3, 0.3, 0.3],
    ]);
    let query = [0.5, 0.5, 0.2];

    let first = rank(&store, &query, 3, 0.0);
    for _ in 0..10 {
        assert_eq!(rank(&store, &query, 3, 0.0), first);
    }
}

#[test]
fn rank_skips_unavailable_and_mismatched_vectors() {
    let store = store_of(vec![vec![], vec![1.0, 0.0, 0.0], vec![1.0, 0.0]]);
    let results = rank(&store, &[1.0, 0.0], 10, -1.0);

    // index 0 has no embedding and is never scored; index 1 scores 0
    assert_eq!(indices(&results), vec![2, 1]);
    assert_eq!(results[1].similarity_score, 0.0);
}

#[test]
fn rank_carries_metadata() {
    let store = store_of(vec![vec![1.0, 0.0]]);
    let results = rank(&store, &[1.0, 0.0], 1, 0.0);

    assert_eq!(results[0].metadata.id, 0);
    assert_eq!(results[0].metadata.answer, "a0");
}

fn two_record_searcher(query_vector: Vec<f32>) -> Searcher {
    let rows = vec![
        KnowledgeRow {
            question: Some("Как оформить карту?".to_string()),
            answer: "Ответ А".to_string(),
            category: "Карты".to_string(),
            ..KnowledgeRow::default()
        },
        KnowledgeRow {
            question: Some("Как закрыть счёт?".to_string()),
            answer: "Ответ Б".to_string(),
            category: "Счета".to_string(),
            ..KnowledgeRow::default()
        },
    ];
    let embedder = Arc::new(StaticEmbedder::new([
        ("Вопрос: Как оформить карту? Категория: Карты ", vec![0.9, 0.1, 0.0]),
        ("Вопрос: Как закрыть счёт? Категория: Счета ", vec![0.0, 0.2, 0.9]),
        ("Как получить карту?", query_vector),
    ]));
    let store = VectorStore::build(&rows, Granularity::Question, embedder.as_ref());
    Searcher::new(Arc::new(store), embedder)
}

#[test]
fn card_question_surfaces_matching_record() {
    let searcher = two_record_searcher(vec![0.8, 0.2, 0.1]);
    let results = searcher.search("Как получить карту?", 1, 0.5);

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata.answer, "Ответ А");
    assert_eq!(results[0].metadata.category, "Карты");
    assert!(results[0].similarity_score > 0.5);
}

#[test]
fn weak_match_returns_nothing() {
    let searcher = two_record_searcher(vec![-0.1, 1.0, -0.1]);
    let results = searcher.search_with(
        "Как получить карту?",
        SearchParams {
            top_k: 1,
            min_similarity: 0.5,
        },
    );

    assert!(results.is_empty());
}

#[test]
fn unavailable_query_embedding_returns_empty() {
    let searcher = two_record_searcher(vec![0.8, 0.2, 0.1]);
    assert!(searcher.search("неизвестный запрос", 3, -1.0).is_empty());
}
