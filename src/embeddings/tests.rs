use super::*;
use crate::embeddings::testing::StaticEmbedder;

#[test]
fn empty_vector_is_unavailable() {
    assert_eq!(Embedding::from_vector(Vec::new()), Embedding::Unavailable);
    assert_eq!(Embedding::from(vec![0.5]), Embedding::Available(vec![0.5]));
}

#[test]
fn zero_vector_stays_available() {
    let zero = Embedding::from_vector(vec![0.0, 0.0, 0.0]);
    assert!(zero.is_available());
    assert_eq!(zero.dimension(), Some(3));
}

#[test]
fn serializes_as_plain_array() {
    let json = serde_json::to_string(&vec![
        Embedding::Available(vec![0.25, -1.5]),
        Embedding::Unavailable,
    ])
    .expect("embeddings should serialize");
    assert_eq!(json, "[[0.25,-1.5],[]]");

    let parsed: Vec<Embedding> = serde_json::from_str(&json).expect("embeddings should parse");
    assert_eq!(
        parsed,
        vec![Embedding::Available(vec![0.25, -1.5]), Embedding::Unavailable]
    );
}

#[test]
fn embed_query_uses_first_result() {
    let embedder = StaticEmbedder::new([("запрос", vec![1.0, 0.0])]);
    assert_eq!(
        embedder.embed_query("запрос"),
        Embedding::Available(vec![1.0, 0.0])
    );
    assert_eq!(embedder.embed_query("неизвестно"), Embedding::Unavailable);
    assert_eq!(embedder.calls(), 2);
}
