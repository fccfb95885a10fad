use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Embedder, Embedding};

/// Embedder returning fixed vectors per exact text; unknown texts are unavailable
pub(crate) struct StaticEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl StaticEmbedder {
    pub(crate) fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        Self {
            vectors: entries
                .into_iter()
                .map(|(text, vector)| (text.into(), vector))
                .collect(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Number of `embed` invocations so far
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text passed to `embed`, in call order
    pub(crate) fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("seen lock poisoned").clone()
    }
}

impl Embedder for StaticEmbedder {
    fn embed(&self, texts: &[String]) -> Vec<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .expect("seen lock poisoned")
            .extend(texts.iter().cloned());
        texts
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .map_or(Embedding::Unavailable, Embedding::from_vector)
            })
            .collect()
    }
}
