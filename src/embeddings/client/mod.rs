
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Embedder, Embedding};
use crate::config::Config;
use crate::remote::ServiceAgent;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const EMBEDDINGS_PATH: &str = "/v1/embeddings";

/// Client for an OpenAI-compatible embedding endpoint
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    service: ServiceAgent,
    model: String,
    batch_size: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .service_url()
            .context("Failed to generate service URL from config")?;

        let service = ServiceAgent::new(base_url, config.service.api_token())
            .with_timeout(Duration::from_secs(config.embedding.timeout_seconds))
            .with_retry_attempts(config.embedding.retry_attempts);

        Ok(Self::from_agent(service, config.embedding.model.clone())
            .with_batch_size(config.embedding.batch_size as usize))
    }

    #[inline]
    pub fn from_agent(service: ServiceAgent, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Test connection to the service and verify the embedding model is served
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        self.service
            .validate_model(&self.model)
            .context("Embedding model validation failed")?;
        info!(
            "Health check passed for embedding service at {} with model {}",
            self.service.base_url(),
            self.model
        );
        Ok(())
    }

    /// Embed `texts` in consecutive batches of at most `batch_size`.
    ///
    /// A failed batch contributes one [`Embedding::Unavailable`] per text and
    /// the remaining batches still run, so the output always has the same
    /// length and order as the input.
    #[inline]
    pub fn embed_batched(&self, texts: &[String], batch_size: usize) -> Vec<Embedding> {
        if texts.is_empty() {
            return Vec::new();
        }

        let batch_size = batch_size.max(1);
        let total_batches = texts.len().div_ceil(batch_size);
        debug!(
            "Generating embeddings for {} texts in {} batches",
            texts.len(),
            total_batches
        );

        let bar = if total_batches > 1 && console::user_attended_stderr() {
            let bar = ProgressBar::new(total_batches as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} embedding batches")
            {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut results = Vec::with_capacity(texts.len());
        let mut failed_batches = 0;

        for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
            match self.embed_single_batch(batch) {
                Ok(embeddings) => {
                    debug!("Processed batch {}/{}", batch_index + 1, total_batches);
                    results.extend(embeddings);
                }
                Err(e) => {
                    warn!(
                        "Embedding batch {}/{} failed: {:#}",
                        batch_index + 1,
                        total_batches,
                        e
                    );
                    failed_batches += 1;
                    results.extend(std::iter::repeat_n(Embedding::Unavailable, batch.len()));
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        if failed_batches > 0 {
            warn!(
                "{} of {} embedding batches failed; their texts have no embedding",
                failed_batches, total_batches
            );
        }

        results
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response: EmbeddingResponse = self
            .service
            .post_json(EMBEDDINGS_PATH, &request)
            .with_context(|| format!("Failed to embed batch of {} texts", texts.len()))?;

        if response.data.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        Ok(response
            .data
            .into_iter()
            .map(|item| Embedding::from_vector(item.embedding))
            .collect())
    }
}

impl Embedder for EmbeddingClient {
    #[inline]
    fn embed(&self, texts: &[String]) -> Vec<Embedding> {
        self.embed_batched(texts, self.batch_size)
    }
}
