//! Embedding acquisition and vector utilities.
//!
//! The primary path submits text to an Ollama-compatible embedding endpoint
//! (`POST /api/embeddings` with `{model, prompt}`) under a bounded timeout.
//! Any transport, timeout, or protocol failure falls back to a deterministic
//! hash-derived vector so the pipeline keeps moving offline; degraded vectors
//! are logged and flagged, never silently substituted.
//!
//! Also provides the vector plumbing shared with the store:
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian f32 BLOB codec for SQLite
//! - [`cosine_similarity`] / [`cosine_distance`] — the search ranking measure

use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::EmbeddingConfig;

/// One embedding plus how it was obtained.
#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    pub vector: Vec<f32>,
    /// True when the deterministic fallback produced the vector.
    pub degraded: bool,
}

/// Client for the external embedding service with a local fallback.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    concurrency: usize,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: config.ollama_url.clone(),
            model: config.model.clone(),
            dims: config.dims,
            concurrency: config.concurrency,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Embed one text. Infallible by design: a service failure degrades to
    /// the fallback vector instead of erroring.
    pub async fn embed(&self, text: &str) -> EmbeddingOutcome {
        match self.embed_remote(text).await {
            Ok(vector) => EmbeddingOutcome {
                vector,
                degraded: false,
            },
            Err(e) => {
                warn!(
                    model = %self.model,
                    url = %self.url,
                    error = %e,
                    "embedding service unavailable, using deterministic fallback"
                );
                EmbeddingOutcome {
                    vector: fallback_embedding(text, self.dims),
                    degraded: true,
                }
            }
        }
    }

    /// Embed a batch of texts with bounded concurrency, preserving input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<EmbeddingOutcome> {
        let mut futures = Vec::with_capacity(texts.len());
        for text in texts {
            futures.push(self.embed(text));
        }
        stream::iter(futures)
            .buffered(self.concurrency.max(1))
            .collect()
            .await
    }

    async fn embed_remote(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .http
            .post(format!("{}/api/embeddings", self.url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            anyhow::bail!("embedding service error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let embedding = json
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("invalid embedding response: missing embedding array"))?;

        Ok(embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect())
    }

    /// Check whether the embedding service answers at all (used by `stats`/`info`).
    pub async fn probe(&self) -> bool {
        let result = self
            .http
            .get(format!("{}/api/tags", self.url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        matches!(result, Ok(r) if r.status().is_success())
    }
}

/// Deterministic fallback embedding derived from a SHA-256 of the text.
///
/// The digest is sliced into 4-byte big-endian integers normalized to the
/// unit interval; if shorter than `dims`, existing values repeat cyclically
/// (never re-hashed) until the target length, then truncate. Identical text
/// always yields a bit-identical vector.
pub fn fallback_embedding(text: &str, dims: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());

    let mut values: Vec<f32> = digest
        .chunks_exact(4)
        .map(|b| {
            let n = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
            (n as f64 / 2f64.powi(32)) as f32
        })
        .collect();

    while values.len() < dims {
        let take = values.len().min(dims - values.len());
        let prefix: Vec<f32> = values[..take].to_vec();
        values.extend(prefix);
    }
    values.truncate(dims);
    values
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Dissimilarity used for ranking: smaller = more relevant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b) as f64
}
