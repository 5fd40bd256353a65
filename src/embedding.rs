//! Embedding client abstraction and vector similarity.
//!
//! Defines the [`Embedder`] trait the indexing and query pipeline depend on,
//! and [`OllamaEmbedder`], which calls a local Ollama instance's
//! `POST /api/embed` endpoint. Also provides [`cosine_similarity`].
//!
//! # Request shape
//!
//! Service URL and model come from the persisted retrieval config and can
//! change between calls, so they travel with every [`EmbedRequest`] rather
//! than being fixed at construction time.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::models::RagConfig;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// A batch of texts to embed against a given service and model.
#[derive(Debug, Clone, Copy)]
pub struct EmbedRequest<'a> {
    pub base_url: &'a str,
    pub model: &'a str,
    pub texts: &'a [String],
}

impl<'a> EmbedRequest<'a> {
    pub fn from_config(config: &'a RagConfig, texts: &'a [String]) -> Self {
        Self {
            base_url: &config.ollama_base_url,
            model: &config.embeddings_model,
            texts,
        }
    }
}

/// Turns texts into embedding vectors.
///
/// Implementations must return exactly one non-empty vector per input text,
/// in input order, or fail with a descriptive error.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_texts(&self, req: &EmbedRequest<'_>) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
///
/// Convenience wrapper around [`Embedder::embed_texts`] for a one-item batch.
pub async fn embed_query(embedder: &dyn Embedder, config: &RagConfig, text: &str) -> Result<Vec<f32>> {
    let texts = [text.to_string()];
    let results = embedder
        .embed_texts(&EmbedRequest::from_config(config, &texts))
        .await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

// ============ Ollama ============

/// Embedding client for a local Ollama instance.
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`). All chunks of a document go out
/// in a single request.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_texts(&self, req: &EmbedRequest<'_>) -> Result<Vec<Vec<f32>>> {
        if req.texts.is_empty() {
            return Ok(Vec::new());
        }

        let base = normalize_base_url(req.base_url);
        let url = format!("{}/api/embed", base);
        let body = serde_json::json!({
            "model": req.model,
            "input": req.texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            anyhow::anyhow!("Invalid Ollama response (not JSON): {}", e)
                        })?;
                        return parse_ollama_response(&json, req.texts.len());
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Ollama embeddings error ({}): {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama embeddings error ({}): {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        base,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Ollama embedding failed after retries")))
    }
}

/// Strip a trailing slash; blank input falls back to the local default.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return DEFAULT_BASE_URL.to_string();
    }
    trimmed.trim_end_matches('/').to_string()
}

fn parse_ollama_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    if embeddings.len() != expected {
        bail!(
            "Invalid Ollama response: expected {} embeddings, got {}",
            expected,
            embeddings.len()
        );
    }

    let mut result = Vec::with_capacity(embeddings.len());

    for (i, embedding) in embeddings.iter().enumerate() {
        let values = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding {} is not an array", i))?;
        if values.is_empty() {
            bail!("Invalid Ollama response: embedding {} is empty", i);
        }
        let vec = values
            .iter()
            .map(|v| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    anyhow::anyhow!("Invalid Ollama response: embedding {} has a non-numeric value", i)
                })
            })
            .collect::<Result<Vec<f32>>>()?;
        result.push(vec);
    }

    Ok(result)
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` when either vector is empty, the lengths differ, or either
/// vector has zero magnitude, so degenerate embeddings never match anything.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        sim as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let v = vec![0.3, -0.2, 0.9];
        let zero = vec![0.0; 3];
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = vec![0.1, 0.7, -0.4, 2.0];
        let b = vec![1.5, -0.3, 0.2, 0.9];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://host:1/"), "http://host:1");
        assert_eq!(normalize_base_url("  "), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_parse_response_ok() {
        let json = serde_json::json!({"embeddings": [[0.1, 0.2], [0.3, 0.4]]});
        let out = parse_ollama_response(&json, 2).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_parse_response_rejects_empty_embedding() {
        let json = serde_json::json!({"embeddings": [[0.1], []]});
        let err = parse_ollama_response(&json, 2).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_parse_response_rejects_count_mismatch() {
        let json = serde_json::json!({"embeddings": [[0.1]]});
        assert!(parse_ollama_response(&json, 2).is_err());
    }

    #[test]
    fn test_parse_response_missing_array() {
        let json = serde_json::json!({"error": "model not found"});
        let err = parse_ollama_response(&json, 1).unwrap_err();
        assert!(err.to_string().contains("missing embeddings"));
    }
}
