//! Embedding service client
//!
//! [`OllamaEmbedder`] talks to an Ollama-compatible `/api/embed` endpoint.
//! Transient failures (429, 5xx, connect/timeout errors) are retried with
//! exponential backoff.

use crate::config::EmbeddingConfig;
use crate::error::{PdfragError, Result};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Turns input strings into vectors, one per input, in input order
pub trait EmbeddingClient: Send + Sync {
    /// Model identifier the vectors come from.
    fn model(&self) -> &str;

    fn embed(&self, inputs: &[String]) -> impl Future<Output = Result<Vec<Embedding>>> + Send;
}

/// Client for Ollama's batch embedding API
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    max_retries: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(PdfragError::Config("missing embedding model name".to_string()));
        }
        if !(config.endpoint.starts_with("http://") || config.endpoint.starts_with("https://")) {
            return Err(PdfragError::Config(format!(
                "embedding endpoint must be an http(s) URL: {}",
                config.endpoint
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            max_retries: config.max_retries.max(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EmbeddingClient for OllamaEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Embedding>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: inputs,
        };
        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: EmbedResponse = resp.json().await?;
                        return check_count(parsed.embeddings, inputs.len());
                    }

                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        log::warn!(
                            "Embedding request failed ({}), retry {}/{}",
                            status,
                            attempt,
                            self.max_retries - 1
                        );
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(PdfragError::Embedding(format!(
                        "embedding request failed ({}): {}",
                        status, body
                    )));
                }
                Err(err) => {
                    if is_retryable(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        log::warn!("Embedding request error: {}, retry {}", err, attempt);
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

/// A response with a different vector count than inputs is an error.
pub fn check_count(embeddings: Vec<Embedding>, expected: usize) -> Result<Vec<Embedding>> {
    if embeddings.len() != expected {
        return Err(PdfragError::Embedding(format!(
            "service returned {} embeddings for {} inputs",
            embeddings.len(),
            expected
        )));
    }
    Ok(embeddings)
}

pub(crate) fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub(crate) fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

pub(crate) fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_derived_from_base_url() {
        let config = EmbeddingConfig {
            endpoint: "http://localhost:11434/".to_string(),
            ..Default::default()
        };
        let embedder = OllamaEmbedder::new(&config).unwrap();
        assert_eq!(embedder.endpoint(), "http://localhost:11434/api/embed");
        assert_eq!(embedder.model(), "bge-m3");
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let no_model = EmbeddingConfig {
            model: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(OllamaEmbedder::new(&no_model), Err(PdfragError::Config(_))));

        let bad_url = EmbeddingConfig {
            endpoint: "localhost:11434".to_string(),
            ..Default::default()
        };
        assert!(OllamaEmbedder::new(&bad_url).is_err());
    }

    #[test]
    fn test_count_mismatch() {
        let vectors = vec![vec![0.0f32; 4]; 4];
        let err = check_count(vectors.clone(), 5).unwrap_err();
        assert!(matches!(err, PdfragError::Embedding(_)));
        assert_eq!(check_count(vectors, 4).unwrap().len(), 4);
    }

    #[test]
    fn test_retry_policy() {
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::BAD_GATEWAY));
        assert!(!should_retry(StatusCode::BAD_REQUEST));
        assert_eq!(retry_backoff(1), Duration::from_millis(1000));
        assert_eq!(retry_backoff(9), Duration::from_millis(16000));
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"model":"bge-m3","embeddings":[[0.1,0.2],[0.3,0.4]]}"#;
        let parsed: EmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let embedder = OllamaEmbedder::new(&EmbeddingConfig::default()).unwrap();
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }
}
