//! Qdrant REST client

use super::index::{IndexRecord, PayloadFilter, SearchHit, SearchRequest, VectorIndex};
use crate::config::{DistanceMetric, IndexConfig};
use crate::error::{PdfragError, Result};
use crate::ml::embedding::{is_retryable, retry_backoff, should_retry};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const MAX_ATTEMPTS: usize = 3;

/// [`VectorIndex`] backed by a Qdrant server
#[derive(Clone)]
pub struct QdrantIndex {
    client: Client,
    base_url: String,
}

impl QdrantIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        if !(config.url.starts_with("http://") || config.url.starts_with("https://")) {
            return Err(PdfragError::Config(format!(
                "index URL must be an http(s) URL: {}",
                config.url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            let value = HeaderValue::from_str(key.trim())
                .map_err(|e| PdfragError::Config(format!("invalid index API key: {}", e)))?;
            headers.insert("api-key", value);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{}", self.base_url, name)
    }

    /// Send a request, retrying on 429/5xx and transport errors.
    async fn send(&self, what: &str, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        let mut attempt = 0usize;
        loop {
            match build().send().await {
                Ok(resp) if should_retry(resp.status()) && attempt + 1 < MAX_ATTEMPTS => {
                    attempt += 1;
                    log::warn!("{} returned {}, retry {}", what, resp.status(), attempt);
                    tokio::time::sleep(retry_backoff(attempt)).await;
                }
                Ok(resp) => return Ok(resp),
                Err(err) if is_retryable(&err) && attempt + 1 < MAX_ATTEMPTS => {
                    attempt += 1;
                    log::warn!("{} failed: {}, retry {}", what, err, attempt);
                    tokio::time::sleep(retry_backoff(attempt)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

async fn failure(what: &str, resp: Response) -> PdfragError {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    PdfragError::Index(format!("{} failed ({}): {}", what, status, body))
}

/// Concurrent creators race; losing the race is not an error.
pub fn is_already_exists(status: StatusCode, body: &str) -> bool {
    status == StatusCode::CONFLICT
        || (status == StatusCode::BAD_REQUEST && body.to_lowercase().contains("already exists"))
}

impl VectorIndex for QdrantIndex {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let url = format!("{}/collections", self.base_url);
        let resp = self.send("list collections", || self.client.get(&url)).await?;
        if !resp.status().is_success() {
            return Err(failure("list collections", resp).await);
        }
        let parsed: ApiResponse<CollectionsResult> = resp.json().await?;
        Ok(parsed.result.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: DistanceMetric,
    ) -> Result<()> {
        let url = self.collection_url(name);
        let body = CreateCollection {
            vectors: VectorParams {
                size: dimension,
                distance,
            },
        };
        let resp = self
            .send("create collection", || self.client.put(&url).json(&body))
            .await?;
        let status = resp.status();
        if status.is_success() {
            log::info!("Created collection {} (dim={}, {:?})", name, dimension, distance);
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        if is_already_exists(status, &text) {
            log::debug!("Collection {} already exists", name);
            return Ok(());
        }
        Err(PdfragError::Index(format!(
            "create collection {} failed ({}): {}",
            name, status, text
        )))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let url = self.collection_url(name);
        let resp = self.send("delete collection", || self.client.delete(&url)).await?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            log::info!("Deleted collection {}", name);
            return Ok(());
        }
        Err(failure("delete collection", resp).await)
    }

    async fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let url = format!("{}/points?wait=true", self.collection_url(collection));
        let body = UpsertPoints { points: &records };
        let resp = self.send("upsert", || self.client.put(&url).json(&body)).await?;
        if !resp.status().is_success() {
            return Err(failure("upsert", resp).await);
        }
        log::debug!("Upserted {} points into {}", records.len(), collection);
        Ok(())
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        let url = format!("{}/points/search", self.collection_url(&request.collection));
        let body = SearchBody {
            vector: &request.vector,
            limit: request.limit,
            filter: request.filter.as_ref().filter(|f| !f.is_empty()),
            with_payload: true,
            with_vector: request.with_vectors,
        };
        let resp = self.send("search", || self.client.post(&url).json(&body)).await?;
        if !resp.status().is_success() {
            return Err(failure("search", resp).await);
        }
        let parsed: ApiResponse<Vec<RawHit>> = resp.json().await?;
        Ok(parsed.result.into_iter().map(RawHit::into_hit).collect())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    #[serde(default)]
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: DistanceMetric,
}

#[derive(Serialize)]
struct UpsertPoints<'a> {
    points: &'a [IndexRecord],
}

#[derive(Serialize)]
struct SearchBody<'a> {
    vector: &'a [f32],
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a PayloadFilter>,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

impl RawHit {
    fn into_hit(self) -> SearchHit {
        // Qdrant ids are either UUID strings or unsigned integers
        let id = match self.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        SearchHit {
            id,
            score: self.score,
            payload: self.payload.unwrap_or(Value::Null),
            vector: self.vector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::index::FieldMatch;
    use serde_json::json;

    #[test]
    fn test_collection_urls() {
        let config = IndexConfig {
            url: "http://localhost:6333/".to_string(),
            ..Default::default()
        };
        let index = QdrantIndex::new(&config).unwrap();
        assert_eq!(index.collection_url("docs"), "http://localhost:6333/collections/docs");
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config = IndexConfig {
            url: "localhost:6333".to_string(),
            ..Default::default()
        };
        assert!(matches!(QdrantIndex::new(&config), Err(PdfragError::Config(_))));
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists(StatusCode::CONFLICT, ""));
        assert!(is_already_exists(
            StatusCode::BAD_REQUEST,
            r#"{"status":{"error":"Wrong input: Collection `docs` already exists!"}}"#
        ));
        assert!(!is_already_exists(StatusCode::BAD_REQUEST, "vector size mismatch"));
        assert!(!is_already_exists(StatusCode::INTERNAL_SERVER_ERROR, "already exists"));
    }

    #[test]
    fn test_request_bodies() {
        let create = CreateCollection {
            vectors: VectorParams {
                size: 1024,
                distance: DistanceMetric::Cosine,
            },
        };
        assert_eq!(
            serde_json::to_value(&create).unwrap(),
            json!({"vectors": {"size": 1024, "distance": "Cosine"}})
        );

        let filter = PayloadFilter {
            must: vec![FieldMatch::new("page", 2)],
        };
        let search = SearchBody {
            vector: &[0.5, 0.25],
            limit: 5,
            filter: Some(&filter),
            with_payload: true,
            with_vector: false,
        };
        assert_eq!(
            serde_json::to_value(&search).unwrap(),
            json!({
                "vector": [0.5, 0.25],
                "limit": 5,
                "filter": {"must": [{"key": "page", "match": {"value": 2}}]},
                "with_payload": true,
                "with_vector": false
            })
        );
    }

    #[test]
    fn test_search_response_parsing() {
        let body = json!({
            "result": [
                {"id": "6f1c", "version": 3, "score": 0.87, "payload": {"text": "hello"}},
                {"id": 42, "version": 1, "score": 0.5}
            ],
            "status": "ok",
            "time": 0.001
        });
        let parsed: ApiResponse<Vec<RawHit>> = serde_json::from_value(body).unwrap();
        let hits: Vec<SearchHit> = parsed.result.into_iter().map(RawHit::into_hit).collect();
        assert_eq!(hits[0].id, "6f1c");
        assert_eq!(hits[0].payload_str("text"), Some("hello"));
        assert_eq!(hits[1].id, "42");
        assert_eq!(hits[1].payload, Value::Null);
    }

    #[test]
    fn test_collections_response_parsing() {
        let body = json!({"result": {"collections": [{"name": "a"}, {"name": "b"}]}, "status": "ok"});
        let parsed: ApiResponse<CollectionsResult> = serde_json::from_value(body).unwrap();
        let names: Vec<_> = parsed.result.collections.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
