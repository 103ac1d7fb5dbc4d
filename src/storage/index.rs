//! Vector index seam
//!
//! The ingestion pipeline writes through [`VectorIndex`]; the Qdrant REST
//! client in [`super::qdrant`] is the bundled implementation.

use crate::config::DistanceMetric;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// One point written to the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Caller-assigned unique id
    pub id: String,
    pub vector: Vec<f32>,
    /// Chunk metadata plus text
    pub payload: Value,
}

/// Exact match on one payload field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub key: String,
    #[serde(rename = "match")]
    pub matches: MatchValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchValue {
    pub value: Value,
}

impl FieldMatch {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            matches: MatchValue {
                value: value.into(),
            },
        }
    }

    /// Parse `key=value`; integer and boolean values keep their JSON type.
    pub fn parse(expr: &str) -> Option<Self> {
        let (key, raw) = expr.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        let raw = raw.trim();
        let value = if let Ok(n) = raw.parse::<i64>() {
            Value::from(n)
        } else if let Ok(b) = raw.parse::<bool>() {
            Value::from(b)
        } else {
            Value::from(raw)
        };
        Some(Self::new(key, value))
    }
}

/// Conjunction of field matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadFilter {
    pub must: Vec<FieldMatch>,
}

impl PayloadFilter {
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }
}

/// Nearest-neighbour query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub collection: String,
    pub vector: Vec<f32>,
    pub limit: usize,
    pub filter: Option<PayloadFilter>,
    /// Return stored vectors alongside payloads
    pub with_vectors: bool,
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

impl SearchHit {
    /// A string payload field, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// External vector store operations
pub trait VectorIndex: Send + Sync {
    fn list_collections(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Create a collection; one that already exists counts as success.
    fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: DistanceMetric,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_collection(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn upsert(
        &self,
        collection: &str,
        records: Vec<IndexRecord>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn search(&self, request: SearchRequest) -> impl Future<Output = Result<Vec<SearchHit>>> + Send;
}
