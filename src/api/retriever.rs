//! Retriever - query embedding plus vector search

use crate::error::{PdfragError, Result};
use crate::ml::EmbeddingClient;
use crate::storage::{PayloadFilter, SearchHit, SearchRequest, VectorIndex};
use serde_json::Value;

/// Search result with score and citation metadata
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Similarity score
    pub score: f32,

    /// Text content
    pub text: String,

    pub source_file: Option<String>,
    pub page: Option<u32>,
    pub section_path: Option<String>,
}

impl From<SearchHit> for SearchResult {
    fn from(hit: SearchHit) -> Self {
        let field = |key: &str| hit.payload_str(key).map(str::to_string);
        Self {
            score: hit.score,
            text: field("text").unwrap_or_default(),
            source_file: field("source_file"),
            page: hit
                .payload
                .get("page")
                .and_then(Value::as_u64)
                .and_then(|p| u32::try_from(p).ok()),
            section_path: field("section_path").or_else(|| field("section")),
        }
    }
}

/// Searches one collection
pub struct Retriever<'a, E: EmbeddingClient, V: VectorIndex> {
    embedder: &'a E,
    index: &'a V,
    collection: String,
}

impl<'a, E: EmbeddingClient, V: VectorIndex> Retriever<'a, E, V> {
    pub fn new(embedder: &'a E, index: &'a V, collection: impl Into<String>) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
        }
    }

    /// Embed `query` and return the `top_k` nearest chunks.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<PayloadFilter>,
    ) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PdfragError::Config("empty search query".to_string()));
        }

        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors
            .pop()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PdfragError::Embedding("no embedding returned for query".to_string()))?;

        let hits = self
            .index
            .search(SearchRequest {
                collection: self.collection.clone(),
                vector,
                limit: top_k,
                filter,
                with_vectors: false,
            })
            .await?;
        log::debug!("Query {:?} matched {} chunks", query, hits.len());
        Ok(hits.into_iter().map(SearchResult::from).collect())
    }
}
