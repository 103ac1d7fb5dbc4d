//! Ingestion pipeline tests against in-memory services
//!
//! `FakeEmbedder` and `MemoryIndex` stand in for the embedding service and
//! the vector index so batching, collection handling and failure paths can
//! be checked without a network.

use pdfrag_rs::api::{IngestionPipeline, Retriever, embed_in_batches};
use pdfrag_rs::config::{Config, DistanceMetric};
use pdfrag_rs::ml::{Embedding, EmbeddingClient};
use pdfrag_rs::storage::{
    FieldMatch, IndexRecord, PayloadFilter, SearchHit, SearchRequest, VectorIndex, read_records,
    write_records,
};
use pdfrag_rs::text::{ChunkMetadata, ChunkRecord};
use pdfrag_rs::{PdfragError, Result};
use approx::assert_relative_eq;
use serde_json::Map;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;

/// Deterministic embedder: identical texts get identical vectors.
struct FakeEmbedder {
    dimension: usize,
    /// Return one vector fewer than requested
    short_by_one: bool,
    /// Vector lengths to return instead of `dimension`, one per input
    lengths: Option<Vec<usize>>,
    calls: Mutex<Vec<usize>>,
}

impl FakeEmbedder {
    fn new(dimension: usize) -> Self {
        Self {
            dimension,
            short_by_one: false,
            lengths: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn short_by_one(dimension: usize) -> Self {
        Self {
            short_by_one: true,
            ..Self::new(dimension)
        }
    }

    fn ragged(lengths: Vec<usize>) -> Self {
        let dimension = lengths.first().copied().unwrap_or(1);
        Self {
            lengths: Some(lengths),
            ..Self::new(dimension)
        }
    }

    fn vector(&self, text: &str, dimension: usize) -> Embedding {
        let mut v = vec![0.0f32; dimension];
        for (i, b) in text.bytes().enumerate() {
            v[i % dimension] += b as f32;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        v.iter().map(|x| x / norm).collect()
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

impl EmbeddingClient for FakeEmbedder {
    fn model(&self) -> &str {
        "fake-embed"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Embedding>> {
        self.calls.lock().unwrap().push(inputs.len());
        let mut vectors: Vec<Embedding> = inputs
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let dimension = self
                    .lengths
                    .as_ref()
                    .and_then(|l| l.get(i).copied())
                    .unwrap_or(self.dimension);
                self.vector(t, dimension)
            })
            .collect();
        if self.short_by_one {
            vectors.pop();
        }
        Ok(vectors)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CollectionInfo {
    dimension: usize,
    distance: DistanceMetric,
}

/// Vector index kept in memory; records every call it receives.
#[derive(Default)]
struct MemoryIndex {
    collections: Mutex<HashMap<String, CollectionInfo>>,
    points: Mutex<HashMap<String, Vec<IndexRecord>>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryIndex {
    fn with_collection(name: &str, dimension: usize) -> Self {
        let index = Self::default();
        index.collections.lock().unwrap().insert(
            name.to_string(),
            CollectionInfo {
                dimension,
                distance: DistanceMetric::Cosine,
            },
        );
        index.points.lock().unwrap().insert(
            name.to_string(),
            vec![IndexRecord {
                id: "old".to_string(),
                vector: vec![1.0; dimension],
                payload: serde_json::json!({"text": "stale"}),
            }],
        );
        index
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn upsert_count(&self) -> usize {
        self.calls().iter().filter(|c| c.starts_with("upsert")).count()
    }

    fn point_count(&self, collection: &str) -> usize {
        self.points.lock().unwrap().get(collection).map_or(0, Vec::len)
    }

    fn collection(&self, name: &str) -> Option<CollectionInfo> {
        self.collections.lock().unwrap().get(name).copied()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (na * nb).max(1e-6)
}

impl VectorIndex for MemoryIndex {
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push("list".to_string());
        Ok(self.collections.lock().unwrap().keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str, dimension: usize, distance: DistanceMetric) -> Result<()> {
        self.calls.lock().unwrap().push(format!("create {name} {dimension}"));
        self.collections
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_insert(CollectionInfo { dimension, distance });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("delete {name}"));
        self.collections.lock().unwrap().remove(name);
        self.points.lock().unwrap().remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("upsert {collection} {}", records.len()));
        let Some(info) = self.collection(collection) else {
            return Err(PdfragError::Index(format!("collection {collection} not found")));
        };
        if records.iter().any(|r| r.vector.len() != info.dimension) {
            return Err(PdfragError::Index("wrong vector size".to_string()));
        }
        let mut points = self.points.lock().unwrap();
        let stored = points.entry(collection.to_string()).or_default();
        for record in records {
            stored.retain(|p| p.id != record.id);
            stored.push(record);
        }
        Ok(())
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        let points = self.points.lock().unwrap();
        let stored = points.get(&request.collection).cloned().unwrap_or_default();
        let matches = |p: &IndexRecord| {
            request.filter.as_ref().is_none_or(|f| {
                f.must
                    .iter()
                    .all(|m| p.payload.get(&m.key) == Some(&m.matches.value))
            })
        };
        let mut hits: Vec<SearchHit> = stored
            .iter()
            .filter(|p| matches(p))
            .map(|p| SearchHit {
                id: p.id.clone(),
                score: cosine(&p.vector, &request.vector),
                payload: p.payload.clone(),
                vector: None,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(request.limit);
        Ok(hits)
    }
}

fn chunk(source: &str, index: usize, text: &str, section: Option<&str>) -> ChunkRecord {
    ChunkRecord::new(
        text,
        ChunkMetadata {
            source_file: source.to_string(),
            page: 1 + index as u32 / 2,
            chunk_index: index,
            section_path: section.map(str::to_string),
            font_size_avg: Some(10.0),
            is_bold: Some(false),
            extra: Map::new(),
        },
    )
}

fn chunks(source: &str, n: usize) -> Vec<ChunkRecord> {
    (0..n)
        .map(|i| chunk(source, i, &format!("{source} chunk number {i} text"), Some("Module 1")))
        .collect()
}

fn config(embed_batch: usize, index_batch: usize) -> Config {
    let mut config = Config::default();
    config.embedding.batch_size = embed_batch;
    config.index.batch_size = index_batch;
    config
}

#[tokio::test]
async fn test_short_embedding_batch_never_upserts() {
    let mut pipeline = IngestionPipeline::new(FakeEmbedder::short_by_one(4), MemoryIndex::default(), &config(8, 8));

    let result = pipeline.ingest_records(chunks("a.pdf", 5)).await;

    assert!(matches!(result, Err(PdfragError::Embedding(_))));
    assert_eq!(pipeline.embedder().batch_sizes(), vec![5]);
    assert_eq!(pipeline.index().upsert_count(), 0);
    assert!(pipeline.index().calls().is_empty());
    assert_eq!(pipeline.stats().chunks, 0);
}

#[tokio::test]
async fn test_mixed_vector_lengths_never_upsert() {
    let mut pipeline = IngestionPipeline::new(
        FakeEmbedder::ragged(vec![3, 2, 2]),
        MemoryIndex::default(),
        &config(8, 8),
    );

    let result = pipeline.ingest_records(chunks("a.pdf", 3)).await;

    assert!(matches!(result, Err(PdfragError::Schema(_))));
    assert_eq!(pipeline.index().upsert_count(), 0);
    assert!(pipeline.index().collection("pdf_chunks").is_none());
    assert_eq!(pipeline.stats().chunks, 0);
}

#[tokio::test]
async fn test_collection_created_from_first_batch() {
    let mut pipeline = IngestionPipeline::new(FakeEmbedder::new(8), MemoryIndex::default(), &config(2, 10));

    let count = pipeline.ingest_records(chunks("a.pdf", 5)).await.unwrap();

    assert_eq!(count, 5);
    assert_eq!(pipeline.dimension(), Some(8));
    assert_eq!(pipeline.embedder().batch_sizes(), vec![2, 2, 1]);
    assert_eq!(
        pipeline.index().collection("pdf_chunks"),
        Some(CollectionInfo {
            dimension: 8,
            distance: DistanceMetric::Cosine
        })
    );
    let creates = pipeline
        .index()
        .calls()
        .iter()
        .filter(|c| c.starts_with("create"))
        .count();
    assert_eq!(creates, 1);
    assert_eq!(pipeline.index().upsert_count(), 3);
    assert_eq!(pipeline.index().point_count("pdf_chunks"), 5);
    assert_eq!(pipeline.stats().batches, 3);
}

#[tokio::test]
async fn test_batch_size_is_bounded_by_index_batch() {
    let mut pipeline = IngestionPipeline::new(FakeEmbedder::new(4), MemoryIndex::default(), &config(64, 3));

    pipeline.ingest_records(chunks("a.pdf", 7)).await.unwrap();

    assert_eq!(pipeline.embedder().batch_sizes(), vec![3, 3, 1]);
    assert_eq!(pipeline.index().point_count("pdf_chunks"), 7);
}

#[tokio::test]
async fn test_existing_collection_is_reused() {
    let index = MemoryIndex::with_collection("pdf_chunks", 4);
    let mut pipeline = IngestionPipeline::new(FakeEmbedder::new(4), index, &config(8, 8));

    pipeline.ingest_records(chunks("a.pdf", 2)).await.unwrap();

    assert!(!pipeline.index().calls().iter().any(|c| c.starts_with("create")));
    assert!(!pipeline.index().calls().iter().any(|c| c.starts_with("delete")));
    assert_eq!(pipeline.index().point_count("pdf_chunks"), 3);
}

#[tokio::test]
async fn test_recreate_drops_existing_points() {
    let index = MemoryIndex::with_collection("pdf_chunks", 3);
    let mut config = config(8, 8);
    config.index.recreate = true;
    config.index.distance = DistanceMetric::Dot;
    let mut pipeline = IngestionPipeline::new(FakeEmbedder::new(6), index, &config);

    pipeline.ingest_records(chunks("a.pdf", 2)).await.unwrap();
    // a second document must not recreate again
    pipeline.ingest_records(chunks("b.pdf", 2)).await.unwrap();

    let calls = pipeline.index().calls();
    assert_eq!(calls.iter().filter(|c| c.starts_with("delete")).count(), 1);
    assert_eq!(calls.iter().filter(|c| c.starts_with("create")).count(), 1);
    assert_eq!(
        pipeline.index().collection("pdf_chunks"),
        Some(CollectionInfo {
            dimension: 6,
            distance: DistanceMetric::Dot
        })
    );
    assert_eq!(pipeline.index().point_count("pdf_chunks"), 4);
}

#[tokio::test]
async fn test_empty_input_touches_nothing() {
    let mut pipeline = IngestionPipeline::new(FakeEmbedder::new(4), MemoryIndex::default(), &Config::default());

    assert_eq!(pipeline.ingest_records(Vec::new()).await.unwrap(), 0);
    assert_eq!(pipeline.upload_records(&[]).await.unwrap(), 0);
    assert!(pipeline.embedder().batch_sizes().is_empty());
    assert!(pipeline.index().calls().is_empty());
}

#[tokio::test]
async fn test_embed_write_read_upload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.jsonl");
    let embedder = FakeEmbedder::new(5);

    let embedded = embed_in_batches(&embedder, chunks("a.pdf", 4), 3).await.unwrap();
    assert_eq!(embedder.batch_sizes(), vec![3, 1]);
    assert!(embedded.iter().all(|r| r.embedding_model.as_deref() == Some("fake-embed")));
    write_records(&path, &embedded).unwrap();

    let loaded = read_records(&path).unwrap();
    assert_eq!(loaded.len(), embedded.len());
    for (a, b) in loaded.iter().zip(&embedded) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.metadata, b.metadata);
        let (va, vb) = (a.embeddings.as_ref().unwrap(), b.embeddings.as_ref().unwrap());
        assert_eq!(va.len(), vb.len());
        for (x, y) in va.iter().zip(vb) {
            assert_relative_eq!(*x, *y, epsilon = 1e-6);
        }
    }

    let mut pipeline = IngestionPipeline::new(FakeEmbedder::new(5), MemoryIndex::default(), &config(8, 3));
    assert_eq!(pipeline.upload_records(&loaded).await.unwrap(), 4);
    // uploads never call the embedder
    assert!(pipeline.embedder().batch_sizes().is_empty());
    assert_eq!(pipeline.index().upsert_count(), 2);

    let points = pipeline.index().points.lock().unwrap().get("pdf_chunks").cloned().unwrap();
    let first = points.iter().find(|p| p.id == loaded[0].id).unwrap();
    assert_eq!(first.payload["text"], loaded[0].text);
    assert_eq!(first.payload["section_path"], "Module 1");
    assert_eq!(first.payload["embedding_model"], "fake-embed");
}

#[tokio::test]
async fn test_upload_rejects_records_without_embeddings() {
    let embedder = FakeEmbedder::new(5);
    let mut records = embed_in_batches(&embedder, chunks("a.pdf", 3), 8).await.unwrap();
    records[2].embeddings = None;

    let mut pipeline = IngestionPipeline::new(FakeEmbedder::new(5), MemoryIndex::default(), &Config::default());
    let result = pipeline.upload_records(&records).await;

    assert!(matches!(result, Err(PdfragError::Schema(_))));
    assert!(pipeline.index().calls().is_empty());
}

#[tokio::test]
async fn test_search_after_ingest() {
    let mut pipeline = IngestionPipeline::new(FakeEmbedder::new(16), MemoryIndex::default(), &config(4, 4));
    let mut records = chunks("a.pdf", 3);
    records.push(chunk("b.pdf", 0, "Replace the filter every six months.", Some("Maintenance")));
    pipeline.ingest_records(records).await.unwrap();

    let retriever = Retriever::new(pipeline.embedder(), pipeline.index(), "pdf_chunks");
    let results = retriever
        .search("Replace the filter every six months.", 2, None)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, "Replace the filter every six months.");
    assert_eq!(results[0].source_file.as_deref(), Some("b.pdf"));
    assert_eq!(results[0].section_path.as_deref(), Some("Maintenance"));
    assert!(results[0].score >= results[1].score);

    let filter = PayloadFilter {
        must: vec![FieldMatch::new("source_file", "a.pdf")],
    };
    let results = retriever
        .search("Replace the filter every six months.", 10, Some(filter))
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.source_file.as_deref() == Some("a.pdf")));

    assert!(matches!(
        retriever.search("   ", 3, None).await,
        Err(PdfragError::Config(_))
    ));
}
