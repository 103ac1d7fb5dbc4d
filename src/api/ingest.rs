//! IngestionPipeline - embedding and index writes
//!
//! Chunks are embedded in batches and upserted batch by batch, in input
//! order. The destination collection is created lazily from the dimension
//! of the first embedded batch. A batch whose vector count does not match
//! its inputs fails before anything is written.

use crate::api::extractor::DocumentChunks;
use crate::config::{Config, EmbeddingConfig, IndexConfig};
use crate::error::{PdfragError, Result};
use crate::ml::{EmbeddingClient, check_count};
use crate::storage::{IndexRecord, IngestStats, VectorIndex};
use crate::text::ChunkRecord;
use std::time::Instant;

/// Drives embedding and upserts for one collection
pub struct IngestionPipeline<E: EmbeddingClient, V: VectorIndex> {
    embedder: E,
    index: V,
    embedding: EmbeddingConfig,
    config: IndexConfig,
    /// Vector size of the collection, once known
    dimension: Option<usize>,
    stats: IngestStats,
}

impl<E: EmbeddingClient, V: VectorIndex> IngestionPipeline<E, V> {
    pub fn new(embedder: E, index: V, config: &Config) -> Self {
        Self {
            embedder,
            index,
            embedding: config.embedding.clone(),
            config: config.index.clone(),
            dimension: None,
            stats: IngestStats::default(),
        }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn index(&self) -> &V {
        &self.index
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Embed records without writing them anywhere.
    pub async fn embed_records(&self, records: Vec<ChunkRecord>) -> Result<Vec<ChunkRecord>> {
        embed_in_batches(&self.embedder, records, self.embedding.batch_size).await
    }

    /// Create the collection on first use, with the given dimension.
    ///
    /// With `recreate` set, an existing collection is dropped first. Later
    /// calls only check that the dimension stays the same.
    pub async fn ensure_collection(&mut self, dimension: usize) -> Result<()> {
        if let Some(expected) = self.dimension {
            if expected != dimension {
                return Err(PdfragError::Schema(format!(
                    "vector dimension {} does not match collection dimension {}",
                    dimension, expected
                )));
            }
            return Ok(());
        }
        if dimension == 0 {
            return Err(PdfragError::Schema("empty embedding vector".to_string()));
        }

        let name = self.config.collection.clone();
        let existing = self.index.list_collections().await?;
        let exists = existing.iter().any(|c| *c == name);
        if exists && self.config.recreate {
            log::warn!("Recreating collection {}, existing points are dropped", name);
            self.index.delete_collection(&name).await?;
        }
        if !exists || self.config.recreate {
            self.index
                .create_collection(&name, dimension, self.config.distance)
                .await?;
        }
        self.dimension = Some(dimension);
        Ok(())
    }

    /// Upsert records that already carry embeddings.
    ///
    /// Every record must have a non-empty vector of one common length; a
    /// record that does not is a schema error and nothing is written.
    pub async fn upload_records(&mut self, records: &[ChunkRecord]) -> Result<usize> {
        let dimension = validate_embeddings(records)?;
        let Some(dimension) = dimension else {
            return Ok(0);
        };
        self.ensure_collection(dimension).await?;

        for batch in records.chunks(self.config.batch_size.max(1)) {
            let points = batch
                .iter()
                .map(to_index_record)
                .collect::<Result<Vec<_>>>()?;
            self.index.upsert(&self.config.collection, points).await?;
            self.stats.batches += 1;
        }
        self.stats.chunks += records.len();
        Ok(records.len())
    }

    /// Embed and upsert, one embedding batch at a time.
    pub async fn ingest_records(&mut self, records: Vec<ChunkRecord>) -> Result<usize> {
        let batch_size = self.embedding.batch_size.max(1).min(self.config.batch_size.max(1));
        let total = records.len();
        let mut pending = records.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<ChunkRecord> = pending.by_ref().take(batch_size).collect();
            let embedded = embed_batch(&self.embedder, batch).await?;
            // Every vector in the batch must share one length before anything is written.
            let Some(dimension) = validate_embeddings(&embedded)? else {
                continue;
            };
            self.ensure_collection(dimension).await?;

            let points = embedded
                .iter()
                .map(to_index_record)
                .collect::<Result<Vec<_>>>()?;
            self.index.upsert(&self.config.collection, points).await?;
            self.stats.batches += 1;
        }
        self.stats.chunks += total;
        Ok(total)
    }

    /// Ingest extracted documents in order; returns the accumulated statistics.
    pub async fn ingest_documents(&mut self, documents: Vec<DocumentChunks>) -> Result<IngestStats> {
        let started = Instant::now();
        for doc in documents {
            let count = self.ingest_records(doc.chunks).await?;
            log::info!("Ingested {} chunks from {}", count, doc.source_file);
            self.stats.documents += 1;
        }
        self.stats.elapsed_secs += started.elapsed().as_secs_f64();
        Ok(self.stats.clone())
    }
}

/// Embed one batch and attach the vectors; text and metadata are untouched.
pub async fn embed_batch<E: EmbeddingClient>(
    embedder: &E,
    batch: Vec<ChunkRecord>,
) -> Result<Vec<ChunkRecord>> {
    let inputs: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
    let vectors = check_count(embedder.embed(&inputs).await?, inputs.len())?;
    let model = embedder.model().to_string();
    Ok(batch
        .into_iter()
        .zip(vectors)
        .map(|(record, vector)| record.with_embedding(&model, vector))
        .collect())
}

/// Embed records in order, `batch_size` inputs per request.
pub async fn embed_in_batches<E: EmbeddingClient>(
    embedder: &E,
    records: Vec<ChunkRecord>,
    batch_size: usize,
) -> Result<Vec<ChunkRecord>> {
    let batch_size = batch_size.max(1);
    let mut out = Vec::with_capacity(records.len());
    let mut pending = records.into_iter().peekable();
    while pending.peek().is_some() {
        let batch: Vec<ChunkRecord> = pending.by_ref().take(batch_size).collect();
        out.extend(embed_batch(embedder, batch).await?);
    }
    Ok(out)
}

/// Common embedding length of `records`, or `None` when there are no records.
pub fn validate_embeddings(records: &[ChunkRecord]) -> Result<Option<usize>> {
    let mut dimension = None;
    for record in records {
        let len = match &record.embeddings {
            Some(v) if !v.is_empty() => v.len(),
            _ => {
                return Err(PdfragError::Schema(format!(
                    "record {} ({} chunk {}) has no embeddings",
                    record.id, record.metadata.source_file, record.metadata.chunk_index
                )));
            }
        };
        match dimension {
            None => dimension = Some(len),
            Some(expected) if expected != len => {
                return Err(PdfragError::Schema(format!(
                    "record {} has {} dimensions, expected {}",
                    record.id, len, expected
                )));
            }
            Some(_) => {}
        }
    }
    Ok(dimension)
}

fn to_index_record(record: &ChunkRecord) -> Result<IndexRecord> {
    let vector = record
        .embeddings
        .clone()
        .ok_or_else(|| PdfragError::Schema(format!("record {} has no embeddings", record.id)))?;
    Ok(IndexRecord {
        id: record.id.clone(),
        vector,
        payload: record.payload()?,
    })
}
