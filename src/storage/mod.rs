//! Storage: chunk files on disk and the external vector index

pub mod index;
pub mod jsonl;
pub mod qdrant;

// Re-export main types
pub use index::{FieldMatch, IndexRecord, PayloadFilter, SearchHit, SearchRequest, VectorIndex};
pub use jsonl::{read_records, write_records};
pub use qdrant::QdrantIndex;

/// Ingestion statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    /// Documents that produced chunks
    pub documents: usize,

    /// Total number of chunks written
    pub chunks: usize,

    /// Embedding/upsert batches sent
    pub batches: usize,

    /// Documents skipped because they could not be read
    pub skipped: usize,

    /// Total processing time in seconds
    pub elapsed_secs: f64,
}
