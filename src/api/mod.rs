//! API layer for pdfrag-rs
//!
//! High-level entry points: extraction to chunks, ingestion into a vector
//! index, retrieval, and outline export.

pub mod extractor;
pub mod ingest;
pub mod outline;
pub mod retriever;

// Re-export main API types
pub use extractor::{DocumentChunks, ExtractionReport, PdfExtractor};
pub use ingest::{IngestionPipeline, embed_in_batches, validate_embeddings};
pub use outline::{DocumentOutline, OutlineReport, render_outline, write_outlines};
pub use retriever::{Retriever, SearchResult};
