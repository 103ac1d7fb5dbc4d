//! # pdfrag-rs
//!
//! Structure-aware PDF chunking for retrieval-augmented generation. Text is
//! extracted with font and position metadata, headings are inferred from
//! typography and numbering, and body text is packed into bounded,
//! overlapping chunks stamped with their section path. Chunks can be
//! embedded and upserted into a vector index.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfrag_rs::{Config, IngestionPipeline, LopdfReader, OllamaEmbedder, PdfExtractor, QdrantIndex};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     // Chunk a PDF
//!     let extractor = PdfExtractor::new(LopdfReader::new(), &config)?;
//!     let doc = extractor.extract_file("manual.pdf")?;
//!     println!("{} chunks, {} headings", doc.chunks.len(), doc.headings.len());
//!
//!     // Embed and index the chunks
//!     let embedder = OllamaEmbedder::new(&config.embedding)?;
//!     let index = QdrantIndex::new(&config.index)?;
//!     let mut pipeline = IngestionPipeline::new(embedder, index, &config);
//!     let stats = pipeline.ingest_documents(vec![doc]).await?;
//!     println!("Indexed {} chunks in {} batches", stats.chunks, stats.batches);
//!
//!     Ok(())
//! }
//! ```

// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod layout;
pub mod ml;
pub mod pdf;
pub mod storage;
pub mod structure;
pub mod text;
pub mod utils;

// Re-export main API types
pub use api::{IngestionPipeline, PdfExtractor, Retriever, SearchResult};
pub use config::Config;
pub use error::{PdfragError, Result};

// Re-export commonly used types
pub use ml::{EmbeddingClient, OllamaEmbedder};
pub use pdf::{LopdfReader, PdfReader};
pub use storage::{IngestStats, QdrantIndex, VectorIndex};
pub use structure::{Heading, HeadingNode};
pub use text::{ChunkMetadata, ChunkRecord};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_imports() {
        // Ensure all major types can be imported
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(PdfExtractor::new(LopdfReader::new(), &config).is_ok());
    }
}
