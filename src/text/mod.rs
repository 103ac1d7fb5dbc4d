//! Text normalization, chunk splitting and the chunk record schema

pub mod chunking;
pub mod normalize;

pub use chunking::{ChunkMetadata, ChunkRecord, ChunkSplitter};
pub use normalize::{collapse_whitespace, normalize_text};
