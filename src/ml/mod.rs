//! Embedding generation
//!
//! Vectors come from an external service behind the [`EmbeddingClient`]
//! trait; [`OllamaEmbedder`] is the bundled HTTP client.

pub mod embedding;

pub use embedding::{Embedding, EmbeddingClient, OllamaEmbedder, check_count};
