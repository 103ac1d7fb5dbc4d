//! Error types for pdfrag-rs
//!
//! This module provides error handling for all pdfrag operations,
//! including PDF reading, document structuring, embedding and index writes.

use thiserror::Error;

/// Main error type for pdfrag operations
#[derive(Error, Debug)]
pub enum PdfragError {
    /// PDF reading errors
    #[error("PDF processing error: {0}")]
    Pdf(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding service errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index errors
    #[error("Index error: {0}")]
    Index(String),

    /// Persisted record does not match the expected schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(String),
}

/// Result type alias for pdfrag operations
pub type Result<T> = std::result::Result<T, PdfragError>;

impl From<lopdf::Error> for PdfragError {
    fn from(err: lopdf::Error) -> Self {
        PdfragError::Pdf(err.to_string())
    }
}

impl From<anyhow::Error> for PdfragError {
    fn from(err: anyhow::Error) -> Self {
        PdfragError::Generic(err.to_string())
    }
}
