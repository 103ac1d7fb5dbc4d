//! Configuration for pdfrag-rs
//!
//! Every heuristic constant used by the structuring engine lives here as a
//! named field, so callers (and tests) can probe boundary values directly.

use crate::error::{PdfragError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Line/block grouping and header/footer detection
    pub layout: LayoutConfig,
    /// Heading scoring and level assignment
    pub headings: HeadingConfig,
    /// Chunk budget and overlap
    pub chunking: ChunkingConfig,
    /// Embedding service client
    pub embedding: EmbeddingConfig,
    /// Vector index client
    pub index: IndexConfig,
}

/// Layout analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// A vertical gap larger than this multiple of the body size starts a new block
    pub block_gap_ratio: f32,
    /// Spans whose tops differ by at most this many points share a line
    pub line_tolerance: f32,
    /// A font-size change of at least this many points between lines starts a new block
    pub size_break_delta: f32,
    /// Fraction of page height treated as header (top) or footer (bottom) band
    pub margin_ratio: f32,
    /// Fraction of pages a margin text must appear on to count as running furniture
    pub repeat_ratio: f32,
    /// Margin texts longer than this are never treated as furniture
    pub max_furniture_chars: usize,
    /// Minimum span length considered when estimating the body font size
    pub body_font_min_chars: usize,
    /// Body size used when a document has no sized spans at all
    pub default_body_size: f32,
    /// Whether repeating headers/footers are removed
    pub strip_furniture: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            block_gap_ratio: 0.9,
            line_tolerance: 2.0,
            size_break_delta: 1.0,
            margin_ratio: 0.08,
            repeat_ratio: 0.6,
            max_furniture_chars: 120,
            body_font_min_chars: 25,
            default_body_size: 10.0,
            strip_furniture: true,
        }
    }
}

/// Heading classifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingConfig {
    /// Score contribution per point of size above the body size
    pub size_weight: f32,
    pub bold_weight: f32,
    pub numbered_weight: f32,
    pub short_weight: f32,
    pub caps_weight: f32,
    /// Subtracted when the text ends with a period
    pub period_penalty: f32,
    /// Minimum score for a block to be a heading candidate
    pub min_score: f32,
    /// Word count at or below which a block "looks short"
    pub short_word_limit: usize,
    /// Blocks longer than this are always body text
    pub max_heading_chars: usize,
    /// Size delta for level 1
    pub level1_delta: f32,
    /// Size delta for level 2
    pub level2_delta: f32,
    /// Size delta for level 3 (requires bold or numbering)
    pub level3_delta: f32,
    /// Deepest level assigned from dotted numbering ("1.2.3")
    pub max_numbered_level: u8,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            size_weight: 1.35,
            bold_weight: 1.5,
            numbered_weight: 1.2,
            short_weight: 0.6,
            caps_weight: 0.6,
            period_penalty: 1.0,
            min_score: 2.2,
            short_word_limit: 14,
            max_heading_chars: 200,
            level1_delta: 4.0,
            level2_delta: 2.0,
            level3_delta: 1.0,
            max_numbered_level: 4,
        }
    }
}

/// Configuration for chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub max_chars: usize,
    /// Characters carried from the end of one chunk into the next
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1200,
            overlap_chars: 150,
        }
    }
}

impl ChunkingConfig {
    /// Reject budgets that cannot make progress.
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(PdfragError::Config("max_chars must be positive".to_string()));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(PdfragError::Config(format!(
                "overlap_chars ({}) must be smaller than max_chars ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Embedding service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Inputs per request
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "bge-m3".to_string(),
            batch_size: 64,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

/// Distance metric used by a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
    Euclid,
    Dot,
    Manhattan,
}

impl std::str::FromStr for DistanceMetric {
    type Err = PdfragError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclid" | "euclidean" => Ok(DistanceMetric::Euclid),
            "dot" => Ok(DistanceMetric::Dot),
            "manhattan" => Ok(DistanceMetric::Manhattan),
            other => Err(PdfragError::Config(format!("unknown distance metric: {}", other))),
        }
    }
}

/// Vector index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Destination collection
    pub collection: String,
    pub distance: DistanceMetric,
    /// Records per upsert call
    pub batch_size: usize,
    /// Drop and recreate the collection before the first upsert
    pub recreate: bool,
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "pdf_chunks".to_string(),
            distance: DistanceMetric::Cosine,
            batch_size: 256,
            recreate: false,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. Missing fields fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PdfragError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| PdfragError::Config(format!("invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every setting that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        let ratios = [
            ("layout.margin_ratio", self.layout.margin_ratio),
            ("layout.repeat_ratio", self.layout.repeat_ratio),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(PdfragError::Config(format!("{} must be within 0..=1, got {}", name, value)));
            }
        }
        if self.layout.default_body_size <= 0.0 {
            return Err(PdfragError::Config("layout.default_body_size must be positive".to_string()));
        }
        if self.embedding.batch_size == 0 {
            return Err(PdfragError::Config("embedding.batch_size must be positive".to_string()));
        }
        if self.index.batch_size == 0 {
            return Err(PdfragError::Config("index.batch_size must be positive".to_string()));
        }
        if self.index.collection.trim().is_empty() {
            return Err(PdfragError::Config("index.collection is required".to_string()));
        }
        Ok(())
    }
}
