//! Chunk splitting and the persisted chunk schema
//!
//! The splitter walks a structured document in reading order and packs body
//! blocks into chunks bounded by `max_chars`. Headings and section changes
//! are hard boundaries; budget and page flushes carry `overlap_chars` of
//! trailing text into the next chunk.

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::structure::{BodyBlock, DocItem};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

const BLOCK_SEPARATOR: &str = "\n\n";

/// Citation metadata of a chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// File name of the source PDF
    pub source_file: String,

    /// 1-based page the chunk was read from
    pub page: u32,

    /// Position of the chunk within its document, starting at 0
    pub chunk_index: usize,

    /// Active headings, `"Module 1 > Step 2"`
    #[serde(default, alias = "section", skip_serializing_if = "Option::is_none")]
    pub section_path: Option<String>,

    /// Length-weighted average font size of the chunk's blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size_avg: Option<f32>,

    /// Whether every block in the chunk was bold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bold: Option<bool>,

    /// Fields written by other tools, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One line of a chunk JSONL file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<Vec<f32>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkRecord {
    /// Build a record with a fresh random id.
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            metadata,
            embedding_model: None,
            embeddings: None,
            extra: Map::new(),
        }
    }

    /// Attach an embedding; text and metadata stay as they are.
    pub fn with_embedding(mut self, model: &str, vector: Vec<f32>) -> Self {
        self.embedding_model = Some(model.to_string());
        self.embeddings = Some(vector);
        self
    }

    /// Index payload: the metadata fields plus `text` and the embedding model.
    pub fn payload(&self) -> Result<Value> {
        let mut payload = match serde_json::to_value(&self.metadata)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        payload.insert("text".to_string(), Value::String(self.text.clone()));
        if let Some(model) = &self.embedding_model {
            payload.insert("embedding_model".to_string(), Value::String(model.clone()));
        }
        Ok(Value::Object(payload))
    }
}

/// Text being packed into the next chunk
#[derive(Debug, Default)]
struct Accumulator {
    text: String,
    chars: usize,
    page: u32,
    section_path: Option<String>,
    size_sum: f32,
    size_chars: usize,
    bold: bool,
    /// Holds text beyond the overlap seed
    fresh: bool,
}

impl Accumulator {
    fn seeded(seed: String) -> Self {
        Self {
            chars: seed.chars().count(),
            text: seed,
            bold: true,
            ..Default::default()
        }
    }

    fn joined_len(&self, block_chars: usize) -> usize {
        if self.text.is_empty() {
            block_chars
        } else {
            self.chars + BLOCK_SEPARATOR.len() + block_chars
        }
    }

    /// Shorten an overlap seed so a block of `block_chars` still fits in `max_chars`.
    fn trim_seed(&mut self, max_chars: usize, block_chars: usize) {
        if self.joined_len(block_chars) <= max_chars {
            return;
        }
        let room = max_chars.saturating_sub(BLOCK_SEPARATOR.len() + block_chars);
        self.text = tail_chars(&self.text, room).to_string();
        self.chars = self.text.chars().count();
    }

    fn adopt(&mut self, block: &BodyBlock) {
        self.page = block.page;
        self.section_path = block.section_path.clone();
    }

    fn record_style(&mut self, block: &BodyBlock, chars: usize) {
        if block.size > 0.0 {
            self.size_sum += block.size * chars as f32;
            self.size_chars += chars;
        }
        self.bold &= block.bold;
        self.fresh = true;
    }

    fn append(&mut self, text: &str) {
        if !self.text.is_empty() {
            self.text.push_str(BLOCK_SEPARATOR);
        }
        self.text.push_str(text);
        self.chars = self.text.chars().count();
    }

    fn font_size_avg(&self) -> Option<f32> {
        (self.size_chars > 0)
            .then(|| (self.size_sum / self.size_chars as f32 * 100.0).round() / 100.0)
    }
}

/// Emission state for one document
struct SplitState<'a> {
    source_file: &'a str,
    acc: Accumulator,
    chunks: Vec<ChunkRecord>,
}

impl<'a> SplitState<'a> {
    fn new(source_file: &'a str) -> Self {
        Self {
            source_file,
            acc: Accumulator::seeded(String::new()),
            chunks: Vec::new(),
        }
    }

    fn emit(&mut self, text: String) {
        let metadata = ChunkMetadata {
            source_file: self.source_file.to_string(),
            page: self.acc.page,
            chunk_index: self.chunks.len(),
            section_path: self.acc.section_path.clone(),
            font_size_avg: self.acc.font_size_avg(),
            is_bold: Some(self.acc.bold),
            extra: Map::new(),
        };
        self.chunks.push(ChunkRecord::new(text, metadata));
    }

    /// Emit the accumulator if it holds new text, then reseed it with the
    /// trailing `carry` characters.
    fn flush(&mut self, carry: usize) {
        if !self.acc.fresh || self.acc.text.trim().is_empty() {
            self.acc = Accumulator::seeded(String::new());
            return;
        }
        let text = std::mem::take(&mut self.acc.text);
        let seed = tail_chars(&text, carry).to_string();
        self.emit(text);
        self.acc = Accumulator::seeded(seed);
    }
}

/// Packs structured body text into bounded, overlapping chunks
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    max_chars: usize,
    overlap_chars: usize,
}

impl ChunkSplitter {
    /// Create a splitter; an overlap that is not smaller than the budget is rejected.
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_chars: config.max_chars,
            overlap_chars: config.overlap_chars,
        })
    }

    /// Split one document's structured stream into chunks.
    ///
    /// `chunk_index` runs from 0 without gaps, in reading order.
    pub fn split(&self, items: &[DocItem], source_file: &str) -> Vec<ChunkRecord> {
        let mut state = SplitState::new(source_file);
        for item in items {
            match item {
                DocItem::Heading(_) => state.flush(0),
                DocItem::Body(block) => self.push_block(&mut state, block),
            }
        }
        state.flush(0);
        state.chunks
    }

    fn push_block(&self, state: &mut SplitState<'_>, block: &BodyBlock) {
        let text = block.text.trim();
        if text.is_empty() {
            return;
        }

        if state.acc.fresh {
            if state.acc.section_path != block.section_path {
                state.flush(0);
            } else if state.acc.page != block.page {
                state.flush(self.overlap_chars);
            }
        }
        if !state.acc.fresh {
            state.acc.adopt(block);
        }

        let block_chars = text.chars().count();
        if state.acc.joined_len(block_chars) > self.max_chars && state.acc.fresh {
            state.flush(self.overlap_chars);
            state.acc.adopt(block);
        }
        if !state.acc.fresh && block_chars <= self.max_chars {
            // A block that fits on its own is never cut for the sake of overlap.
            state.acc.trim_seed(self.max_chars, block_chars);
        }

        state.acc.record_style(block, block_chars);
        if state.acc.joined_len(block_chars) <= self.max_chars {
            state.acc.append(text);
            return;
        }

        // Too large even on its own: cut fixed windows that overlap by
        // `overlap_chars`, keeping the remainder open for following blocks.
        state.acc.append(text);
        let chars: Vec<char> = state.acc.text.chars().collect();
        let step = self.max_chars - self.overlap_chars;
        let mut start = 0;
        while start + self.max_chars < chars.len() {
            let window: String = chars[start..start + self.max_chars].iter().collect();
            state.emit(window);
            start += step;
        }
        state.acc.text = chars[start..].iter().collect();
        state.acc.chars = chars.len() - start;
    }
}

/// The last `n` characters of `text`.
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    let (offset, _) = text
        .char_indices()
        .nth(count - n)
        .unwrap_or((0, ' '));
    &text[offset..]
}
