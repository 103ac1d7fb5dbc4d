//! PdfExtractor - PDF to chunk extraction
//!
//! Reads documents through a [`PdfReader`], structures them and splits the
//! body text into chunks. Documents are independent, so a directory is
//! processed on the rayon pool; a document that cannot be read is logged
//! and skipped.

use crate::config::Config;
use crate::error::Result;
use crate::pdf::{PageSpans, PdfReader};
use crate::storage::write_records;
use crate::structure::{DocumentStructurer, Heading};
use crate::text::{ChunkRecord, ChunkSplitter};
use crate::utils::{ensure_directory, file_name, output_path};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Everything extracted from one PDF
#[derive(Debug, Clone)]
pub struct DocumentChunks {
    pub path: PathBuf,
    /// File name recorded as `source_file`
    pub source_file: String,
    pub page_count: usize,
    pub body_size: f32,
    pub headings: Vec<Heading>,
    pub chunks: Vec<ChunkRecord>,
}

/// Outcome of a multi-document run
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Successfully processed documents, in input order
    pub documents: Vec<DocumentChunks>,
    /// Documents that failed, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

impl ExtractionReport {
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|d| d.chunks.len()).sum()
    }
}

/// Main extractor for turning PDFs into chunk records
pub struct PdfExtractor<R: PdfReader> {
    reader: R,
    structurer: DocumentStructurer,
    splitter: ChunkSplitter,
}

impl<R: PdfReader> PdfExtractor<R> {
    /// Create an extractor; invalid chunking settings fail here, before any document is read.
    pub fn new(reader: R, config: &Config) -> Result<Self> {
        Ok(Self {
            reader,
            structurer: DocumentStructurer::new(config),
            splitter: ChunkSplitter::new(&config.chunking)?,
        })
    }

    /// Structure and chunk already-read pages.
    pub fn extract_pages(&self, pages: &[PageSpans], path: &Path) -> DocumentChunks {
        let source_file = file_name(path);
        let doc = self.structurer.structure(pages);
        let chunks = self.splitter.split(&doc.items, &source_file);
        DocumentChunks {
            path: path.to_path_buf(),
            headings: doc.headings(),
            page_count: doc.page_count,
            body_size: doc.body_size,
            source_file,
            chunks,
        }
    }

    pub fn extract_file<P: AsRef<Path>>(&self, path: P) -> Result<DocumentChunks> {
        let path = path.as_ref();
        let pages = self.reader.read_document(path)?;
        let extracted = self.extract_pages(&pages, path);
        log::info!(
            "{}: {} pages, {} headings, {} chunks",
            extracted.source_file,
            extracted.page_count,
            extracted.headings.len(),
            extracted.chunks.len()
        );
        Ok(extracted)
    }

    /// Extract many documents in parallel, keeping input order.
    pub fn extract_all(&self, paths: &[PathBuf]) -> ExtractionReport {
        let results: Vec<(PathBuf, Result<DocumentChunks>)> = paths
            .par_iter()
            .map(|path| (path.clone(), self.extract_file(path)))
            .collect();

        let mut report = ExtractionReport::default();
        for (path, result) in results {
            match result {
                Ok(doc) => report.documents.push(doc),
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    report.failures.push((path, e.to_string()));
                }
            }
        }
        report
    }

    /// Extract every PDF and write one `<stem>.jsonl` per document into `out_dir`.
    ///
    /// Documents without any chunk get no file.
    pub fn extract_to_dir<P: AsRef<Path>>(
        &self,
        paths: &[PathBuf],
        out_dir: P,
    ) -> Result<ExtractionReport> {
        let out_dir = out_dir.as_ref();
        ensure_directory(out_dir)?;
        let report = self.extract_all(paths);
        for doc in &report.documents {
            if doc.chunks.is_empty() {
                log::warn!("No text found in {}, nothing written", doc.source_file);
                continue;
            }
            write_records(output_path(out_dir, &doc.path, ".jsonl"), &doc.chunks)?;
        }
        Ok(report)
    }
}
