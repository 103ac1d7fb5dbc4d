//! Outline export
//!
//! Writes `<stem>.outline.json` and `<stem>.outline.md` per PDF plus the
//! combined `ALL.outlines.json` and `ALL.outlines.md`.

use crate::api::extractor::{DocumentChunks, PdfExtractor};
use crate::error::Result;
use crate::pdf::PdfReader;
use crate::structure::build_outline;
use crate::utils::{ensure_directory, output_path};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

pub const COMBINED_JSON: &str = "ALL.outlines.json";
pub const COMBINED_MARKDOWN: &str = "ALL.outlines.md";

/// Rendered outline of one document
#[derive(Debug, Clone)]
pub struct DocumentOutline {
    pub json: Value,
    pub markdown: String,
    pub headings_count: usize,
}

/// Summary of an outline run
#[derive(Debug, Default)]
pub struct OutlineReport {
    pub documents: usize,
    pub headings: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Build the JSON and markdown renderings for one extracted document.
pub fn render_outline(doc: &DocumentChunks, min_score: f32) -> DocumentOutline {
    let tree = build_outline(&doc.headings);
    DocumentOutline {
        json: json!({
            "pdf": doc.source_file,
            "path": doc.path.display().to_string(),
            "min_score": (min_score as f64 * 100.0).round() / 100.0,
            "headings_count": doc.headings.len(),
            "outline": tree.to_slim_json(),
        }),
        markdown: tree.to_markdown(),
        headings_count: doc.headings.len(),
    }
}

/// Extract headings from every PDF and write per-file and combined outlines.
pub fn write_outlines<R: PdfReader, P: AsRef<Path>>(
    extractor: &PdfExtractor<R>,
    pdfs: &[PathBuf],
    out_dir: P,
    min_score: f32,
) -> Result<OutlineReport> {
    let out_dir = out_dir.as_ref();
    ensure_directory(out_dir)?;

    let extraction = extractor.extract_all(pdfs);
    let mut report = OutlineReport {
        failures: extraction.failures,
        ..Default::default()
    };
    let mut combined_json = Vec::new();
    let mut combined_md = Vec::new();

    for doc in &extraction.documents {
        let outline = render_outline(doc, min_score);
        std::fs::write(
            output_path(out_dir, &doc.path, ".outline.json"),
            serde_json::to_string_pretty(&outline.json)?,
        )?;
        std::fs::write(output_path(out_dir, &doc.path, ".outline.md"), &outline.markdown)?;
        log::info!("{}: {} headings", doc.source_file, outline.headings_count);

        combined_md.push(format!("# {}", doc.source_file));
        combined_md.push(outline.markdown);
        combined_md.push(String::new());
        combined_json.push(outline.json);

        report.documents += 1;
        report.headings += outline.headings_count;
    }

    std::fs::write(
        out_dir.join(COMBINED_MARKDOWN),
        format!("{}\n", combined_md.join("\n").trim()),
    )?;
    std::fs::write(
        out_dir.join(COMBINED_JSON),
        serde_json::to_string_pretty(&json!({ "pdfs": combined_json }))?,
    )?;
    Ok(report)
}
