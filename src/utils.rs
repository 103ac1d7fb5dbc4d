//! Utility functions for pdfrag-rs
//!
//! Directory scanning and output path helpers shared by the CLI modes.

use crate::error::{PdfragError, Result};
use std::path::{Path, PathBuf};

/// Get file extension from path
pub fn get_file_extension<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Files in `dir` (not recursive) with the given extension, sorted by path.
pub fn list_files_with_extension<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(PdfragError::Config(format!(
            "input directory not found: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && get_file_extension(&path).as_deref() == Some(extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Every `*.pdf` in `dir`; an empty result is a configuration error.
pub fn list_pdfs<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let pdfs = list_files_with_extension(dir, "pdf")?;
    if pdfs.is_empty() {
        return Err(PdfragError::Config(format!(
            "no PDF files found in {}",
            dir.display()
        )));
    }
    Ok(pdfs)
}

/// Create directory if it doesn't exist
pub fn ensure_directory<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    Ok(())
}

/// File name component as a string, used as `source_file` in chunk metadata.
pub fn file_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `out_dir/<input stem><suffix>`, e.g. `out/guide.outline.json`.
pub fn output_path<P: AsRef<Path>, Q: AsRef<Path>>(out_dir: P, input: Q, suffix: &str) -> PathBuf {
    let stem = input
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    out_dir.as_ref().join(format!("{}{}", stem, suffix))
}
