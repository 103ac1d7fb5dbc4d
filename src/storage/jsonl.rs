//! Line-delimited JSON chunk files
//!
//! One [`ChunkRecord`] per line. This is the hand-off format between
//! extraction and upload, so reading back what was written must not lose
//! any field, including ones this crate does not know about.

use crate::error::{PdfragError, Result};
use crate::text::ChunkRecord;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Write records, one JSON object per line, replacing the file.
pub fn write_records<P: AsRef<Path>>(path: P, records: &[ChunkRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    log::debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read every record; a malformed line is a schema error naming the line.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<ChunkRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ChunkRecord = serde_json::from_str(&line).map_err(|e| {
            PdfragError::Schema(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::ChunkMetadata;
    use serde_json::{Map, json};
    use tempfile::TempDir;

    fn record(index: usize) -> ChunkRecord {
        ChunkRecord::new(
            format!("chunk {index}"),
            ChunkMetadata {
                source_file: "guide.pdf".to_string(),
                page: 1,
                chunk_index: index,
                section_path: Some("Intro > Setup".to_string()),
                font_size_avg: Some(10.5),
                is_bold: Some(false),
                extra: Map::new(),
            },
        )
    }

    #[test]
    fn test_write_then_read_preserves_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.jsonl");

        let mut with_unknown = record(1).with_embedding("bge-m3", vec![0.25, -1.5, 0.125]);
        with_unknown.extra.insert("reviewed".to_string(), json!(true));
        with_unknown.metadata.extra.insert("lang".to_string(), json!("de"));
        let records = vec![record(0), with_unknown];

        write_records(&path, &records).unwrap();
        let loaded = read_records(&path).unwrap();
        assert_eq!(loaded, records);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_malformed_line_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(
            &path,
            "{\"id\":\"a\",\"text\":\"t\",\"metadata\":{\"source_file\":\"x\",\"page\":1,\"chunk_index\":0}}\n\n{\"id\":\"b\"}\n",
        )
        .unwrap();

        match read_records(&path) {
            Err(PdfragError::Schema(msg)) => assert!(msg.contains(":3:"), "{msg}"),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_records(dir.path().join("missing.jsonl")),
            Err(PdfragError::Io(_))
        ));
    }
}
