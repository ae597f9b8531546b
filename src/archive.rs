//! Archive Packaging
//!
//! Bundles a compiled batch into a zip: one PNG per certificate, in batch
//! order, followed by `manifest.json`.

use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::pipeline::CompiledBatch;

pub const MANIFEST_ENTRY: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Write `batch` as a zip archive to `writer`.
pub fn write_archive<W: Write + Seek>(batch: &CompiledBatch, writer: W) -> Result<W, ArchiveError> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut seen = HashSet::new();
    for entry in &batch.entries {
        if !seen.insert(entry.filename.as_str()) || entry.filename == MANIFEST_ENTRY {
            return Err(ArchiveError::DuplicateEntry(entry.filename.clone()));
        }
        zip.start_file(entry.filename.as_str(), options)?;
        zip.write_all(&entry.png)?;
    }

    zip.start_file(MANIFEST_ENTRY, options)?;
    zip.write_all(serde_json::to_string_pretty(batch)?.as_bytes())?;

    tracing::info!(entries = batch.entries.len(), "archive written");
    Ok(zip.finish()?)
}

/// The archive as an in-memory byte vector.
pub fn archive_bytes(batch: &CompiledBatch) -> Result<Vec<u8>, ArchiveError> {
    Ok(write_archive(batch, Cursor::new(Vec::new()))?.into_inner())
}
