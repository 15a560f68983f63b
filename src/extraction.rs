//! Plain-text page extraction.
//!
//! Pages are separated by form feeds (`\u{000C}`), the convention used by `pdftotext` and
//! similar converters. Text inside each page is passed through unchanged; normalization belongs
//! to the processing pipeline.
//!
//! [`discover_documents`] walks a directory of `.txt` papers. Each paper may carry its own
//! metadata in a sidecar `<stem>.meta.json` holding any of `author`, `year` and `title`.

use crate::processing::{IngestionError, ManualOverrides, Page};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Page separator emitted by text converters.
pub const PAGE_SEPARATOR: char = '\u{000C}';

/// Extension of the text papers picked up by [`discover_documents`].
pub const TEXT_EXTENSION: &str = "txt";

/// Suffix replacing `.txt` in a paper's metadata sidecar.
pub const METADATA_SUFFIX: &str = ".meta.json";

/// A paper found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Location of the text file.
    pub path: PathBuf,
    /// Path relative to the scanned directory with `/` separators, used as the source identifier.
    pub source_file: String,
    /// Metadata read from the paper's sidecar, if it has one.
    pub overrides: Option<ManualOverrides>,
}

/// Split already decoded text into pages.
pub fn pages_from_text(text: &str) -> Vec<Page> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(PAGE_SEPARATOR)
        .enumerate()
        .map(|(index, raw)| Page::new(index, raw))
        .collect()
}

/// Decode raw bytes as UTF-8 and split them into pages.
pub fn pages_from_bytes(source_file: &str, bytes: &[u8]) -> Result<Vec<Page>, IngestionError> {
    let text = std::str::from_utf8(bytes).map_err(|error| IngestionError::Unreadable {
        source_file: source_file.to_string(),
        reason: error.to_string(),
    })?;
    Ok(pages_from_text(text))
}

/// Read a text file and split it into pages.
pub async fn read_pages(path: &Path) -> Result<Vec<Page>, IngestionError> {
    let source_file = source_name(path);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|error| IngestionError::Unreadable {
            source_file: source_file.clone(),
            reason: error.to_string(),
        })?;
    pages_from_bytes(&source_file, &bytes)
}

/// Filename used as the document's source identifier.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Path of the metadata sidecar for the paper at `path`.
pub fn metadata_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{METADATA_SUFFIX}"))
}

/// Read the metadata sidecar of the paper at `path`. A missing sidecar yields `None`.
pub async fn read_overrides(path: &Path) -> Result<Option<ManualOverrides>, IngestionError> {
    let sidecar = metadata_path(path);
    let unreadable = |reason: String| IngestionError::Unreadable {
        source_file: source_name(&sidecar),
        reason,
    };
    if !tokio::fs::try_exists(&sidecar)
        .await
        .map_err(|error| unreadable(error.to_string()))?
    {
        return Ok(None);
    }
    let bytes = tokio::fs::read(&sidecar)
        .await
        .map_err(|error| unreadable(error.to_string()))?;
    let overrides: ManualOverrides =
        serde_json::from_slice(&bytes).map_err(|error| unreadable(error.to_string()))?;
    Ok(Some(overrides))
}

/// Every `.txt` paper under `dir`, sorted by source identifier, with its own metadata.
///
/// Source identifiers keep the relative directory, so `a/paper.txt` and `b/paper.txt` stay
/// distinct documents.
pub async fn discover_documents(dir: &Path) -> Result<Vec<SourceDocument>, IngestionError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        match entry {
            Ok(entry)
                if entry.file_type().is_file()
                    && entry
                        .path()
                        .extension()
                        .is_some_and(|ext| ext == TEXT_EXTENSION) =>
            {
                paths.push(entry.into_path());
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(dir = %dir.display(), error = %error, "Skipping unreadable entry");
            }
        }
    }

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let source_file = relative_source(dir, &path);
        let overrides = read_overrides(&path).await?;
        documents.push(SourceDocument {
            path,
            source_file,
            overrides,
        });
    }
    documents.sort_by(|a, b| a.source_file.cmp(&b.source_file));
    Ok(documents)
}

fn relative_source(dir: &Path, path: &Path) -> String {
    let parts: Vec<String> = path
        .strip_prefix(dir)
        .map(|relative| {
            relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    if parts.is_empty() {
        source_name(path)
    } else {
        parts.join("/")
    }
}
