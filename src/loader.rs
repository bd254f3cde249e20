//! Document loading: the [`DocumentLoader`] trait and a plain-text
//! implementation.
//!
//! Text extraction is a collaborator of the pipeline, not part of it. The
//! bundled [`PlainTextLoader`] handles `.txt` files; a PDF-capable loader is
//! expected to implement the same trait. The extension gate is shared:
//! anything outside `{.pdf, .txt}` is rejected with
//! [`RagError::UnsupportedFormat`] before a loader is consulted.

use std::path::Path;

use tracing::{error, info};

use crate::document::Document;
use crate::error::{RagError, Result};

/// File extensions the pipeline accepts, lowercased, including the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".pdf", ".txt"];

/// A source of extracted document text.
///
/// Implementations turn one file into a sequence of [`Document`]s (one per
/// page or section) tagged with the file's source name.
pub trait DocumentLoader: Send + Sync {
    /// Load a file into one or more documents.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnsupportedFormat`] for extensions the loader
    /// cannot handle, or [`RagError::Io`] if reading fails.
    fn load(&self, path: &Path) -> Result<Vec<Document>>;
}

/// Lowercased extension of a path, including the dot. Empty if there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Whether the path's extension is in [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension_of(path).as_str())
}

/// Basic information about a candidate file, used for diagnostics and UI
/// display before ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    /// File name without directory components.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Lowercased extension including the dot.
    pub extension: String,
    /// Whether the extension is in the supported set.
    pub supported: bool,
}

/// Stat a file and report its name, size, and whether it can be ingested.
///
/// # Errors
///
/// Returns [`RagError::Io`] if the file cannot be stat'ed.
pub fn file_info(path: &Path) -> Result<FileInfo> {
    let metadata = std::fs::metadata(path)?;
    Ok(FileInfo {
        name: path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string(),
        size: metadata.len(),
        extension: extension_of(path),
        supported: is_supported(path),
    })
}

/// A [`DocumentLoader`] for plain-text files.
///
/// Reads the whole file as UTF-8 and returns it as a single [`Document`]
/// whose source is the file name. Rejects every other extension, including
/// `.pdf` — PDF extraction needs a dedicated loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextLoader;

impl DocumentLoader for PlainTextLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let extension = extension_of(path);
        if extension != ".txt" {
            error!(path = %path.display(), %extension, "cannot load file");
            return Err(RagError::UnsupportedFormat { extension });
        }

        let text = std::fs::read_to_string(path)?;
        let source = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown").to_string();
        info!(path = %path.display(), bytes = text.len(), "loaded document");

        Ok(vec![
            Document::new(text, source).with_file_path(path.to_string_lossy().into_owned()),
        ])
    }
}
