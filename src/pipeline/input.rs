//! Input resolution: turn a stored file path into a [`Document`].
//!
//! The format is decided from the declared extension only. Content is never
//! sniffed: a `.txt` holding PDF bytes is still a text document. Resolution
//! also checks the file can be opened so the extractor fails with a precise
//! error before any parsing starts.

use crate::error::Doc2SpeechError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions accepted by default, lowercase.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 3] = ["txt", "pdf", "docx"];

/// Declared format of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// UTF-8 plain text (`.txt`).
    Text,
    /// Portable Document Format (`.pdf`).
    Pdf,
    /// Office Open XML word-processor document (`.docx`).
    WordProcessor,
}

impl DocumentFormat {
    /// Map an extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Result<Self, Doc2SpeechError> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Ok(DocumentFormat::Text),
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::WordProcessor),
            _ => Err(Doc2SpeechError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }

    /// Format of a file name, taken from the text after its last `.`.
    pub fn from_path(path: &Path) -> Result<Self, Doc2SpeechError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match extension_of(&name) {
            Some(ext) => Self::from_extension(ext),
            None => Err(Doc2SpeechError::UnsupportedFormat {
                extension: String::new(),
            }),
        }
    }

    /// Canonical extension, lowercase.
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Text => "txt",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::WordProcessor => "docx",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A stored file plus its declared format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub format: DocumentFormat,
}

impl Document {
    /// Build a document from a path without touching the file system.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, Doc2SpeechError> {
        let path = path.into();
        let format = DocumentFormat::from_path(&path)?;
        Ok(Self { path, format })
    }
}

/// The part of `filename` after its last `.`, if there is one.
pub fn extension_of(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext)
}

/// Whether `filename` carries one of the `allowed` extensions
/// (case-insensitive, after the last `.`).
pub fn allowed_file<S: AsRef<str>>(filename: &str, allowed: &[S]) -> bool {
    match extension_of(filename) {
        Some(ext) => allowed
            .iter()
            .any(|a| a.as_ref().eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Resolve a path to a readable [`Document`].
///
/// The format is checked first so an unsupported upload is rejected before
/// the file is even opened.
pub fn resolve_document(path: impl AsRef<Path>) -> Result<Document, Doc2SpeechError> {
    let path = path.as_ref().to_path_buf();
    let format = DocumentFormat::from_path(&path)?;

    if !path.exists() {
        return Err(Doc2SpeechError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Doc2SpeechError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Doc2SpeechError::FileNotFound { path });
        }
    }

    debug!("Resolved {} document: {}", format, path.display());
    Ok(Document { path, format })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(
            DocumentFormat::from_extension("Docx").unwrap(),
            DocumentFormat::WordProcessor
        );
        assert_eq!(DocumentFormat::from_extension("txt").unwrap(), DocumentFormat::Text);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        match DocumentFormat::from_extension("jpg") {
            Err(Doc2SpeechError::UnsupportedFormat { extension }) => assert_eq!(extension, "jpg"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn only_last_extension_counts() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("archive.pdf.txt")).unwrap(),
            DocumentFormat::Text
        );
        assert!(DocumentFormat::from_path(Path::new("notes.txt.exe")).is_err());
        assert!(DocumentFormat::from_path(Path::new("README")).is_err());
    }

    #[test]
    fn allowed_file_checks_last_extension() {
        let allowed = DEFAULT_ALLOWED_EXTENSIONS;
        assert!(allowed_file("paper.PDF", &allowed));
        assert!(allowed_file("a.b.docx", &allowed));
        assert!(!allowed_file("photo.jpg", &allowed));
        assert!(!allowed_file("txt", &allowed));
        assert!(!allowed_file("", &allowed));
    }

    #[test]
    fn resolve_rejects_format_before_existence() {
        let err = resolve_document("/definitely/not/here.jpg").unwrap_err();
        assert!(matches!(err, Doc2SpeechError::UnsupportedFormat { .. }));
    }

    #[test]
    fn resolve_missing_file() {
        let err = resolve_document("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, Doc2SpeechError::FileNotFound { .. }));
    }

    #[test]
    fn resolve_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.TXT");
        std::fs::write(&path, "hello").unwrap();
        let doc = resolve_document(&path).unwrap();
        assert_eq!(doc.format, DocumentFormat::Text);
        assert_eq!(doc.path, path);
    }
}
