//! PDF text extraction via pdfium.
//!
//! ## Binding
//!
//! pdfium is loaded at runtime, never linked. [`load_pdfium`] looks in order
//! at `PDFIUM_LIB_PATH`, the directory holding the running executable, and
//! the system library path. Every call binds afresh: the OS caches the
//! `dlopen`, and a `Pdfium` handle never has to cross threads.
//!
//! All functions here block. Callers run them inside `spawn_blocking`.

use crate::error::Doc2SpeechError;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a pdfium library file, or the directory
/// holding it.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// A directory resolves to the platform library name inside it.
fn library_path(value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

/// Bind to a pdfium shared library.
pub fn load_pdfium() -> Result<Pdfium, Doc2SpeechError> {
    if let Ok(value) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let path = library_path(&value);
        debug!(path = %path.display(), "Binding pdfium from {}", PDFIUM_LIB_PATH_ENV);
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            Doc2SpeechError::PdfiumBindingFailed(format!("{}: {e:?}", path.display()))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let lib = Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib) {
                debug!(dir = %dir.display(), "Bound pdfium next to executable");
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| Doc2SpeechError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Whether a pdfium library can be bound in this environment.
pub fn pdfium_available() -> bool {
    load_pdfium().is_ok()
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Doc2SpeechError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.contains("Password") || detail.contains("password") {
            if password.is_some() {
                Doc2SpeechError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                Doc2SpeechError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            Doc2SpeechError::CorruptPdf {
                path: path.to_path_buf(),
                detail,
            }
        }
    })
}

/// Text of every page, in page order. Image-only pages yield `""`.
///
/// The first page whose text layer cannot be read fails the whole call.
pub fn page_texts(path: &Path, password: Option<&str>) -> Result<Vec<String>, Doc2SpeechError> {
    let pdfium = load_pdfium()?;
    let document = open_document(&pdfium, path, password)?;
    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| Doc2SpeechError::Extraction {
            path: path.to_path_buf(),
            page: Some(idx + 1),
            detail: format!("{e:?}"),
        })?;
        let content = text.all();
        debug!("Page {} → {} chars", idx + 1, content.chars().count());
        texts.push(content);
    }
    Ok(texts)
}

/// Document-level facts shown by `inspect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfInfo {
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub pdf_version: String,
}

/// Read page count and metadata without extracting text.
pub fn pdf_info(path: &Path, password: Option<&str>) -> Result<PdfInfo, Doc2SpeechError> {
    let pdfium = load_pdfium()?;
    let document = open_document(&pdfium, path, password)?;
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(PdfInfo {
        page_count: document.pages().len() as usize,
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        pdf_version: format!("{:?}", document.version()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lib_path_directory_gets_platform_name() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = library_path(dir.path().to_str().unwrap());
        assert_eq!(resolved.parent(), Some(dir.path()));
        assert_eq!(
            resolved.file_name(),
            Some(Pdfium::pdfium_platform_library_name().as_os_str())
        );
    }

    #[test]
    fn lib_path_file_is_used_as_given() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("custom-pdfium.so");
        std::fs::write(&lib, b"").unwrap();
        assert_eq!(library_path(lib.to_str().unwrap()), lib);
        assert_eq!(
            library_path("/no/such/libpdfium.so"),
            PathBuf::from("/no/such/libpdfium.so")
        );
    }
}
