//! Document extraction: one stored file in, one plain-text string out.
//!
//! | Format | Unit | Join |
//! |--------|------|------|
//! | text | whole file, decoded as UTF-8 | n/a |
//! | pdf | page text layer | single space |
//! | docx | top-level body paragraph | single space |
//!
//! Units are joined as-is: empty pages and empty paragraphs still contribute
//! their (empty) string, so two empty paragraphs in a row produce two spaces.
//! The result is never trimmed.
//!
//! pdfium and docx parsing are CPU-bound and blocking, so [`extract`] moves
//! them to `spawn_blocking`.

use crate::error::Doc2SpeechError;
use crate::pipeline::input::{Document, DocumentFormat};
use crate::pipeline::pdf;
use std::path::Path;
use tracing::{debug, info};

/// Separator placed between pages and between paragraphs.
pub const UNIT_SEPARATOR: &str = " ";

/// Join extracted units in source order.
pub fn join_units<I, S>(units: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, unit) in units.into_iter().enumerate() {
        if i > 0 {
            out.push_str(UNIT_SEPARATOR);
        }
        out.push_str(unit.as_ref());
    }
    out
}

/// Extract the text of `document`.
///
/// `password` is only consulted for PDFs.
pub async fn extract(document: &Document, password: Option<&str>) -> Result<String, Doc2SpeechError> {
    let path = document.path.clone();
    let format = document.format;
    let password = password.map(str::to_string);

    let text = match format {
        DocumentFormat::Text => extract_text(&path).await?,
        DocumentFormat::Pdf => tokio::task::spawn_blocking(move || {
            extract_pdf_blocking(&path, password.as_deref())
        })
        .await
        .map_err(|e| Doc2SpeechError::Internal(format!("PDF extraction task panicked: {e}")))??,
        DocumentFormat::WordProcessor => {
            tokio::task::spawn_blocking(move || extract_docx_blocking(&path))
                .await
                .map_err(|e| {
                    Doc2SpeechError::Internal(format!("DOCX extraction task panicked: {e}"))
                })??
        }
    };

    info!(
        "Extracted {} chars from {} document {}",
        text.chars().count(),
        format,
        document.path.display()
    );
    Ok(text)
}

fn read_failed(path: &Path, e: std::io::Error) -> Doc2SpeechError {
    match e.kind() {
        std::io::ErrorKind::NotFound => Doc2SpeechError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => Doc2SpeechError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Doc2SpeechError::Extraction {
            path: path.to_path_buf(),
            page: None,
            detail: e.to_string(),
        },
    }
}

async fn extract_text(path: &Path) -> Result<String, Doc2SpeechError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| read_failed(path, e))?;
    String::from_utf8(bytes).map_err(|e| Doc2SpeechError::Extraction {
        path: path.to_path_buf(),
        page: None,
        detail: format!("not valid UTF-8: {e}"),
    })
}

/// Blocking PDF extraction: page texts joined by [`UNIT_SEPARATOR`].
pub fn extract_pdf_blocking(path: &Path, password: Option<&str>) -> Result<String, Doc2SpeechError> {
    let pages = pdf::page_texts(path, password)?;
    Ok(join_units(pages))
}

/// Blocking DOCX extraction: paragraph texts joined by [`UNIT_SEPARATOR`].
pub fn extract_docx_blocking(path: &Path) -> Result<String, Doc2SpeechError> {
    let bytes = std::fs::read(path).map_err(|e| read_failed(path, e))?;
    let paragraphs = docx_paragraphs(&bytes).map_err(|detail| Doc2SpeechError::Extraction {
        path: path.to_path_buf(),
        page: None,
        detail,
    })?;
    debug!("DOCX {} → {} paragraphs", path.display(), paragraphs.len());
    Ok(join_units(paragraphs))
}

/// Text of each top-level body paragraph of a `.docx` package.
///
/// Tables, headers and footers are not part of the body paragraph list.
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, String> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| format!("Failed to parse DOCX: {e}"))?;
    Ok(docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            docx_rs::DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .collect())
}

fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut out = String::new();
    for child in &para.children {
        match child {
            docx_rs::ParagraphChild::Run(run) => push_run(run, &mut out),
            docx_rs::ParagraphChild::Hyperlink(link) => {
                for inner in &link.children {
                    if let docx_rs::ParagraphChild::Run(run) = inner {
                        push_run(run, &mut out);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn push_run(run: &docx_rs::Run, out: &mut String) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(text) => out.push_str(&text.text),
            docx_rs::RunChild::Tab(_) => out.push('\t'),
            docx_rs::RunChild::Break(_) => out.push('\n'),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run};

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let mut doc = Docx::new();
        for p in paragraphs {
            let para = if p.is_empty() {
                Paragraph::new()
            } else {
                Paragraph::new().add_run(Run::new().add_text(*p))
            };
            doc = doc.add_paragraph(para);
        }
        let mut cursor = std::io::Cursor::new(Vec::new());
        doc.build().pack(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn join_uses_single_space_and_keeps_empty_units() {
        assert_eq!(join_units(["a", "b"]), "a b");
        assert_eq!(join_units(["a", "", "b"]), "a  b");
        assert_eq!(join_units(Vec::<String>::new()), "");
        assert_eq!(join_units([""]), "");
    }

    #[test]
    fn docx_paragraphs_in_order() {
        let bytes = docx_bytes(&["Hello", "World"]);
        assert_eq!(docx_paragraphs(&bytes).unwrap(), vec!["Hello", "World"]);
    }

    #[test]
    fn docx_empty_paragraph_contributes_empty_string() {
        let bytes = docx_bytes(&["Intro", "", "Outro"]);
        let paragraphs = docx_paragraphs(&bytes).unwrap();
        assert_eq!(join_units(paragraphs), "Intro  Outro");
    }

    #[test]
    fn docx_runs_concatenate_within_paragraph() {
        let para = Paragraph::new()
            .add_run(Run::new().add_text("E="))
            .add_run(Run::new().add_text("$m*c^2$"));
        let mut cursor = std::io::Cursor::new(Vec::new());
        Docx::new().add_paragraph(para).build().pack(&mut cursor).unwrap();
        assert_eq!(docx_paragraphs(cursor.get_ref()).unwrap(), vec!["E=$m*c^2$"]);
    }

    #[test]
    fn garbage_is_not_a_docx() {
        assert!(docx_paragraphs(b"definitely not a zip").is_err());
    }

    #[tokio::test]
    async fn text_extraction_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let content = "  line one\n\tline two $x$\n\n";
        std::fs::write(&path, content).unwrap();
        let doc = Document::new(&path).unwrap();
        assert_eq!(extract(&doc, None).await.unwrap(), content);
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [0x63, 0x61, 0x66, 0xe9]).unwrap();
        let doc = Document::new(&path).unwrap();
        let err = extract(&doc, None).await.unwrap_err();
        assert!(matches!(err, Doc2SpeechError::Extraction { page: None, .. }));
    }

    #[tokio::test]
    async fn docx_file_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.docx");
        std::fs::write(&path, docx_bytes(&["Mass $m$", "Energy $E$"])).unwrap();
        let doc = Document::new(&path).unwrap();
        assert_eq!(extract(&doc, None).await.unwrap(), "Mass $m$ Energy $E$");
    }
}
