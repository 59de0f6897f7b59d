//! Error types for the doc2speech library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Doc2SpeechError`]: **Fatal**: the narration cannot proceed at all
//!   (unsupported format, unreadable document, speech engine failure).
//!   Returned as `Err(Doc2SpeechError)` from the top-level `narrate*`
//!   functions and from each pipeline stage.
//!
//! * [`FormulaError`]: **Non-fatal**: a single `$…$` span could not be
//!   interpreted. It is recorded in [`crate::pipeline::rewrite::FormulaOutcome`]
//!   and the span is left verbatim; it never reaches the caller as an `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doc2speech library.
#[derive(Debug, Error)]
pub enum Doc2SpeechError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The declared extension is not one of `txt`, `pdf`, `docx`.
    #[error("Unsupported file type: '{extension}'\nSupported formats: txt, pdf, docx.")]
    UnsupportedFormat { extension: String },

    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The parsing library failed on the document content.
    ///
    /// `page` is set (1-indexed) when a single PDF page failed.
    #[error("Failed to extract text from '{path}'{}: {detail}", page_suffix(.page))]
    Extraction {
        path: PathBuf,
        page: Option<usize>,
        detail: String,
    },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF extraction needs the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the doc2speech executable.\n\
  • Install pdfium in a system library directory.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Synthesis errors ──────────────────────────────────────────────────
    /// There is nothing to narrate: the text is empty or only whitespace.
    #[error("Nothing to narrate: the document contains no text")]
    EmptyText,

    /// The speech engine could not be started or reached.
    #[error("Speech engine '{engine}' is unavailable: {detail}")]
    EngineUnavailable { engine: String, detail: String },

    /// The speech engine ran but did not produce audio.
    #[error("Speech engine '{engine}' failed: {detail}")]
    SynthesisFailed { engine: String, detail: String },

    /// The speech engine did not finish within the configured budget.
    #[error("Speech synthesis timed out after {secs}s\nIncrease --synthesis-timeout.")]
    SynthesisTimeout { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output audio file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn page_suffix(page: &Option<usize>) -> String {
    page.map(|p| format!(" (page {p})")).unwrap_or_default()
}

/// Coarse classification of [`Doc2SpeechError`], one per client-visible
/// outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    Extraction,
    EmptyText,
    EngineUnavailable,
    SynthesisFailed,
    SynthesisTimeout,
    Internal,
}

impl Doc2SpeechError {
    /// Classify this error for the orchestration boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Doc2SpeechError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Doc2SpeechError::Extraction { .. }
            | Doc2SpeechError::CorruptPdf { .. }
            | Doc2SpeechError::PasswordRequired { .. }
            | Doc2SpeechError::WrongPassword { .. } => ErrorKind::Extraction,
            Doc2SpeechError::EmptyText => ErrorKind::EmptyText,
            Doc2SpeechError::EngineUnavailable { .. } => ErrorKind::EngineUnavailable,
            Doc2SpeechError::SynthesisFailed { .. } => ErrorKind::SynthesisFailed,
            Doc2SpeechError::SynthesisTimeout { .. } => ErrorKind::SynthesisTimeout,
            Doc2SpeechError::FileNotFound { .. }
            | Doc2SpeechError::PermissionDenied { .. }
            | Doc2SpeechError::PdfiumBindingFailed(_)
            | Doc2SpeechError::OutputWriteFailed { .. }
            | Doc2SpeechError::InvalidConfig(_)
            | Doc2SpeechError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Why a single `$…$` span was left untouched.
///
/// Stored in [`crate::pipeline::rewrite::FormulaOutcome::Verbatim`]. Never
/// propagated as a failure of the rewrite stage.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum FormulaError {
    /// The span between the delimiters is empty or whitespace.
    #[error("empty formula")]
    Empty,

    /// The formula is longer than the configured limit.
    #[error("formula is {len} characters long (limit {limit})")]
    TooLong { len: usize, limit: usize },

    /// Parentheses or operators nest deeper than the parser allows.
    #[error("formula nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    /// Malformed syntax.
    #[error("syntax error at offset {offset}: {detail}")]
    Syntax { offset: usize, detail: String },

    /// The expression divides by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Exact arithmetic left the representable range.
    #[error("numeric overflow")]
    Overflow,

    /// The expression uses a construct the interpreter does not model.
    #[error("unsupported: {0}")]
    Unsupported(String),
}
