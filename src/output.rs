//! Result types returned by the narration entry points.

use crate::pipeline::input::DocumentFormat;
use crate::pipeline::pdf::PdfInfo;
use crate::pipeline::rewrite::RewriteReport;
use crate::pipeline::speech::{AudioArtifact, AudioFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything one narration produced.
#[derive(Debug)]
pub struct NarrationOutput {
    /// The synthesized audio. Transient unless persisted.
    pub audio: AudioArtifact,
    /// The exact text handed to the speech engine.
    pub narrated_text: String,
    /// Per-formula outcomes of the rewrite stage.
    pub report: RewriteReport,
    pub stats: NarrationStats,
}

/// Timings and counts for one narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationStats {
    pub input: PathBuf,
    pub document_format: DocumentFormat,
    /// Characters of extracted text.
    pub extracted_chars: usize,
    /// Characters handed to the engine.
    pub narrated_chars: usize,
    pub formulas_found: usize,
    pub formulas_described: usize,
    pub formulas_verbatim: usize,
    /// True when rewriting ran out of time and the text was narrated as extracted.
    pub rewrite_skipped: bool,
    pub engine: String,
    pub audio_format: AudioFormat,
    pub audio_bytes: u64,
    pub extract_duration_ms: u64,
    pub rewrite_duration_ms: u64,
    pub synthesis_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What `inspect` found in a document, without synthesizing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub char_count: usize,
    pub word_count: usize,
    pub formulas_found: usize,
    pub formulas_interpretable: usize,
    /// Present for PDFs only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<PdfInfo>,
    pub report: RewriteReport,
}
