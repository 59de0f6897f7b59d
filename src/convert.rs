//! Narration entry points: run the three stages in order on one document.
//!
//! ```text
//! resolve ──▶ extract ──▶ rewrite ──▶ synthesize
//! (format)    (text)      (formulas)  (audio)
//! ```
//!
//! Stages are strictly sequential; each consumes the previous one's output in
//! full. The format and the speech engine are both resolved before anything
//! is read, so a `.jpg` or a misnamed engine fails without touching the file.
//! Any stage error stops the run and is returned as-is.

use crate::config::PipelineConfig;
use crate::error::Doc2SpeechError;
use crate::output::{DocumentSummary, NarrationOutput, NarrationStats};
use crate::pipeline::input::{self, DocumentFormat};
use crate::pipeline::rewrite::{rewrite_with, rewrite_with_timeout};
use crate::pipeline::{extract, pdf, speech};
use crate::progress::Stage;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Narrate a stored document.
///
/// # Errors
/// Returns the first stage failure: unsupported format, extraction failure,
/// empty text, or a speech-engine failure. Formulas that cannot be
/// interpreted are never errors.
pub async fn narrate(
    input_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<NarrationOutput, Doc2SpeechError> {
    let total_start = Instant::now();
    let input_path = input_path.as_ref();
    info!("Starting narration: {}", input_path.display());

    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_start(&input_path.display().to_string());
    }

    // ── Step 1: Resolve document and engine ──────────────────────────────
    let document =
        input::resolve_document(input_path).map_err(|e| stage_failed(config, Stage::Extract, e))?;
    let engine =
        speech::resolve_engine(config).map_err(|e| stage_failed(config, Stage::Synthesize, e))?;
    debug!("Using speech engine '{}'", engine.name());

    // ── Step 2: Extract ──────────────────────────────────────────────────
    stage_started(config, Stage::Extract);
    let extract_start = Instant::now();
    let extracted = extract::extract(&document, config.pdf_password.as_deref())
        .await
        .map_err(|e| stage_failed(config, Stage::Extract, e))?;
    let extract_duration_ms = elapsed_ms(extract_start);
    stage_completed(config, Stage::Extract, extract_duration_ms);
    let extracted_chars = extracted.chars().count();

    // ── Step 3: Rewrite formulas ─────────────────────────────────────────
    stage_started(config, Stage::Rewrite);
    let rewrite_start = Instant::now();
    let rewrite = rewrite_with_timeout(
        extracted,
        config.rewrite_options(),
        Duration::from_secs(config.rewrite_timeout_secs),
    )
    .await;
    let rewrite_duration_ms = elapsed_ms(rewrite_start);
    stage_completed(config, Stage::Rewrite, rewrite_duration_ms);
    info!(
        "Rewrote {}/{} formulas in {}ms",
        rewrite.report.described(),
        rewrite.report.found(),
        rewrite_duration_ms
    );

    // ── Step 4: Synthesize ───────────────────────────────────────────────
    stage_started(config, Stage::Synthesize);
    let synth_start = Instant::now();
    let audio = speech::synthesize(&rewrite.text, engine.as_ref(), config.synthesis_timeout_secs)
        .await
        .map_err(|e| stage_failed(config, Stage::Synthesize, e))?;
    let synthesis_duration_ms = elapsed_ms(synth_start);
    stage_completed(config, Stage::Synthesize, synthesis_duration_ms);

    let stats = NarrationStats {
        input: document.path.clone(),
        document_format: document.format,
        extracted_chars,
        narrated_chars: rewrite.text.chars().count(),
        formulas_found: rewrite.report.found(),
        formulas_described: rewrite.report.described(),
        formulas_verbatim: rewrite.report.verbatim(),
        rewrite_skipped: rewrite.report.skipped,
        engine: engine.name().to_string(),
        audio_format: audio.format(),
        audio_bytes: audio.size_bytes(),
        extract_duration_ms,
        rewrite_duration_ms,
        synthesis_duration_ms,
        total_duration_ms: elapsed_ms(total_start),
    };

    info!(
        "Narration complete: {} bytes of {} in {}ms",
        stats.audio_bytes,
        stats.audio_format.extension(),
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_complete(stats.audio_bytes, stats.total_duration_ms);
    }

    Ok(NarrationOutput {
        audio,
        narrated_text: rewrite.text,
        report: rewrite.report,
        stats,
    })
}

/// Narrate a document and write the audio to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn narrate_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<NarrationStats, Doc2SpeechError> {
    let output = narrate(input_path, config).await?;
    let path = output_path.as_ref();

    let tmp_name = format!(
        ".{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "narration".into())
    );
    let tmp_path = path.with_file_name(tmp_name);

    let staged = output.audio.persist(&tmp_path).await?;
    tokio::fs::rename(staged.path(), path)
        .await
        .map_err(|e| Doc2SpeechError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    info!("Wrote {}", path.display());
    Ok(output.stats)
}

/// Synchronous wrapper around [`narrate`].
///
/// Creates a temporary tokio runtime internally.
pub fn narrate_sync(
    input_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<NarrationOutput, Doc2SpeechError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Doc2SpeechError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(narrate(input_path, config))
}

/// Narrate a document held in memory.
///
/// `filename` supplies the declared extension; only its final path component
/// is used. The bytes are staged in a managed temporary directory that is
/// removed on return.
///
/// # Example
/// ```rust,no_run
/// use doc2speech::{narrate_from_bytes, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("lecture.docx")?;
/// let output = narrate_from_bytes(&bytes, "lecture.docx", &PipelineConfig::default()).await?;
/// output.audio.persist("lecture.wav").await?;
/// # Ok(())
/// # }
/// ```
pub async fn narrate_from_bytes(
    bytes: &[u8],
    filename: &str,
    config: &PipelineConfig,
) -> Result<NarrationOutput, Doc2SpeechError> {
    let name = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Reject before writing anything.
    DocumentFormat::from_path(Path::new(&name))?;

    let dir = tempfile::tempdir().map_err(|e| Doc2SpeechError::Internal(format!("tempdir: {e}")))?;
    let path = dir.path().join(&name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Doc2SpeechError::Internal(format!("tempfile write: {e}")))?;
    // `dir` is dropped (and the staged copy deleted) when `narrate` returns;
    // the audio lives in its own directory.
    narrate(&path, config).await
}

/// Extract a document and analyse its formulas without synthesizing audio.
///
/// Does not require a speech engine.
pub async fn inspect(
    input_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<DocumentSummary, Doc2SpeechError> {
    let document = input::resolve_document(input_path)?;
    let password = config.pdf_password.clone();

    let text = extract::extract(&document, password.as_deref()).await?;

    let pdf = if document.format == DocumentFormat::Pdf {
        let path = document.path.clone();
        let info = tokio::task::spawn_blocking(move || pdf::pdf_info(&path, password.as_deref()))
            .await
            .map_err(|e| Doc2SpeechError::Internal(format!("Metadata task panicked: {e}")))??;
        Some(info)
    } else {
        None
    };

    let options = config.rewrite_options();
    let report = tokio::task::spawn_blocking({
        let text = text.clone();
        move || rewrite_with(&text, &options).report
    })
    .await
    .map_err(|e| Doc2SpeechError::Internal(format!("Rewrite task panicked: {e}")))?;

    Ok(DocumentSummary {
        path: document.path,
        format: document.format,
        char_count: text.chars().count(),
        word_count: text.split_whitespace().count(),
        formulas_found: report.found(),
        formulas_interpretable: report.described(),
        pdf,
        report,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn stage_started(config: &PipelineConfig, stage: Stage) {
    debug!("Stage {}/3: {}", stage.index(), stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

fn stage_completed(config: &PipelineConfig, stage: Stage, elapsed_ms: u64) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, elapsed_ms);
    }
}

fn stage_failed(config: &PipelineConfig, stage: Stage, e: Doc2SpeechError) -> Doc2SpeechError {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_error(stage, &e.to_string());
    }
    e
}
