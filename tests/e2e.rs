//! End-to-end tests for the narration pipeline.
//!
//! Synthesis goes through an in-process fake engine so these run anywhere.
//! PDF cases need a pdfium library the binding can load; without one they
//! print a notice and return.
//!
//! Run with:
//!   PDFIUM_LIB_PATH=/path/to/pdfium cargo test --test e2e -- --nocapture

use doc2speech::pipeline::pdf::pdfium_available;
use doc2speech::{
    inspect, narrate, narrate_from_bytes, narrate_sync, narrate_to_file, AudioFormat,
    Doc2SpeechError, DocumentSummary, PipelineConfig, PipelineProgressCallback, SpeechEngine,
    Stage,
};
use futures::future::BoxFuture;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const FAKE_AUDIO: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

/// Records every text it is asked to speak and writes a fixed payload.
#[derive(Default)]
struct FakeEngine {
    texts: Mutex<Vec<String>>,
    fail: bool,
}

impl FakeEngine {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }

    fn last_text(&self) -> Option<String> {
        self.texts.lock().unwrap().last().cloned()
    }
}

impl SpeechEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        out_path: &'a Path,
    ) -> BoxFuture<'a, Result<(), Doc2SpeechError>> {
        Box::pin(async move {
            self.texts.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(Doc2SpeechError::SynthesisFailed {
                    engine: "fake".into(),
                    detail: "voice not installed".into(),
                });
            }
            tokio::fs::write(out_path, FAKE_AUDIO)
                .await
                .map_err(|e| Doc2SpeechError::Internal(e.to_string()))
        })
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl PipelineProgressCallback for EventLog {
    fn on_stage_start(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("start:{stage}"));
    }

    fn on_stage_complete(&self, stage: Stage, _elapsed_ms: u64) {
        self.events.lock().unwrap().push(format!("done:{stage}"));
    }

    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.events.lock().unwrap().push(format!("error:{stage}"));
    }

    fn on_pipeline_complete(&self, audio_bytes: u64, _total_ms: u64) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete:{audio_bytes}"));
    }
}

fn config_with(engine: Arc<FakeEngine>) -> PipelineConfig {
    PipelineConfig::builder()
        .engine(engine)
        .build()
        .expect("valid config")
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}

fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let mut doc = docx_rs::Docx::new();
    for p in paragraphs {
        doc = doc.add_paragraph(docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(*p)));
    }
    let mut buf = Cursor::new(Vec::new());
    doc.build().pack(&mut buf).expect("pack docx");
    buf.into_inner()
}

/// A one-page PDF showing `line` in Helvetica.
fn pdf_bytes(line: &str) -> Vec<u8> {
    pdf_pages(&[line])
}

/// A PDF with one Helvetica text line per page. `""` gives a page with an
/// empty content stream. Object offsets are computed so the cross-reference
/// table is valid.
fn pdf_pages(lines: &[&str]) -> Vec<u8> {
    let kids: Vec<String> = (0..lines.len()).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            lines.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (i, line) in lines.iter().enumerate() {
        let content = if line.is_empty() {
            String::new()
        } else {
            format!("BT /F1 12 Tf 72 720 Td ({line}) Tj ET")
        };
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

/// Skip this test when no pdfium library can be bound.
macro_rules! skip_without_pdfium {
    () => {{
        if !pdfium_available() {
            println!("SKIP: no pdfium library found (set PDFIUM_LIB_PATH)");
            return;
        }
    }};
}

// ── Text documents ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_energy_equation_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "energy.txt",
        b"Energy equation: $E$ is mass times c squared",
    );
    let engine = Arc::new(FakeEngine::default());

    let output = narrate(&path, &config_with(engine.clone())).await.unwrap();

    let expected = "Energy equation: The expression E represents {E: 1} is mass times c squared";
    assert_eq!(output.narrated_text, expected);
    assert_eq!(engine.last_text().as_deref(), Some(expected));
    assert_eq!(engine.calls(), 1);

    assert_eq!(output.audio.read().await.unwrap(), FAKE_AUDIO);
    assert_eq!(output.audio.format(), AudioFormat::Wav);
    assert!(output.audio.is_transient());

    let stats = &output.stats;
    assert_eq!(stats.formulas_found, 1);
    assert_eq!(stats.formulas_described, 1);
    assert_eq!(stats.formulas_verbatim, 0);
    assert!(!stats.rewrite_skipped);
    assert_eq!(stats.engine, "fake");
    assert_eq!(stats.audio_bytes, FAKE_AUDIO.len() as u64);
    assert_eq!(stats.extracted_chars, 44);
}

#[tokio::test]
async fn test_unparseable_formula_is_spoken_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "ops.txt", b"Operators $+*/$ and $1+1$.");
    let engine = Arc::new(FakeEngine::default());

    let output = narrate(&path, &config_with(engine.clone())).await.unwrap();

    assert_eq!(
        output.narrated_text,
        "Operators $+*/$ and The expression 2 represents {1: 2}."
    );
    assert_eq!(output.stats.formulas_found, 2);
    assert_eq!(output.stats.formulas_verbatim, 1);
    assert!(!output.report.spans[0].is_described());
}

#[tokio::test]
async fn test_text_without_formulas_is_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let text = "Line one\n\n  line two costs 5 dollars\n";
    let path = write_file(dir.path(), "plain.txt", text.as_bytes());
    let engine = Arc::new(FakeEngine::default());

    let output = narrate(&path, &config_with(engine.clone())).await.unwrap();

    assert_eq!(output.narrated_text, text);
    assert_eq!(output.stats.formulas_found, 0);
}

// ── Rejections ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_jpg_rejected_before_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "photo.jpg", b"\xFF\xD8\xFF\xE0");
    let engine = Arc::new(FakeEngine::default());
    let log = Arc::new(EventLog::default());
    let config = PipelineConfig::builder()
        .engine(engine.clone())
        .progress_callback(log.clone())
        .build()
        .unwrap();

    let err = narrate(&path, &config).await.unwrap_err();

    assert!(
        matches!(err, Doc2SpeechError::UnsupportedFormat { ref extension } if extension == "jpg"),
        "got {err:?}"
    );
    assert_eq!(engine.calls(), 0);
    assert_eq!(*log.events.lock().unwrap(), vec!["error:extract"]);
}

#[tokio::test]
async fn test_unsupported_format_wins_over_missing_file() {
    let engine = Arc::new(FakeEngine::default());
    let err = narrate("/nonexistent/scan.png", &config_with(engine))
        .await
        .unwrap_err();
    assert!(matches!(err, Doc2SpeechError::UnsupportedFormat { .. }));
}

#[tokio::test]
async fn test_missing_text_file() {
    let engine = Arc::new(FakeEngine::default());
    let err = narrate("/nonexistent/notes.txt", &config_with(engine))
        .await
        .unwrap_err();
    assert!(matches!(err, Doc2SpeechError::FileNotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_empty_document_fails_before_engine() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());

    for (name, body) in [("empty.txt", &b""[..]), ("blank.txt", &b"  \n\t \n"[..])] {
        let path = write_file(dir.path(), name, body);
        let err = narrate(&path, &config_with(engine.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, Doc2SpeechError::EmptyText), "{name}: {err:?}");
    }
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_invalid_utf8_text_is_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "latin1.txt", b"caf\xE9");
    let engine = Arc::new(FakeEngine::default());

    let err = narrate(&path, &config_with(engine)).await.unwrap_err();
    assert!(matches!(err, Doc2SpeechError::Extraction { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_engine_failure_propagates_with_stage_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.txt", b"Area $x*x$");
    let engine = Arc::new(FakeEngine::failing());
    let log = Arc::new(EventLog::default());
    let config = PipelineConfig::builder()
        .engine(engine.clone())
        .progress_callback(log.clone())
        .build()
        .unwrap();

    let err = narrate(&path, &config).await.unwrap_err();

    assert!(matches!(err, Doc2SpeechError::SynthesisFailed { .. }));
    assert_eq!(
        *log.events.lock().unwrap(),
        vec![
            "start:extract",
            "done:extract",
            "start:rewrite",
            "done:rewrite",
            "start:synthesize",
            "error:synthesize",
        ]
    );
    // The engine still saw the rewritten text.
    assert_eq!(
        engine.last_text().as_deref(),
        Some("Area The expression x^{2} represents {x**2: 1}")
    );
}

#[tokio::test]
async fn test_unknown_engine_name_rejected_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.txt", b"hello");
    let config = PipelineConfig::builder()
        .engine_name("festival")
        .build()
        .unwrap();

    let err = narrate(&path, &config).await.unwrap_err();
    assert!(matches!(err, Doc2SpeechError::InvalidConfig(_)), "got {err:?}");
}

// ── Word documents ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_docx_paragraphs_joined_and_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "lecture.docx", &docx_bytes(&["Intro", "Sum $1+1$"]));
    let engine = Arc::new(FakeEngine::default());

    let output = narrate(&path, &config_with(engine.clone())).await.unwrap();

    assert_eq!(
        output.narrated_text,
        "Intro Sum The expression 2 represents {1: 2}"
    );
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_corrupt_docx_is_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "broken.docx", b"not a zip archive");
    let engine = Arc::new(FakeEngine::default());

    let err = narrate(&path, &config_with(engine.clone())).await.unwrap_err();
    assert!(matches!(err, Doc2SpeechError::Extraction { .. }), "got {err:?}");
    assert_eq!(engine.calls(), 0);
}

// ── Entry-point variants ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_narrate_to_file_is_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "in.txt", b"Square: $x^2$");
    let out = dir.path().join("audio").join("out.wav");
    let engine = Arc::new(FakeEngine::default());

    let stats = narrate_to_file(&input, &out, &config_with(engine))
        .await
        .unwrap();

    assert_eq!(std::fs::read(&out).unwrap(), FAKE_AUDIO);
    assert!(!out.with_file_name(".out.wav.tmp").exists());
    assert_eq!(stats.formulas_described, 1);
}

#[tokio::test]
async fn test_narrate_from_bytes() {
    let engine = Arc::new(FakeEngine::default());
    let config = config_with(engine.clone());

    let output = narrate_from_bytes(b"Half: $x/2$", "nested/dir/half.txt", &config)
        .await
        .unwrap();
    assert_eq!(
        output.narrated_text,
        "Half: The expression \\frac{x}{2} represents {x: 1/2}"
    );

    let err = narrate_from_bytes(b"GIF89a", "anim.gif", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, Doc2SpeechError::UnsupportedFormat { .. }));
    assert_eq!(engine.calls(), 1);
}

#[test]
fn test_narrate_sync() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "s.txt", b"plain words");
    let engine = Arc::new(FakeEngine::default());

    let output = narrate_sync(&path, &config_with(engine)).unwrap();
    assert_eq!(output.narrated_text, "plain words");
}

#[tokio::test]
async fn test_persisted_audio_outlives_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "p.txt", b"persist me");
    let engine = Arc::new(FakeEngine::default());

    let output = narrate(&path, &config_with(engine)).await.unwrap();
    let transient = output.audio.path().to_path_buf();
    let dest = dir.path().join("kept.wav");
    let kept = output.audio.persist(&dest).await.unwrap();

    assert!(!kept.is_transient());
    assert!(!transient.exists());
    assert_eq!(std::fs::read(&dest).unwrap(), FAKE_AUDIO);
}

#[tokio::test]
async fn test_inspect_counts_formulas_without_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "i.txt", b"Area $x*x$ and $+*/$ here");
    // No engine configured: inspect must not need one.
    let config = PipelineConfig::builder()
        .engine_name("does-not-exist")
        .build()
        .unwrap();

    let summary: DocumentSummary = inspect(&path, &config).await.unwrap();

    assert_eq!(summary.char_count, 25);
    assert_eq!(summary.word_count, 5);
    assert_eq!(summary.formulas_found, 2);
    assert_eq!(summary.formulas_interpretable, 1);
    assert!(summary.pdf.is_none());

    let json = serde_json::to_value(&summary).unwrap();
    assert!(json.get("pdf").is_none());
    assert_eq!(json["report"]["spans"][0]["outcome"], "described");
}

#[tokio::test]
async fn test_callback_send_in_tokio_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "t.txt", b"$1+2$");
    let engine = Arc::new(FakeEngine::default());
    let log = Arc::new(EventLog::default());
    let config = PipelineConfig::builder()
        .engine(engine)
        .progress_callback(log.clone())
        .build()
        .unwrap();

    let handle = tokio::spawn(async move { narrate(&path, &config).await.map(|o| o.stats) });
    let stats = handle.await.unwrap().unwrap();

    assert_eq!(stats.narrated_chars, "The expression 3 represents {1: 3}".len());
    let events = log.events.lock().unwrap();
    assert_eq!(events.len(), 7);
    assert_eq!(events[6], format!("complete:{}", FAKE_AUDIO.len()));
}

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<doc2speech::NoopProgressCallback>();
    assert_send_sync::<PipelineConfig>();
}

// ── PDF documents (need pdfium) ──────────────────────────────────────────────

#[tokio::test]
async fn test_pdf_narration() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "area.pdf", &pdf_bytes("Area: $x*x$"));
    let engine = Arc::new(FakeEngine::default());

    let output = narrate(&path, &config_with(engine)).await.unwrap();

    assert!(
        output
            .narrated_text
            .contains("The expression x^{2} represents {x**2: 1}"),
        "got {:?}",
        output.narrated_text
    );
    assert_eq!(output.stats.formulas_described, 1);
}

#[tokio::test]
async fn test_pdf_inspect_reports_pages() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "one.pdf", &pdf_bytes("Hello"));

    let summary = inspect(&path, &PipelineConfig::default()).await.unwrap();

    let pdf = summary.pdf.expect("pdf metadata");
    assert_eq!(pdf.page_count, 1);
    assert!(summary.char_count >= 5);
}

#[tokio::test]
async fn test_corrupt_pdf() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "bad.pdf", b"%PDF-1.4\nthis is not a pdf");
    let engine = Arc::new(FakeEngine::default());

    let err = narrate(&path, &config_with(engine.clone())).await.unwrap_err();
    assert!(matches!(err, Doc2SpeechError::CorruptPdf { .. }), "got {err:?}");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_pdf_without_text_is_empty_text() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "scan.pdf", &pdf_pages(&[""]));
    let engine = Arc::new(FakeEngine::default());

    let summary = inspect(&path, &PipelineConfig::default()).await.unwrap();
    assert_eq!(summary.pdf.expect("pdf metadata").page_count, 1);

    let err = narrate(&path, &config_with(engine.clone())).await.unwrap_err();
    assert!(matches!(err, Doc2SpeechError::EmptyText), "got {err:?}");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_pdf_pages_joined_with_single_space() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "two.pdf", &pdf_pages(&["One", "Two"]));
    let engine = Arc::new(FakeEngine::default());

    let output = narrate(&path, &config_with(engine.clone())).await.unwrap();

    assert_eq!(output.narrated_text, "One Two");
    assert_eq!(engine.last_text().as_deref(), Some("One Two"));
}
