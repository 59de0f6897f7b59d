//! # doc2speech
//!
//! Narrate text, PDF and Word documents as audio, reading inline math aloud.
//!
//! Screen readers and speech engines stumble on formulas: `$x^2 + 2*x + 1$`
//! comes out as a string of symbol names. This crate parses each inline
//! `$...$` span as symbolic math, simplifies it, and replaces it with a
//! sentence a listener can follow before the text reaches the speech engine.
//! Spans that are not valid math are left exactly as written.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Extract     txt / pdf (pdfium) / docx (docx-rs) → plain text
//!  ├─ 2. Rewrite     $…$ → "The expression … represents {…}"
//!  └─ 3. Synthesize  espeak-ng process or OpenAI-compatible endpoint → audio
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2speech::{narrate, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Engine from DOC2SPEECH_ENGINE, else the local espeak-ng binary.
//!     let config = PipelineConfig::default();
//!     let output = narrate("notes.txt", &config).await?;
//!     eprintln!(
//!         "{} of {} formulas described",
//!         output.stats.formulas_described, output.stats.formulas_found
//!     );
//!     output.audio.persist("notes.wav").await?;
//!     Ok(())
//! }
//! ```
//!
//! The rewrite stage is usable on its own:
//!
//! ```rust
//! let text = doc2speech::pipeline::rewrite::rewrite("Sum: $1+1$.");
//! assert_eq!(text, "Sum: The expression 2 represents {1: 2}.");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2speech` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! doc2speech = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod formula;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, ServerConfig, ServerConfigBuilder};
pub use convert::{inspect, narrate, narrate_from_bytes, narrate_sync, narrate_to_file};
pub use error::{Doc2SpeechError, ErrorKind, FormulaError};
pub use output::{DocumentSummary, NarrationOutput, NarrationStats};
pub use pipeline::rewrite::ReplacementScope;
pub use pipeline::speech::{AudioArtifact, AudioFormat, CommandEngine, HttpSpeechEngine, SpeechEngine};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use server::{router, serve, AppState};
