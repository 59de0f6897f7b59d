//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to observe the
//! three stages as they run. The CLI drives its spinner from these events;
//! the server leaves them unset.
//!
//! # Example
//!
//! ```rust
//! use doc2speech::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PipelineProgressCallback for Printer {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         eprintln!("{stage} finished in {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extract,
    Rewrite,
    Synthesize,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Extract, Stage::Rewrite, Stage::Synthesize];

    /// 1-based position in the pipeline.
    pub fn index(&self) -> usize {
        match self {
            Stage::Extract => 1,
            Stage::Rewrite => 2,
            Stage::Synthesize => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Extract => "extract",
            Stage::Rewrite => "rewrite",
            Stage::Synthesize => "synthesize",
        })
    }
}

/// Called by the pipeline as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages run strictly one after another, but the
/// callback may be shared by concurrent narrations, hence `Send + Sync`.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before extraction starts.
    ///
    /// # Arguments
    /// * `input`: display form of the document path
    fn on_pipeline_start(&self, input: &str) {
        let _ = input;
    }

    /// Called as a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage succeeds.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage fails. The pipeline stops after this.
    ///
    /// # Arguments
    /// * `error`: human-readable error description
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once after synthesis produced audio.
    ///
    /// # Arguments
    /// * `audio_bytes`: size of the produced audio file
    /// * `total_ms`:    wall-clock time of the whole pipeline
    fn on_pipeline_complete(&self, audio_bytes: u64, total_ms: u64) {
        let _ = (audio_bytes, total_ms);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
