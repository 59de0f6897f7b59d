//! Configuration types for the narration pipeline and the upload server.
//!
//! Pipeline behaviour is controlled through [`PipelineConfig`], built via
//! [`PipelineConfigBuilder`]; the HTTP front end through [`ServerConfig`].
//! Both are plain values handed in at startup. Nothing in the crate reads
//! global mutable state, so two configs can run side by side in one process.

use crate::error::Doc2SpeechError;
use crate::formula::{FormulaLimits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FORMULA_LEN};
use crate::pipeline::input::DEFAULT_ALLOWED_EXTENSIONS;
use crate::pipeline::rewrite::{ReplacementScope, RewriteOptions};
use crate::pipeline::speech::SpeechEngine;
use crate::progress::ProgressCallback;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one narration.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use doc2speech::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .engine_name("espeak")
///     .voice("en-us")
///     .speech_rate(160)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// PDF user password for encrypted documents.
    pub pdf_password: Option<String>,

    /// Which occurrences an interpreted formula replaces. Default: span-scoped.
    pub replacement_scope: ReplacementScope,

    /// Longest formula, in characters, the interpreter will look at. Default: 256.
    ///
    /// Longer spans are left verbatim.
    pub max_formula_len: usize,

    /// Wall-clock budget for the rewrite stage in seconds. Default: 10.
    ///
    /// On expiry the extracted text is narrated without rewriting.
    pub rewrite_timeout_secs: u64,

    /// Pre-constructed speech engine. Takes precedence over `engine_name`.
    pub engine: Option<Arc<dyn SpeechEngine>>,

    /// Speech engine name: `espeak` / `command` or `openai` / `http`.
    /// If None along with `engine`, `DOC2SPEECH_ENGINE` is consulted.
    pub engine_name: Option<String>,

    /// Voice identifier passed to the engine (`en-us`, `alloy`, ...).
    pub voice: Option<String>,

    /// Speaking rate in words per minute (command engine only).
    pub speech_rate: Option<u32>,

    /// Model identifier for the HTTP engine. Default: engine's own default.
    pub speech_model: Option<String>,

    /// Wall-clock budget for synthesis in seconds. Default: 120.
    pub synthesis_timeout_secs: u64,

    /// Optional progress callback for per-stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pdf_password: None,
            replacement_scope: ReplacementScope::default(),
            max_formula_len: DEFAULT_MAX_FORMULA_LEN,
            rewrite_timeout_secs: 10,
            engine: None,
            engine_name: None,
            voice: None,
            speech_rate: None,
            speech_model: None,
            synthesis_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("pdf_password", &self.pdf_password.as_ref().map(|_| "<redacted>"))
            .field("replacement_scope", &self.replacement_scope)
            .field("max_formula_len", &self.max_formula_len)
            .field("rewrite_timeout_secs", &self.rewrite_timeout_secs)
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field("engine_name", &self.engine_name)
            .field("voice", &self.voice)
            .field("speech_rate", &self.speech_rate)
            .field("speech_model", &self.speech_model)
            .field("synthesis_timeout_secs", &self.synthesis_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Options for the rewrite stage.
    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions {
            scope: self.replacement_scope,
            limits: FormulaLimits {
                max_len: self.max_formula_len,
                max_depth: DEFAULT_MAX_DEPTH,
            },
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    pub fn replacement_scope(mut self, scope: ReplacementScope) -> Self {
        self.config.replacement_scope = scope;
        self
    }

    pub fn max_formula_len(mut self, n: usize) -> Self {
        self.config.max_formula_len = n;
        self
    }

    pub fn rewrite_timeout_secs(mut self, secs: u64) -> Self {
        self.config.rewrite_timeout_secs = secs;
        self
    }

    pub fn engine(mut self, engine: Arc<dyn SpeechEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn engine_name(mut self, name: impl Into<String>) -> Self {
        self.config.engine_name = Some(name.into());
        self
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.config.voice = Some(voice.into());
        self
    }

    pub fn speech_rate(mut self, wpm: u32) -> Self {
        self.config.speech_rate = Some(wpm.clamp(80, 450));
        self
    }

    pub fn speech_model(mut self, model: impl Into<String>) -> Self {
        self.config.speech_model = Some(model.into());
        self
    }

    pub fn synthesis_timeout_secs(mut self, secs: u64) -> Self {
        self.config.synthesis_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Doc2SpeechError> {
        let c = &self.config;
        if c.max_formula_len == 0 {
            return Err(Doc2SpeechError::InvalidConfig(
                "max_formula_len must be ≥ 1".into(),
            ));
        }
        if c.rewrite_timeout_secs == 0 {
            return Err(Doc2SpeechError::InvalidConfig(
                "rewrite timeout must be ≥ 1 second".into(),
            ));
        }
        if c.synthesis_timeout_secs == 0 {
            return Err(Doc2SpeechError::InvalidConfig(
                "synthesis timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Server ───────────────────────────────────────────────────────────────

/// Configuration for the upload server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address. Default: `127.0.0.1:5000`.
    pub bind: SocketAddr,
    /// Where uploads are stored before extraction. Default: `uploads`.
    pub upload_dir: PathBuf,
    /// Accepted extensions, lowercase, without the dot. Default: txt, pdf, docx.
    pub allowed_extensions: Vec<String>,
    /// Largest accepted request body in bytes. Default: 25 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            upload_dir: PathBuf::from("uploads"),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.bind = addr;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn allowed_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.allowed_extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Every allowed extension must be one the extractor understands.
    pub fn build(self) -> Result<ServerConfig, Doc2SpeechError> {
        let c = &self.config;
        if c.allowed_extensions.is_empty() {
            return Err(Doc2SpeechError::InvalidConfig(
                "at least one allowed extension is required".into(),
            ));
        }
        if let Some(bad) = c
            .allowed_extensions
            .iter()
            .find(|e| !DEFAULT_ALLOWED_EXTENSIONS.contains(&e.as_str()))
        {
            return Err(Doc2SpeechError::InvalidConfig(format!(
                "extension '{bad}' has no extractor (supported: txt, pdf, docx)"
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(Doc2SpeechError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.replacement_scope, ReplacementScope::SpanScoped);
        assert_eq!(c.max_formula_len, 256);
        assert_eq!(c.rewrite_timeout_secs, 10);
        assert_eq!(c.synthesis_timeout_secs, 120);
        assert!(c.engine.is_none());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        assert!(PipelineConfig::builder().synthesis_timeout_secs(0).build().is_err());
        assert!(PipelineConfig::builder().rewrite_timeout_secs(0).build().is_err());
        assert!(PipelineConfig::builder().max_formula_len(0).build().is_err());
    }

    #[test]
    fn rewrite_options_follow_config() {
        let c = PipelineConfig::builder()
            .replacement_scope(ReplacementScope::AllOccurrences)
            .max_formula_len(40)
            .build()
            .unwrap();
        let o = c.rewrite_options();
        assert_eq!(o.scope, ReplacementScope::AllOccurrences);
        assert_eq!(o.limits.max_len, 40);
    }

    #[test]
    fn debug_redacts_password() {
        let c = PipelineConfig::builder().pdf_password("hunter2").build().unwrap();
        let s = format!("{c:?}");
        assert!(!s.contains("hunter2"));
        assert!(s.contains("<redacted>"));
    }

    #[test]
    fn speech_rate_is_clamped() {
        let c = PipelineConfig::builder().speech_rate(10_000).build().unwrap();
        assert_eq!(c.speech_rate, Some(450));
    }

    #[test]
    fn server_defaults() {
        let c = ServerConfig::default();
        assert_eq!(c.bind.port(), 5000);
        assert_eq!(c.upload_dir, PathBuf::from("uploads"));
        assert_eq!(c.allowed_extensions, vec!["txt", "pdf", "docx"]);
        assert_eq!(c.max_upload_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn server_extensions_are_normalised_and_checked() {
        let c = ServerConfig::builder()
            .allowed_extensions([".PDF", "txt"])
            .build()
            .unwrap();
        assert_eq!(c.allowed_extensions, vec!["pdf", "txt"]);

        assert!(ServerConfig::builder().allowed_extensions(["jpg"]).build().is_err());
        assert!(ServerConfig::builder()
            .allowed_extensions(Vec::<String>::new())
            .build()
            .is_err());
    }
}
