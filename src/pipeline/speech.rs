//! Speech synthesis: the final text in, one audio file out.
//!
//! The text is handed to a [`SpeechEngine`] as a single unit. No chunking,
//! no streaming and no caching: every call produces a fresh artifact in a
//! fresh temporary directory.
//!
//! ## Engines
//!
//! | Engine | Backend | Output |
//! |--------|---------|--------|
//! | [`CommandEngine`] | local program (`espeak-ng` by default), text on stdin | WAV |
//! | [`HttpSpeechEngine`] | OpenAI-compatible `POST /v1/audio/speech` | MP3 |
//!
//! [`resolve_engine`] picks one from configuration, most specific first:
//! a pre-built engine, an engine name, `DOC2SPEECH_ENGINE`, then the default
//! command engine.

use crate::config::PipelineConfig;
use crate::error::Doc2SpeechError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Environment variable consulted when no engine is configured.
pub const ENGINE_ENV: &str = "DOC2SPEECH_ENGINE";

/// Program run by the default command engine.
pub const DEFAULT_COMMAND: &str = "espeak-ng";

/// Default HTTP endpoint base URL.
pub const DEFAULT_HTTP_BASE_URL: &str = "https://api.openai.com";

/// Default HTTP speech model.
pub const DEFAULT_SPEECH_MODEL: &str = "tts-1";

/// Default voice for the HTTP engine.
pub const DEFAULT_HTTP_VOICE: &str = "alloy";

// ── Audio ────────────────────────────────────────────────────────────────

/// Container format of a synthesized artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }
}

/// A synthesized audio file.
///
/// When the file lives in a transient directory, that directory is removed
/// when the artifact is dropped. Call [`AudioArtifact::persist`] to keep it.
#[derive(Debug)]
pub struct AudioArtifact {
    path: PathBuf,
    format: AudioFormat,
    size_bytes: u64,
    _temp_dir: Option<TempDir>,
}

impl AudioArtifact {
    /// Wrap an audio file that the caller owns.
    pub fn at(path: impl Into<PathBuf>, format: AudioFormat, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            format,
            size_bytes,
            _temp_dir: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Whether the file disappears when this artifact is dropped.
    pub fn is_transient(&self) -> bool {
        self._temp_dir.is_some()
    }

    /// Read the whole file.
    pub async fn read(&self) -> Result<Vec<u8>, Doc2SpeechError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| Doc2SpeechError::Internal(format!("Failed to read audio: {e}")))
    }

    /// Move the audio to `dest` and return an artifact that no longer
    /// cleans up after itself.
    ///
    /// Falls back to copy + delete when `dest` is on another file system.
    pub async fn persist(self, dest: impl AsRef<Path>) -> Result<AudioArtifact, Doc2SpeechError> {
        let dest = dest.as_ref().to_path_buf();
        let write_err = |source: std::io::Error| Doc2SpeechError::OutputWriteFailed {
            path: dest.clone(),
            source,
        };

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        if tokio::fs::rename(&self.path, &dest).await.is_err() {
            tokio::fs::copy(&self.path, &dest).await.map_err(write_err)?;
            let _ = tokio::fs::remove_file(&self.path).await;
        }
        debug!("Persisted audio to {}", dest.display());
        Ok(AudioArtifact::at(dest, self.format, self.size_bytes))
    }
}

// ── Engine trait ─────────────────────────────────────────────────────────

/// A text-to-speech backend.
///
/// `synthesize` writes audio for `text` to `out_path`. It must not return
/// `Ok` without having written the file.
pub trait SpeechEngine: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Format of the audio this engine writes.
    fn format(&self) -> AudioFormat;

    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        out_path: &'a Path,
    ) -> BoxFuture<'a, Result<(), Doc2SpeechError>>;
}

// ── Command engine ───────────────────────────────────────────────────────

/// Runs a local speech program with the text on stdin and `-w <path>`.
///
/// Matches the `espeak` / `espeak-ng` command line: `-v` voice, `-s` words
/// per minute.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    voice: Option<String>,
    rate_wpm: Option<u32>,
    extra_args: Vec<String>,
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND)
    }
}

impl CommandEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            voice: None,
            rate_wpm: None,
            extra_args: Vec::new(),
        }
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn rate_wpm(mut self, wpm: u32) -> Self {
        self.rate_wpm = Some(wpm);
        self
    }

    /// Extra arguments placed before the output flag.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Full argument list for one invocation.
    pub fn args_for(&self, out_path: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(v) = &self.voice {
            args.push("-v".to_string());
            args.push(v.clone());
        }
        if let Some(r) = self.rate_wpm {
            args.push("-s".to_string());
            args.push(r.to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push("--stdin".to_string());
        args.push("-w".to_string());
        args.push(out_path.to_string_lossy().into_owned());
        args
    }

    async fn run(&self, text: &str, out_path: &Path) -> Result<(), Doc2SpeechError> {
        let args = self.args_for(out_path);
        debug!(program = %self.program, ?args, "Spawning speech command");

        let mut child = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Doc2SpeechError::EngineUnavailable {
                engine: self.program.clone(),
                detail: e.to_string(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| Doc2SpeechError::SynthesisFailed {
                    engine: self.program.clone(),
                    detail: format!("writing stdin: {e}"),
                })?;
            // Dropping stdin closes the pipe so the program sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Doc2SpeechError::SynthesisFailed {
                engine: self.program.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Doc2SpeechError::SynthesisFailed {
                engine: self.program.clone(),
                detail: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

impl SpeechEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        out_path: &'a Path,
    ) -> BoxFuture<'a, Result<(), Doc2SpeechError>> {
        Box::pin(self.run(text, out_path))
    }
}

// ── HTTP engine ──────────────────────────────────────────────────────────

/// OpenAI-compatible `/v1/audio/speech` client.
#[derive(Debug, Clone)]
pub struct HttpSpeechEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    voice: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl HttpSpeechEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: None,
            model: DEFAULT_SPEECH_MODEL.to_string(),
            voice: DEFAULT_HTTP_VOICE.to_string(),
        }
    }

    /// Build from `OPENAI_BASE_URL` / `OPENAI_API_KEY`.
    pub fn from_env() -> Self {
        let base = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_HTTP_BASE_URL.into());
        let mut engine = Self::new(base);
        engine.api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        engine
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Full endpoint URL. Accepts a base with or without a trailing `/v1`.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/audio/speech")
        } else {
            format!("{base}/v1/audio/speech")
        }
    }

    async fn run(&self, text: &str, out_path: &Path) -> Result<(), Doc2SpeechError> {
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: self.format().extension(),
        };
        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Doc2SpeechError::EngineUnavailable {
                engine: self.name().to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Doc2SpeechError::SynthesisFailed {
                engine: self.name().to_string(),
                detail: format!("HTTP {status}: {}", detail.trim()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Doc2SpeechError::SynthesisFailed {
                engine: self.name().to_string(),
                detail: e.to_string(),
            })?;
        tokio::fs::write(out_path, &bytes)
            .await
            .map_err(|e| Doc2SpeechError::OutputWriteFailed {
                path: out_path.to_path_buf(),
                source: e,
            })
    }
}

impl SpeechEngine for HttpSpeechEngine {
    fn name(&self) -> &str {
        "openai"
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        out_path: &'a Path,
    ) -> BoxFuture<'a, Result<(), Doc2SpeechError>> {
        Box::pin(self.run(text, out_path))
    }
}

// ── Resolution ───────────────────────────────────────────────────────────

/// Build an engine from a name plus the voice/rate/model settings.
pub fn engine_from_name(name: &str, config: &PipelineConfig) -> Result<Arc<dyn SpeechEngine>, Doc2SpeechError> {
    match name.to_ascii_lowercase().as_str() {
        "espeak" | "espeak-ng" | "command" => {
            let mut engine = CommandEngine::new(DEFAULT_COMMAND);
            if let Some(v) = &config.voice {
                engine = engine.voice(v);
            }
            if let Some(r) = config.speech_rate {
                engine = engine.rate_wpm(r);
            }
            Ok(Arc::new(engine))
        }
        "openai" | "http" => {
            let mut engine = HttpSpeechEngine::from_env();
            if let Some(v) = &config.voice {
                engine = engine.voice(v);
            }
            if let Some(m) = &config.speech_model {
                engine = engine.model(m);
            }
            Ok(Arc::new(engine))
        }
        other => Err(Doc2SpeechError::InvalidConfig(format!(
            "unknown speech engine '{other}' (expected espeak, command, openai or http)"
        ))),
    }
}

/// Pick the engine for `config`, most specific source first.
pub fn resolve_engine(config: &PipelineConfig) -> Result<Arc<dyn SpeechEngine>, Doc2SpeechError> {
    if let Some(engine) = &config.engine {
        return Ok(Arc::clone(engine));
    }
    if let Some(name) = &config.engine_name {
        return engine_from_name(name, config);
    }
    if let Ok(name) = std::env::var(ENGINE_ENV) {
        if !name.trim().is_empty() {
            return engine_from_name(name.trim(), config);
        }
    }
    engine_from_name(DEFAULT_COMMAND, config)
}

// ── Stage entry point ────────────────────────────────────────────────────

/// Narrate `text` with `engine`, bounded by `timeout_secs`.
///
/// Empty or whitespace-only text fails with [`Doc2SpeechError::EmptyText`]
/// before the engine is touched.
pub async fn synthesize(
    text: &str,
    engine: &dyn SpeechEngine,
    timeout_secs: u64,
) -> Result<AudioArtifact, Doc2SpeechError> {
    if text.trim().is_empty() {
        return Err(Doc2SpeechError::EmptyText);
    }

    let temp_dir = TempDir::new().map_err(|e| Doc2SpeechError::Internal(e.to_string()))?;
    let format = engine.format();
    let out_path = temp_dir.path().join(format!("narration.{}", format.extension()));

    let start = Instant::now();
    info!(
        "Synthesizing {} chars with '{}'",
        text.chars().count(),
        engine.name()
    );

    // Dropping the future on timeout drops any child process with it.
    tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        engine.synthesize(text, &out_path),
    )
    .await
    .map_err(|_| Doc2SpeechError::SynthesisTimeout { secs: timeout_secs })??;

    let size_bytes = match tokio::fs::metadata(&out_path).await {
        Ok(m) if m.len() > 0 => m.len(),
        _ => {
            return Err(Doc2SpeechError::SynthesisFailed {
                engine: engine.name().to_string(),
                detail: "engine finished without producing audio".into(),
            })
        }
    };

    info!(
        "Synthesized {} bytes of {} in {:?}",
        size_bytes,
        format.extension(),
        start.elapsed()
    );

    Ok(AudioArtifact {
        path: out_path,
        format,
        size_bytes,
        _temp_dir: Some(temp_dir),
    })
}
