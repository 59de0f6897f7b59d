//! CLI binary for doc2speech.
//!
//! A thin shim over the library crate that maps CLI flags onto
//! `PipelineConfig` / `ServerConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use doc2speech::pipeline::rewrite::{rewrite_with_timeout, ReplacementScope};
use doc2speech::{
    inspect, narrate, narrate_to_file, serve, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, ServerConfig, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one spinner for the whole run, one log line
/// per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_pipeline_start(&self, input: &str) {
        self.bar.set_message(input.to_string());
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(format!("Stage {}/3", stage.index()));
        self.bar.set_message(match stage {
            Stage::Extract => "extracting text…",
            Stage::Rewrite => "describing formulas…",
            Stage::Synthesize => "synthesizing speech…",
        });
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<10}  {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!("  {} {:<10}  {}", red("✗"), stage.to_string(), red(&msg)));
        self.bar.finish_and_clear();
    }

    fn on_pipeline_complete(&self, audio_bytes: u64, total_ms: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} of audio in {}ms",
            green("✔"),
            bold(&format_bytes(audio_bytes)),
            total_ms
        );
    }
}

fn format_bytes(n: u64) -> String {
    if n >= 1024 * 1024 {
        format!("{:.1} MiB", n as f64 / (1024.0 * 1024.0))
    } else if n >= 1024 {
        format!("{:.1} KiB", n as f64 / 1024.0)
    } else {
        format!("{n} B")
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Narrate a document with the local espeak-ng engine
  doc2speech narrate lecture.pdf -o lecture.wav

  # Use an OpenAI-compatible speech endpoint
  OPENAI_API_KEY=sk-... doc2speech narrate notes.docx --engine openai --voice nova

  # See what the formulas will sound like
  echo 'Energy: $m*c^2$' | doc2speech rewrite

  # Count formulas without synthesizing
  doc2speech inspect paper.pdf --json

  # Browser upload form on http://127.0.0.1:5000
  doc2speech serve --upload-dir /tmp/uploads

ENGINES:
  espeak, espeak-ng, command   local espeak-ng process, WAV output (default)
  openai, http                 POST {base}/v1/audio/speech, MP3 output

ENVIRONMENT VARIABLES:
  DOC2SPEECH_ENGINE       Default engine name
  OPENAI_API_KEY          Bearer key for the http engine
  OPENAI_BASE_URL         Base URL for the http engine
  PDFIUM_LIB_PATH         Directory or file of an existing libpdfium
  RUST_LOG                Tracing filter, overrides -v / -q
"#;

/// Narrate TXT, PDF and DOCX documents, reading inline math aloud.
#[derive(Parser, Debug)]
#[command(
    name = "doc2speech",
    version,
    about = "Narrate TXT, PDF and DOCX documents, reading inline math aloud",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2SPEECH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOC2SPEECH_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, rewrite formulas and synthesize audio.
    Narrate {
        /// TXT, PDF or DOCX file.
        input: PathBuf,

        /// Audio destination. Default: `<stem>.<wav|mp3>` in the current directory.
        #[arg(short, long, env = "DOC2SPEECH_OUTPUT")]
        output: Option<PathBuf>,

        /// Print `NarrationStats` as JSON on stdout.
        #[arg(long, env = "DOC2SPEECH_JSON")]
        json: bool,

        /// Echo the narrated text on stdout.
        #[arg(long)]
        print_text: bool,

        /// Disable the progress spinner.
        #[arg(long, env = "DOC2SPEECH_NO_PROGRESS")]
        no_progress: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Rewrite `$...$` formulas in TEXT (or stdin) and print the result.
    Rewrite {
        /// Text to rewrite. Read from stdin when omitted.
        text: Option<String>,

        /// Print the per-formula report as JSON instead of the text.
        #[arg(long)]
        json: bool,

        #[arg(long, env = "DOC2SPEECH_SCOPE", default_value = "span")]
        scope: ReplacementScope,
    },

    /// Extract a document and summarize it without synthesis.
    Inspect {
        input: PathBuf,

        #[arg(long)]
        json: bool,

        #[arg(long, env = "DOC2SPEECH_PASSWORD")]
        password: Option<String>,
    },

    /// Run the browser upload server.
    Serve {
        #[arg(long, env = "DOC2SPEECH_BIND", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,

        #[arg(long, env = "DOC2SPEECH_UPLOAD_DIR", default_value = "uploads")]
        upload_dir: PathBuf,

        /// Accepted extensions, comma separated.
        #[arg(long, env = "DOC2SPEECH_ALLOWED_EXT", value_delimiter = ',', default_value = "txt,pdf,docx")]
        allowed_ext: Vec<String>,

        /// Largest accepted upload in MiB.
        #[arg(long, env = "DOC2SPEECH_MAX_UPLOAD_MB", default_value_t = 25)]
        max_upload_mb: usize,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

/// Flags shared by every command that runs the pipeline.
#[derive(Args, Debug)]
struct PipelineArgs {
    /// Speech engine: espeak, command, openai, http.
    #[arg(long, env = "DOC2SPEECH_ENGINE")]
    engine: Option<String>,

    /// Engine voice (`en-us`, `alloy`, ...).
    #[arg(long, env = "DOC2SPEECH_VOICE")]
    voice: Option<String>,

    /// Speaking rate in words per minute (80–450).
    #[arg(long, env = "DOC2SPEECH_RATE")]
    rate: Option<u32>,

    /// Model id for the http engine.
    #[arg(long, env = "DOC2SPEECH_SPEECH_MODEL")]
    speech_model: Option<String>,

    /// Synthesis timeout in seconds.
    #[arg(long, env = "DOC2SPEECH_SYNTHESIS_TIMEOUT", default_value_t = 120)]
    synthesis_timeout: u64,

    /// Formula replacement scope: span or all.
    #[arg(long, env = "DOC2SPEECH_SCOPE", default_value = "span")]
    scope: ReplacementScope,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOC2SPEECH_PASSWORD")]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs during narration.
    let spinner = matches!(
        cli.command,
        Command::Narrate { json: false, no_progress: false, .. }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Narrate {
            input,
            output,
            json,
            print_text,
            no_progress: _,
            pipeline,
        } => {
            let progress: Option<ProgressCallback> = if spinner {
                Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
            } else {
                None
            };
            let config = build_config(&pipeline, progress)?;
            run_narrate(&input, output, json, print_text, cli.quiet, &config).await
        }

        Command::Rewrite { text, json, scope } => {
            let text = match text {
                Some(t) => t,
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            let config = PipelineConfig::builder()
                .replacement_scope(scope)
                .build()
                .context("Invalid configuration")?;
            let result = rewrite_with_timeout(
                text,
                config.rewrite_options(),
                Duration::from_secs(config.rewrite_timeout_secs),
            )
            .await;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result.report).context("Failed to serialise report")?
                );
            } else {
                let mut out = io::stdout().lock();
                out.write_all(result.text.as_bytes())
                    .context("Failed to write to stdout")?;
                if !result.text.ends_with('\n') {
                    out.write_all(b"\n").ok();
                }
            }
            Ok(())
        }

        Command::Inspect {
            input,
            json,
            password,
        } => {
            let mut builder = PipelineConfig::builder();
            if let Some(p) = password {
                builder = builder.pdf_password(p);
            }
            let config = builder.build().context("Invalid configuration")?;
            let summary = inspect(&input, &config)
                .await
                .context("Failed to inspect document")?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
                );
            } else {
                println!("File:          {}", summary.path.display());
                println!("Format:        {}", summary.format);
                println!("Characters:    {}", summary.char_count);
                println!("Words:         {}", summary.word_count);
                println!(
                    "Formulas:      {} found, {} interpretable",
                    summary.formulas_found, summary.formulas_interpretable
                );
                if let Some(ref pdf) = summary.pdf {
                    println!("Pages:         {}", pdf.page_count);
                    println!("PDF Version:   {}", pdf.pdf_version);
                    if let Some(ref t) = pdf.title {
                        println!("Title:         {t}");
                    }
                    if let Some(ref a) = pdf.author {
                        println!("Author:        {a}");
                    }
                }
            }
            Ok(())
        }

        Command::Serve {
            bind,
            upload_dir,
            allowed_ext,
            max_upload_mb,
            pipeline,
        } => {
            let server = ServerConfig::builder()
                .bind(bind)
                .upload_dir(upload_dir)
                .allowed_extensions(allowed_ext)
                .max_upload_bytes(max_upload_mb.saturating_mul(1024 * 1024))
                .build()
                .context("Invalid server configuration")?;
            let config = build_config(&pipeline, None)?;
            if !cli.quiet {
                eprintln!("{} listening on {}", bold("doc2speech"), bold(&format!("http://{bind}")));
            }
            serve(server, config).await.context("Server failed")
        }
    }
}

async fn run_narrate(
    input: &Path,
    output: Option<PathBuf>,
    json: bool,
    print_text: bool,
    quiet: bool,
    config: &PipelineConfig,
) -> Result<()> {
    // Explicit destination without text echo: atomic write straight to disk.
    if let (Some(path), false) = (output.as_ref(), print_text) {
        let stats = narrate_to_file(input, path, config)
            .await
            .context("Narration failed")?;
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
            );
        } else if !quiet {
            eprintln!(
                "{}  {} formulas described, {} left as written  →  {}",
                green("✔"),
                stats.formulas_described,
                stats.formulas_verbatim,
                bold(&path.display().to_string()),
            );
        }
        return Ok(());
    }

    let result = narrate(input, config).await.context("Narration failed")?;
    let dest = output.unwrap_or_else(|| default_output(input, result.audio.format().extension()));
    let saved = result
        .audio
        .persist(&dest)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    if print_text {
        println!("{}", result.narrated_text);
    }
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.stats).context("Failed to serialise stats")?
        );
    } else if !quiet {
        eprintln!(
            "{}  {} formulas described, {} left as written  →  {}",
            green("✔"),
            result.stats.formulas_described,
            result.stats.formulas_verbatim,
            bold(&saved.path().display().to_string()),
        );
    }
    Ok(())
}

/// `<stem>.<ext>` in the current directory.
fn default_output(input: &Path, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "narration".into());
    PathBuf::from(format!("{stem}.{ext}"))
}

/// Map shared pipeline flags to `PipelineConfig`.
fn build_config(args: &PipelineArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .replacement_scope(args.scope)
        .synthesis_timeout_secs(args.synthesis_timeout);

    if let Some(ref name) = args.engine {
        builder = builder.engine_name(name.clone());
    }
    if let Some(ref voice) = args.voice {
        builder = builder.voice(voice.clone());
    }
    if let Some(rate) = args.rate {
        builder = builder.speech_rate(rate);
    }
    if let Some(ref model) = args.speech_model {
        builder = builder.speech_model(model.clone());
    }
    if let Some(ref pwd) = args.password {
        builder = builder.pdf_password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
