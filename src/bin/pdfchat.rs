//! CLI binary for pdfchat.
//!
//! A thin shim over the library crate: maps CLI flags to `ExtractionConfig`,
//! processes one PDF, prints its text, then answers questions about it.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfchat::engine;
use pdfchat::pipeline::batch::Batch;
use pdfchat::{
    DocumentCache, DocumentProcessor, ExtractionConfig, ExtractionProgressCallback,
    ProcessResponse, ProgressCallback, SessionStore,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over batch requests, extended by the retry
/// pass when pages need a second attempt.
struct CliProgressCallback {
    bar: ProgressBar,
    failed_batches: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed_batches: AtomicUsize::new(0),
        })
    }

    /// Remove the bar; a cache hit or an early error never reaches
    /// `on_extraction_complete`.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize, total_batches: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} requests  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_batches as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_pages} pages in {total_batches} batches…"))
        ));
    }

    fn on_batch_complete(&self, batch: &Batch, resolved: usize) {
        self.bar.println(format!(
            "  {} Pages {:<9} {}",
            green("✓"),
            batch.to_string(),
            dim(&format!("{resolved}/{} pages", batch.len())),
        ));
        self.bar.inc(1);
    }

    fn on_batch_failed(&self, batch: &Batch, error: &str) {
        self.failed_batches.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}…", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Pages {:<9} {}",
            red("✗"),
            batch.to_string(),
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_retry_start(&self, pages: &[usize]) {
        let len = self.bar.length().unwrap_or(0);
        self.bar.set_length(len + pages.len() as u64);
        self.bar.set_prefix("Retrying");
    }

    fn on_page_retried(&self, page_num: usize, success: bool) {
        let mark = if success { green("↻") } else { red("✗") };
        self.bar.println(format!("  {mark} Page {page_num:>3} (retry)"));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, resolved: usize, unresolved: &[usize]) {
        self.bar.finish_and_clear();
        if unresolved.is_empty() {
            eprintln!("{} {} pages extracted", green("✔"), bold(&resolved.to_string()));
        } else {
            eprintln!(
                "{} {} pages extracted, no text for pages {:?}",
                if resolved == 0 { red("✘") } else { cyan("⚠") },
                bold(&resolved.to_string()),
                unresolved
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text to stdout
  pdfchat report.pdf

  # Extract, then ask questions
  pdfchat report.pdf --ask "Who signed the contract?" --ask "When does it expire?"

  # Interactive question loop after extraction
  pdfchat report.pdf --interactive

  # Keep extractions across runs (cache entries expire after --cache-ttl seconds)
  pdfchat report.pdf --cache-file ~/.cache/pdfchat/cache.json

  # Structured output: {"extractedText": ...} or {"error": ...}
  pdfchat report.pdf --json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Existing libpdfium (file or directory), skips the download
  PDFCHAT_PDFIUM_DIR      Base directory for the downloaded pdfium library

PDF ENGINE:
  On first run pdfchat downloads pdfium (~30 MB) from bblanchon/pdfium-binaries
  into ~/.cache/pdfchat/pdfium-7690/. Later runs only check that the file exists.
"#;

/// Extract PDF text with a Vision LLM, then chat about it.
#[derive(Parser, Debug)]
#[command(
    name = "pdfchat",
    version,
    about = "Extract PDF text with a Vision LLM, then chat about it",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write extracted text to this file instead of stdout.
    #[arg(short, long, env = "PDFCHAT_OUTPUT")]
    output: Option<PathBuf>,

    /// Question to ask about the document (repeatable).
    #[arg(short, long)]
    ask: Vec<String>,

    /// Read questions from stdin, one per line, after extraction.
    #[arg(short, long)]
    interactive: bool,

    /// JSON file used to persist the extraction cache between runs.
    #[arg(long, env = "PDFCHAT_CACHE_FILE")]
    cache_file: Option<PathBuf>,

    /// Cache time-to-live in seconds.
    #[arg(long, env = "PDFCHAT_CACHE_TTL", default_value_t = 3600)]
    cache_ttl: u64,

    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Pages per extraction request (1–20).
    #[arg(long, env = "PDFCHAT_BATCH_SIZE", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..=20))]
    batch_size: u64,

    /// Maximum concurrent extraction requests.
    #[arg(short, long, env = "PDFCHAT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Largest accepted PDF in megabytes.
    #[arg(long, env = "PDFCHAT_MAX_FILE_MB", default_value_t = 50)]
    max_file_size_mb: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFCHAT_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom chat system prompt.
    #[arg(long, env = "PDFCHAT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per request.
    #[arg(long, env = "PDFCHAT_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Extraction temperature (0.0–2.0).
    #[arg(long, env = "PDFCHAT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Transport retries per extraction request.
    #[arg(long, env = "PDFCHAT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-request LLM timeout in seconds.
    #[arg(long, env = "PDFCHAT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFCHAT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output structured JSON instead of plain text.
    #[arg(long, env = "PDFCHAT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFCHAT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFCHAT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFCHAT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs when it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Ensure PDF engine is available ───────────────────────────────────
    // First run downloads pdfium into the cache dir; later runs only check
    // that the file is there.
    if !engine::is_available_locally() {
        if cli.quiet {
            tokio::task::block_in_place(|| engine::ensure_library(None))
                .context("Failed to download PDF engine")?;
        } else {
            let dl_bar = ProgressBar::new(0);
            dl_bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  \
                     [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(TICKS),
            );
            dl_bar.set_prefix("PDF engine");
            dl_bar.set_message("Connecting…");
            dl_bar.enable_steady_tick(Duration::from_millis(80));

            let bar = dl_bar.clone();
            tokio::task::block_in_place(|| {
                engine::ensure_library(Some(&|downloaded, total| {
                    if let Some(t) = total {
                        if bar.length() != Some(t) {
                            bar.set_length(t);
                        }
                    }
                    bar.set_position(downloaded);
                }))
            })
            .context("Failed to download PDF engine")?;

            dl_bar.finish_with_message("ready ✓");
        }
    }

    // ── Build processor ──────────────────────────────────────────────────
    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn ExtractionProgressCallback>);
    let config = build_config(&cli, progress_cb).await?;

    let cache = match cli.cache_file {
        Some(ref path) => DocumentCache::load(path).context("Failed to load cache file")?,
        None => DocumentCache::new(),
    };
    let processor = DocumentProcessor::new(config)
        .context("Failed to initialise LLM provider")?
        .with_stores(Arc::new(cache), Arc::new(SessionStore::new()));

    // One conversation per process; the transcript is not persisted.
    let session = processor.sessions().create();

    // ── Process ──────────────────────────────────────────────────────────
    let result = processor.process_document(&cli.input, &session).await;
    if let Some(ref cb) = cli_progress {
        cb.finish();
    }

    if let (Some(path), Ok(_)) = (&cli.cache_file, &result) {
        processor
            .cache()
            .persist(path)
            .context("Failed to write cache file")?;
    }

    if cli.json {
        let response = ProcessResponse::from(result);
        let failed = matches!(response, ProcessResponse::Failure { .. });
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to serialise output")?
        );
        if failed {
            std::process::exit(1);
        }
    } else {
        let document = result.context("Extraction failed")?;
        let text = document.text();
        match cli.output {
            Some(ref path) => write_atomic(path, &text).await?,
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(text.as_bytes())
                    .context("Failed to write to stdout")?;
                if !text.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }
        }

        if !cli.quiet {
            let source = if document.from_cache {
                "cache".to_string()
            } else {
                document
                    .stats
                    .as_ref()
                    .map(|s| format!("{}ms", s.total_duration_ms))
                    .unwrap_or_default()
            };
            eprintln!(
                "{}  {}/{} pages  {}",
                if document.is_partial() { cyan("⚠") } else { green("✔") },
                document.pages.len(),
                document.total_pages,
                dim(&source),
            );
        }
    }

    // ── Questions ────────────────────────────────────────────────────────
    for question in &cli.ask {
        let answer = processor
            .ask(&session, question)
            .await
            .context("Chat request failed")?;
        print_answer(question, &answer, cli.quiet);
    }

    if cli.interactive {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            eprint!("{} ", cyan("?"));
            io::stderr().flush().ok();
            let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
                break;
            };
            let question = line.trim();
            match question {
                "" => continue,
                "/quit" | "/exit" => break,
                "/clear" => {
                    processor.clear_session(&session);
                    eprintln!("{}", dim("session cleared; process a document again to chat"));
                    break;
                }
                _ => match processor.ask(&session, question).await {
                    Ok(answer) => print_answer(question, &answer, true),
                    Err(e) => eprintln!("{} {}", red("✗"), e),
                },
            }
        }
    }

    Ok(())
}

fn print_answer(question: &str, answer: &str, quiet: bool) {
    if !quiet {
        eprintln!("{} {}", cyan("?"), bold(question));
    }
    println!("{}", answer.trim_end());
}

/// Atomic write: temp file in the same directory, then rename.
async fn write_atomic(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, text)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .batch_size(cli.batch_size as usize)
        .concurrency(cli.concurrency)
        .cache_ttl_secs(cli.cache_ttl)
        .max_file_size_mb(cli.max_file_size_mb)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.as_str());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.chat_system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
