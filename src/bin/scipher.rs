//! CLI binary for scipher-client.
//!
//! A thin shim over the library crate: `process` runs a full session with a
//! live spinner, the other subcommands map one-to-one onto backend
//! endpoints.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use scipher_client::{
    Backend, ClientConfig, Document, HttpBackend, LifecycleController, LifecycleState, ListQuery,
    ProgressCallback, ScipherError, SessionProgressCallback, StatusSnapshot, UploadFile,
};
use serde::Serialize;
use std::io::{self, Write};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that narrates a session: upload, each status change,
/// transient poll errors, and the final outcome.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style =
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl SessionProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, file_name: &str, size: u64) {
        self.bar.set_prefix("Uploading");
        self.bar
            .set_message(format!("{file_name} ({})", human_bytes(size)));
    }

    fn on_uploaded(&self, document: &Document) {
        self.bar.println(format!(
            "{} Uploaded {}  {}",
            cyan("◆"),
            bold(&document.original_filename),
            dim(&format!("id {}", document.id)),
        ));
        self.bar.set_prefix("Waiting");
        self.bar.set_message("queued for processing");
    }

    fn on_transition(&self, state: &LifecycleState, snapshot: &StatusSnapshot) {
        self.bar.set_prefix(match state {
            LifecycleState::Completed => "Fetching",
            LifecycleState::Failed => "Failed",
            _ => "Processing",
        });
        self.bar.set_message(snapshot.message.clone());
        self.bar
            .println(format!("  {} {}", green("→"), state.as_str()));
    }

    fn on_poll_error(&self, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {}",
            cyan("⚠"),
            dim(&format!("status check failed, retrying: {first_line}"))
        ));
    }

    fn on_content_ready(&self, _document_id: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} Processing complete", green("✔"));
    }

    fn on_failed(&self, _document_id: &str, reason: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), red(reason));
    }
}

fn human_bytes(n: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if n as f64 >= MIB {
        format!("{:.1} MiB", n as f64 / MIB)
    } else if n >= 1024 {
        format!("{:.1} KiB", n as f64 / 1024.0)
    } else {
        format!("{n} B")
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Upload, wait for processing, print the markdown
  scipher process paper.pdf

  # Save the markdown and show the three summary levels
  scipher process paper.pdf -o paper.md --summary

  # Everything as JSON
  scipher process --json paper.pdf > result.json

  # Inspect an existing document
  scipher status 3f2a9c1e-...
  scipher sections 3f2a9c1e-... --type abstract

  # Browse and clean up
  scipher list --status completed --limit 20
  scipher delete 3f2a9c1e-...

ENVIRONMENT VARIABLES:
  SCIPHER_API_URL   Backend base URL (default http://localhost:8080)
  RUST_LOG          Override the log filter (e.g. scipher_client=debug)
"#;

/// Upload papers to a Scipher backend and retrieve the results.
#[derive(Parser, Debug)]
#[command(
    name = "scipher",
    version,
    about = "Upload papers to a Scipher backend and retrieve the results",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend base URL.
    #[arg(long, global = true, env = "SCIPHER_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Status poll interval in milliseconds.
    #[arg(long, global = true, env = "SCIPHER_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "SCIPHER_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SCIPHER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "SCIPHER_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "SCIPHER_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF, wait for processing, and print the result.
    Process {
        /// Local PDF file.
        file: PathBuf,

        /// Write the markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also print the easy / intermediate / technical summaries.
        #[arg(long)]
        summary: bool,

        /// Print document, markdown and summary as one JSON object.
        #[arg(long)]
        json: bool,
    },
    /// Current processing status.
    Status { id: String },
    /// Structured content (text and sections) as JSON.
    Content { id: String },
    /// Rendered markdown.
    Markdown { id: String },
    /// Three-level summary.
    Summary {
        id: String,
        /// Print the raw JSON response.
        #[arg(long)]
        json: bool,
    },
    /// Raw extracted text.
    Text { id: String },
    /// Detected sections.
    Sections {
        id: String,
        /// Only sections of this type (e.g. abstract, introduction).
        #[arg(long = "type")]
        section_type: Option<String>,
    },
    /// Processing jobs recorded for a document.
    Jobs { id: String },
    /// List uploaded documents.
    List {
        #[arg(long, default_value_t = 0)]
        skip: u64,
        #[arg(long, default_value_t = 10)]
        limit: u64,
        /// Only documents with this status.
        #[arg(long)]
        status: Option<String>,
    },
    /// Delete a document and everything derived from it.
    Delete { id: String },
    /// Check that the backend is up.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner narrates `process`; library INFO logs would only
    // interleave with it.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && matches!(cli.command, Command::Process { json: false, .. });
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn SessionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let backend = Arc::new(HttpBackend::new(&config).context("Failed to build HTTP client")?);

    match cli.command {
        Command::Process {
            ref file,
            ref output,
            summary,
            json,
        } => {
            let controller = LifecycleController::new(&config, backend.clone());
            process(&controller, file, output.as_deref(), summary, json, cli.quiet).await?;
        }
        Command::Status { ref id } => {
            let snapshot = backend.status(id).await.context("Status query failed")?;
            println!("{}  {}", bold(snapshot.status.as_str()), snapshot.message);
            if let Some(ref e) = snapshot.error_message {
                println!("{}", red(e));
            }
        }
        Command::Content { ref id } => {
            let content = backend.document(id).await.context("Failed to fetch content")?;
            print_json(&content)?;
        }
        Command::Markdown { ref id } => {
            let markdown = backend.markdown(id).await.context("Failed to fetch markdown")?;
            write_stdout(&markdown)?;
        }
        Command::Summary { ref id, json } => {
            let summary = backend.summary(id).await.context("Failed to fetch summary")?;
            if json {
                print_json(&summary)?;
            } else {
                print_summary(&summary);
            }
        }
        Command::Text { ref id } => {
            let text = backend.text(id).await.context("Failed to fetch text")?;
            write_stdout(&text.text)?;
        }
        Command::Sections {
            ref id,
            ref section_type,
        } => {
            let sections = backend
                .sections(id, section_type.as_deref())
                .await
                .context("Failed to fetch sections")?;
            for section in &sections {
                println!("{} {}", cyan("§"), bold(&section.section_type));
                println!("{}\n", section.content.trim_end());
            }
            if sections.is_empty() && !cli.quiet {
                eprintln!("{}", dim("no sections"));
            }
        }
        Command::Jobs { ref id } => {
            let jobs = backend.jobs(id).await.context("Failed to fetch jobs")?;
            print_json(&jobs)?;
        }
        Command::List {
            skip,
            limit,
            ref status,
        } => {
            let query = ListQuery {
                skip,
                limit,
                status: status.as_deref().map(LifecycleState::from_label),
            };
            let list = backend
                .list_documents(&query)
                .await
                .context("Failed to list documents")?;
            for doc in &list.documents {
                println!(
                    "{}  {:<10}  {}  {}",
                    doc.id,
                    doc.status.as_str(),
                    doc.original_filename,
                    dim(&human_bytes(doc.file_size)),
                );
            }
            if !cli.quiet {
                eprintln!(
                    "{}",
                    dim(&format!(
                        "{} of {} documents{}",
                        list.documents.len(),
                        list.total,
                        if list.has_more() { " (more with --skip)" } else { "" }
                    ))
                );
            }
        }
        Command::Delete { ref id } => {
            let deleted = backend.delete(id).await.context("Delete failed")?;
            println!("{} {}", green("✔"), deleted.message);
        }
        Command::Health => {
            let health = backend.health().await.context("Health check failed")?;
            let mark = if health.is_healthy() { green("✔") } else { red("✘") };
            println!(
                "{mark} {}  {}",
                health.status,
                health.message.as_deref().unwrap_or_default()
            );
            if !health.is_healthy() {
                anyhow::bail!("backend reports status '{}'", health.status);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(cli.api_url.clone())
        .poll_interval_ms(cli.poll_interval_ms)
        .request_timeout_secs(cli.timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[derive(Serialize)]
struct ProcessOutput<'a> {
    document: &'a Document,
    markdown: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    markdown_error: Option<&'a str>,
    summary: Option<&'a scipher_client::Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary_error: Option<&'a str>,
}

async fn process(
    controller: &LifecycleController,
    path: &Path,
    output: Option<&Path>,
    with_summary: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let file = UploadFile::from_path(path).await?;
    let document = controller.submit(Some(file)).await.context("Upload failed")?;

    match controller.wait_until_settled().await {
        Ok(_) => {}
        Err(e @ ScipherError::ProcessingFailed { .. }) => return Err(e.into()),
        Err(e) => return Err(anyhow::Error::new(e).context("Session ended unexpectedly")),
    }
    let artifacts = controller.wait_for_artifacts().await;

    let markdown = artifacts.markdown.data.as_deref().or_else(|| {
        artifacts
            .content
            .data
            .as_ref()
            .map(|c| c.text.as_str())
    });

    if json {
        return print_json(&ProcessOutput {
            document: &document,
            markdown,
            markdown_error: artifacts.markdown.error.as_deref(),
            summary: artifacts.summary.data.as_ref(),
            summary_error: artifacts.summary.error.as_deref(),
        });
    }

    if let Some(ref e) = artifacts.markdown.error {
        if !quiet {
            eprintln!(
                "{} {}",
                cyan("⚠"),
                dim(&format!("markdown unavailable ({e}), showing raw text"))
            );
        }
    }
    let body = markdown.context("The backend returned no content for this document")?;

    match output {
        Some(path) => {
            tokio::fs::write(path, body)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        None => write_stdout(body)?,
    }

    if with_summary {
        match (&artifacts.summary.data, &artifacts.summary.error) {
            (Some(summary), _) => print_summary(summary),
            (None, Some(e)) => eprintln!("{} summary unavailable: {}", red("✘"), e),
            (None, None) => {}
        }
    }
    Ok(())
}

fn print_summary(summary: &scipher_client::Summary) {
    for (label, text) in summary.levels() {
        println!("{}", bold(&format!("── {label} ──")));
        println!("{}\n", text.unwrap_or("(unavailable)"));
    }
    println!(
        "{}",
        dim(&format!(
            "{} chunks, {} source characters",
            summary.chunk_count, summary.source_characters
        ))
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
