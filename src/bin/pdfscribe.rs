//! CLI binary for pdfscribe.
//!
//! The control shell: merges flags with the stored settings record, starts
//! the pipeline on a background task, renders progress and log events live,
//! wires Ctrl-C to cooperative cancellation, and persists the effective
//! field values back to the settings store. It performs no PDF or AI logic
//! itself.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfscribe::{
    channel, run, EventStream, FileOutcome, JobConfig, JobEvent, LogLevel, Settings,
    SettingsStore,
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one file
  pdfscribe report.pdf -o out/

  # Convert a directory tree, descriptions enabled
  GEMINI_API_KEY=... pdfscribe --recursive papers/ -o out/

  # Re-run a batch without re-converting finished files
  pdfscribe --recursive --keep-existing papers/ -o out/

  # Re-use the paths and key from the previous run
  pdfscribe

SETTINGS:
  The last-used input path, output path, API key, and recursive flag are
  stored in ~/.pdfscribe/settings.json and used as defaults for any value
  not given on the command line. Pass --no-save-settings to leave the
  stored values untouched.

CANCELLATION:
  Press Ctrl-C to cancel. The in-flight file is abandoned cleanly (its
  previous output, if any, is preserved) and a summary is printed for the
  files that completed.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY      API key for the description service
  PDFSCRIBE_OUTPUT    Default output directory
  PDFSCRIBE_MODEL     Override the description model
"#;

/// Extract text and images from PDFs; describe the images with generative AI.
#[derive(Parser, Debug)]
#[command(
    name = "pdfscribe",
    version,
    about = "Extract text and images from PDFs and describe the images with generative AI",
    long_about = "Extracts per-page text and embedded images from PDF files, sends the images \
to a generative-AI description service, and writes one combined text document per input PDF. \
Missing arguments fall back to the values stored from the previous run.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file or directory to convert. Falls back to the stored setting.
    input: Option<PathBuf>,

    /// Output directory for the .txt documents. Falls back to the stored setting.
    #[arg(short, long, env = "PDFSCRIBE_OUTPUT")]
    output: Option<PathBuf>,

    /// API key for the description service. Falls back to the stored
    /// setting; without any key, image descriptions are skipped.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Descend into subdirectories when the input is a directory.
    #[arg(short, long)]
    recursive: bool,

    /// Force a flat scan even when the stored setting says recursive.
    #[arg(long, conflicts_with = "recursive")]
    no_recursive: bool,

    /// Keep existing output files instead of overwriting them.
    #[arg(long)]
    keep_existing: bool,

    /// Description model identifier.
    #[arg(long, env = "PDFSCRIBE_MODEL", default_value = pdfscribe::DEFAULT_MODEL)]
    model: String,

    /// Retries per image on a transient description failure.
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Per-description-call timeout in seconds.
    #[arg(long, default_value_t = 60)]
    api_timeout: u64,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Do not persist the effective values to the settings store.
    #[arg(long)]
    no_save_settings: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the event stream provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Merge flags over stored settings ─────────────────────────────────
    let store = SettingsStore::open();
    let saved = store.load();

    let input = cli
        .input
        .clone()
        .or_else(|| non_empty(&saved.input_path).map(PathBuf::from));
    let output = cli
        .output
        .clone()
        .or_else(|| non_empty(&saved.output_path).map(PathBuf::from));
    let api_key = cli
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| non_empty(&saved.api_key).map(str::to_string));
    let recursive = if cli.recursive {
        true
    } else if cli.no_recursive {
        false
    } else {
        saved.recursive
    };

    let Some(input) = input else {
        bail!("no input path given — pass a PDF file or directory, or store one with a previous run");
    };
    let Some(output) = output else {
        bail!("no output directory given — pass --output, or store one with a previous run");
    };

    // ── Persist the effective field values ───────────────────────────────
    if !cli.no_save_settings {
        let updated = Settings {
            api_key: api_key.clone().unwrap_or_default(),
            input_path: input.display().to_string(),
            output_path: output.display().to_string(),
            recursive,
        };
        if updated != saved {
            if let Err(e) = store.save(&updated) {
                eprintln!("{} failed to save settings: {e}", cyan("⚠"));
            }
        }
    }

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = JobConfig::builder()
        .input_path(&input)
        .output_path(&output)
        .recursive(recursive)
        .overwrite(!cli.keep_existing)
        .model(&cli.model)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);
    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    let config = builder.build().context("invalid configuration")?;

    // ── Wire events and cancellation ─────────────────────────────────────
    let (events, rx) = channel();
    let cancel = CancellationToken::new();

    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} cancelling — finishing up…", cyan("⚠"));
            cancel_on_signal.cancel();
        }
    });

    let renderer = tokio::spawn(render_events(rx, show_progress, cli.quiet));

    // ── Run ──────────────────────────────────────────────────────────────
    let summary = run(&config, &events, &cancel).await.context("run failed")?;
    drop(events);
    renderer.await.ok();

    // ── Terminal summary ─────────────────────────────────────────────────
    if !cli.quiet {
        let tick = if summary.cancelled {
            cyan("⚠")
        } else if summary.failed == 0 {
            green("✔")
        } else if summary.processed == 0 {
            red("✘")
        } else {
            cyan("⚠")
        };
        let state = if summary.cancelled { "  (cancelled)" } else { "" };
        eprintln!(
            "{tick}  {} converted, {} failed{state}  →  {}",
            bold(&summary.processed.to_string()),
            if summary.failed == 0 {
                summary.failed.to_string()
            } else {
                red(&summary.failed.to_string())
            },
            bold(&output.display().to_string()),
        );
    }

    if summary.processed == 0 && summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// ── Event rendering ──────────────────────────────────────────────────────────

fn make_bar() -> ProgressBar {
    let bar = ProgressBar::new(0); // length set on Started

    let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

    bar.set_style(spinner_style);
    bar.set_prefix("Preparing");
    bar.set_message("Scanning for PDF files…");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Switch to the full progress-bar style once the file count is known.
fn activate_bar(bar: &ProgressBar, total: usize) {
    let progress_style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  \
         [{bar:42.green/238}] {pos:>3}/{len} files  \
         ⏱ {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

    bar.set_length(total as u64);
    bar.set_style(progress_style);
    bar.set_prefix("Converting");
}

/// Drain the event channel into the terminal until the pipeline hangs up.
async fn render_events(mut rx: EventStream, show_progress: bool, quiet: bool) {
    let bar = if show_progress { Some(make_bar()) } else { None };

    while let Some(event) = rx.recv().await {
        match event {
            JobEvent::Started { total_files } => {
                if let Some(bar) = &bar {
                    activate_bar(bar, total_files);
                    bar.println(format!(
                        "{} {}",
                        cyan("◆"),
                        bold(&format!("Converting {total_files} file(s)…"))
                    ));
                }
            }
            JobEvent::Log { level, message } => {
                let line = match level {
                    LogLevel::Info => dim(&message),
                    LogLevel::Warn => format!("{} {message}", cyan("⚠")),
                    LogLevel::Error => format!("{} {}", red("✗"), red(&message)),
                };
                match &bar {
                    Some(bar) => bar.println(line),
                    None if !quiet || matches!(level, LogLevel::Error) => eprintln!("{line}"),
                    None => {}
                }
            }
            JobEvent::FileDone {
                path,
                completed,
                total,
                outcome,
            } => {
                if let Some(bar) = &bar {
                    let name = path.display();
                    let line = match &outcome {
                        FileOutcome::Converted {
                            description_failures,
                            ..
                        } if *description_failures > 0 => format!(
                            "  {} {completed:>3}/{total:<3}  {name}  {}",
                            cyan("⚠"),
                            dim("(some descriptions failed)")
                        ),
                        FileOutcome::Converted { .. } => {
                            format!("  {} {completed:>3}/{total:<3}  {name}", green("✓"))
                        }
                        FileOutcome::Skipped => format!(
                            "  {} {completed:>3}/{total:<3}  {name}  {}",
                            dim("·"),
                            dim("(exists, skipped)")
                        ),
                        FileOutcome::Failed(_) => {
                            format!("  {} {completed:>3}/{total:<3}  {name}", red("✗"))
                        }
                    };
                    bar.println(line);
                    bar.set_position(completed as u64);
                }
            }
            JobEvent::Finished { .. } => {
                if let Some(bar) = &bar {
                    bar.finish_and_clear();
                }
            }
        }
    }
}
