//! # pdfscribe
//!
//! Extract text and embedded images from PDF files and describe the images
//! with a generative-AI service, producing one combined text document per
//! input PDF.
//!
//! ## Why this crate?
//!
//! Plain text extraction loses everything a document says through its
//! figures — charts, diagrams, scanned tables, photos. pdfscribe keeps the
//! text extraction cheap and local, and sends only the embedded images to a
//! vision model, appending each returned description to the page it came
//! from. The result is a readable transcript of the whole document, not
//! just its words.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input path
//!  │
//!  ├─ 1. Discover  resolve a file or scan a directory (optionally recursive)
//!  ├─ 2. Extract   per-page text + embedded images via lopdf (spawn_blocking)
//!  ├─ 3. Describe  image bytes → description via the remote service
//!  │               (retry/backoff, rate limiting, duplicate-image cache)
//!  └─ 4. Assemble  page blocks → <base-name>.txt, written atomically
//! ```
//!
//! Progress and log lines flow to the caller over an event channel, and a
//! cancellation token stops the run cleanly between files or pages. One bad
//! file never aborts the batch; one failed API call never aborts a file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfscribe::{channel, run, JobConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JobConfig::builder()
//!         .input_path("reports/")
//!         .output_path("out/")
//!         .recursive(true)
//!         .api_key(std::env::var("GEMINI_API_KEY").unwrap_or_default())
//!         .build()?;
//!
//!     let (events, mut rx) = channel();
//!     let cancel = CancellationToken::new();
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     let summary = run(&config, &events, &cancel).await?;
//!     println!("{} processed, {} failed", summary.processed, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfscribe` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfscribe = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod events;
pub mod job;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod settings;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{JobConfig, JobConfigBuilder, DEFAULT_MODEL};
pub use error::{DescribeError, FileError, PdfScribeError};
pub use events::{channel, EventSink, EventStream, JobEvent, LogLevel};
pub use job::run;
pub use pipeline::describe::{GeminiDescriber, ImageDescriber};
pub use report::{FileOutcome, Summary};
pub use settings::{Settings, SettingsStore};
