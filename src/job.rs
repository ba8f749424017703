//! The conversion run: enumeration, per-file processing, events, cancellation.
//!
//! [`run`] is the library's primary entry point. It walks the resolved file
//! set one file at a time, reporting progress and log lines through the
//! event sink and polling the cancellation token between files and between
//! pages. Failure handling follows the granularity rules in
//! [`crate::error`]: anything at file or image scope is recorded and the
//! batch continues; only job-scope problems (bad input, unusable output
//! directory) abort the run.

use crate::config::JobConfig;
use crate::error::PdfScribeError;
use crate::events::{self, EventSink, JobEvent, LogLevel};
use crate::pipeline::assemble::{self, PageBlock};
use crate::pipeline::describe::{self, GeminiDescriber, ImageCache, ImageDescriber};
use crate::pipeline::{discover, extract};
use crate::prompts::DEFAULT_DESCRIBE_PROMPT;
use crate::report::{FileOutcome, Summary};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Size of the duplicate-image description cache.
const IMAGE_CACHE_CAPACITY: usize = 1000;

/// Execute one conversion job.
///
/// # Arguments
/// * `config` — immutable job snapshot (see [`JobConfig`])
/// * `events` — sink for progress and log events; drop the receiver to
///   run silently
/// * `cancel` — cooperative cancellation token, polled between files and
///   between pages
///
/// # Returns
/// `Ok(Summary)` even when some files failed (check `summary.failed`), or
/// when the run was cancelled (check `summary.cancelled`).
///
/// # Errors
/// Only job-fatal conditions: invalid input path, no PDF files found, or an
/// output directory that cannot be created.
pub async fn run(
    config: &JobConfig,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<Summary, PdfScribeError> {
    info!("starting job: {:?}", config);

    // The output directory is created up front; failing here is a
    // job-scope configuration problem, not a per-file one.
    tokio::fs::create_dir_all(&config.output_path)
        .await
        .map_err(|e| PdfScribeError::OutputDirUnavailable {
            path: config.output_path.clone(),
            source: e,
        })?;

    let files = discover::discover(&config.input_path, config.recursive)?;
    let total = files.len();

    events::emit(events, JobEvent::Started { total_files: total });
    events::log(
        events,
        LogLevel::Info,
        format!("found {total} PDF file(s) to process"),
    );

    let describer = resolve_describer(config)?;
    if describer.is_none() {
        events::log(
            events,
            LogLevel::Warn,
            "no API key configured; image descriptions are disabled for this run",
        );
    }

    let mut cache = ImageCache::new(IMAGE_CACHE_CAPACITY);
    let mut summary = Summary::default();
    let mut completed = 0usize;

    for path in &files {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            events::log(
                events,
                LogLevel::Warn,
                "cancellation requested; stopping before remaining files",
            );
            break;
        }

        let Some(outcome) =
            process_file(config, describer.as_deref(), &mut cache, path, events, cancel).await
        else {
            // Cancelled mid-file: the file was abandoned before its output
            // write, so it counts neither as processed nor as failed.
            summary.cancelled = true;
            break;
        };

        completed += 1;
        match &outcome {
            FileOutcome::Converted {
                pages,
                described,
                description_failures,
                ..
            } => {
                summary.processed += 1;
                let detail = if *description_failures > 0 {
                    format!(
                        "converted {} ({pages} pages, {described} described, {description_failures} description failure(s))",
                        path.display()
                    )
                } else {
                    format!("converted {} ({pages} pages, {described} image(s) described)", path.display())
                };
                events::log(events, LogLevel::Info, detail);
            }
            FileOutcome::Skipped => {
                events::log(
                    events,
                    LogLevel::Info,
                    format!("skipping {} (output exists)", path.display()),
                );
            }
            FileOutcome::Failed(e) => {
                summary.failed += 1;
                events::log(events, LogLevel::Error, e.to_string());
            }
        }

        events::emit(
            events,
            JobEvent::FileDone {
                path: path.clone(),
                completed,
                total,
                outcome,
            },
        );
    }

    info!(
        "job finished: {} processed, {} failed, cancelled={}",
        summary.processed, summary.failed, summary.cancelled
    );
    events::emit(
        events,
        JobEvent::Finished {
            summary: summary.clone(),
        },
    );

    Ok(summary)
}

/// Resolve the image describer, from most-specific to least-specific.
///
/// 1. **Pre-built describer** (`config.describer`) — the caller constructed
///    it entirely; used as-is. The seam for tests and custom transports.
/// 2. **Job API key** (`config.api_key`) — from the shell's settings/flags.
/// 3. **`GEMINI_API_KEY` environment variable** — convenient for scripted
///    runs with no stored settings.
/// 4. **None** — descriptions are skipped; text extraction still runs.
fn resolve_describer(
    config: &JobConfig,
) -> Result<Option<Arc<dyn ImageDescriber>>, PdfScribeError> {
    if let Some(ref describer) = config.describer {
        return Ok(Some(Arc::clone(describer)));
    }

    let key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()));

    match key {
        Some(key) => {
            let prompt = config
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIBE_PROMPT.to_string());
            let describer = GeminiDescriber::new(
                key,
                &config.model,
                prompt,
                config.api_timeout_secs,
                config.min_request_interval_ms,
            )
            .map_err(|e| PdfScribeError::Internal(format!("failed to build HTTP client: {e}")))?;
            Ok(Some(Arc::new(describer)))
        }
        None => Ok(None),
    }
}

/// Process one file end to end.
///
/// Returns `None` when cancellation was observed mid-file: the file is
/// abandoned before its output write, leaving any previous output intact.
async fn process_file(
    config: &JobConfig,
    describer: Option<&dyn ImageDescriber>,
    cache: &mut ImageCache,
    path: &Path,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Option<FileOutcome> {
    let out_path = assemble::output_file(&config.output_path, path);
    if !config.overwrite && out_path.exists() {
        return Some(FileOutcome::Skipped);
    }

    events::log(events, LogLevel::Info, format!("processing {}", path.display()));

    let doc = match extract::extract(path).await {
        Ok(doc) => doc,
        Err(e) => return Some(FileOutcome::Failed(e)),
    };

    let mut blocks: Vec<PageBlock> = Vec::with_capacity(doc.pages.len());
    let mut images = 0usize;
    let mut described = 0usize;
    let mut description_failures = 0usize;

    for page in &doc.pages {
        if cancel.is_cancelled() {
            events::log(
                events,
                LogLevel::Warn,
                format!("cancellation requested; abandoning {}", path.display()),
            );
            return None;
        }

        let mut sections: Vec<String> = Vec::new();
        for (index, image) in page.images.iter().enumerate() {
            images += 1;

            let Some(describer) = describer else {
                continue;
            };

            if let Some(hit) = cache.get(&image.data) {
                described += 1;
                sections.push(hit.to_string());
                continue;
            }

            match describe::describe_with_retry(
                describer,
                image,
                config.max_retries,
                config.retry_backoff_ms,
            )
            .await
            {
                Ok(text) => {
                    cache.insert(&image.data, text.clone());
                    described += 1;
                    sections.push(text);
                }
                Err(e) => {
                    description_failures += 1;
                    warn!(
                        "image {} on page {} of {}: {e}",
                        index + 1,
                        page.number,
                        path.display()
                    );
                    sections.push(format!("(description unavailable: {e})"));
                }
            }
        }

        blocks.push(PageBlock {
            number: page.number,
            text: page.text.clone(),
            images: sections,
        });
    }

    let content = assemble::render_document(&blocks);
    match assemble::write_document(&out_path, &content).await {
        Ok(()) => Some(FileOutcome::Converted {
            pages: blocks.len(),
            images,
            described,
            description_failures,
        }),
        Err(e) => Some(FileOutcome::Failed(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DescribeError;
    use crate::pipeline::extract::ImageBlob;
    use async_trait::async_trait;

    struct FixedDescriber;

    #[async_trait]
    impl ImageDescriber for FixedDescriber {
        async fn describe(&self, _image: &ImageBlob) -> Result<String, DescribeError> {
            Ok("fixed".into())
        }
    }

    #[test]
    fn prebuilt_describer_takes_precedence() {
        let config = JobConfig::builder()
            .input_path("in.pdf")
            .output_path("out")
            .api_key("unused-key")
            .describer(Arc::new(FixedDescriber))
            .build()
            .unwrap();

        let resolved = resolve_describer(&config).unwrap();
        assert!(resolved.is_some());
    }

    #[test]
    fn api_key_builds_a_gemini_describer() {
        let config = JobConfig::builder()
            .input_path("in.pdf")
            .output_path("out")
            .api_key("test-key")
            .build()
            .unwrap();

        let resolved = resolve_describer(&config).unwrap();
        assert!(resolved.is_some());
    }
}
