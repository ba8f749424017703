//! Configuration types for a conversion job.
//!
//! All pipeline behaviour is controlled through [`JobConfig`], built via its
//! [`JobConfigBuilder`]. The config is an immutable snapshot: the shell
//! constructs it once from user input plus stored settings, hands it to
//! [`crate::job::run`], and never mutates it while the run is in flight.
//!
//! # Design choice: builder over constructor
//! Most callers only care about the four user-facing fields (input, output,
//! API key, recursive). The builder lets them set exactly those and rely on
//! documented defaults for the retry/rate-limit knobs.

use crate::error::PdfScribeError;
use crate::pipeline::describe::ImageDescriber;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default description model, matching the service's current fast tier.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for one conversion job.
///
/// Built via [`JobConfig::builder()`].
///
/// # Example
/// ```rust
/// use pdfscribe::JobConfig;
///
/// let config = JobConfig::builder()
///     .input_path("papers/")
///     .output_path("out/")
///     .recursive(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct JobConfig {
    /// A single PDF file or a directory to scan.
    pub input_path: PathBuf,

    /// Directory receiving one `<base-name>.txt` per input file.
    /// Created if missing; creation failure aborts the run.
    pub output_path: PathBuf,

    /// Descend into subdirectories when `input_path` is a directory.
    pub recursive: bool,

    /// Replace existing output files. Default: true.
    ///
    /// When false, a file whose output already exists is skipped with a log
    /// line instead of being re-converted — useful for resuming an
    /// interrupted batch without paying for the API calls again.
    pub overwrite: bool,

    /// API key for the description service. None disables descriptions:
    /// the run still extracts text, it just never calls the network.
    pub api_key: Option<String>,

    /// Description model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Pre-constructed describer. Takes precedence over `api_key`.
    ///
    /// The seam used by tests and by callers that need custom middleware
    /// (caching proxies, alternative providers).
    pub describer: Option<Arc<dyn ImageDescriber>>,

    /// Custom description prompt. If None, uses the built-in default.
    pub prompt: Option<String>,

    /// Retry attempts after the first failed description call. Default: 2.
    ///
    /// 5xx and timeout errors are usually transient; two retries catch the
    /// vast majority without stalling the batch. Permanent errors (bad API
    /// key, 400) are not retried — the placeholder is written immediately.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Minimum spacing between description calls in milliseconds. Default: 1000.
    ///
    /// The free tier of the description service enforces a low
    /// requests-per-minute quota; client-side spacing avoids burning retries
    /// on 429 responses.
    pub min_request_interval_ms: u64,

    /// Per-description-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_path: PathBuf::new(),
            recursive: false,
            overwrite: true,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            describer: None,
            prompt: None,
            max_retries: 2,
            retry_backoff_ms: 500,
            min_request_interval_ms: 1000,
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("input_path", &self.input_path)
            .field("output_path", &self.output_path)
            .field("recursive", &self.recursive)
            .field("overwrite", &self.overwrite)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("describer", &self.describer.as_ref().map(|_| "<dyn ImageDescriber>"))
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("min_request_interval_ms", &self.min_request_interval_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl JobConfig {
    /// Create a new builder for `JobConfig`.
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`JobConfig`].
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input_path = path.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.config.overwrite = v;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn describer(mut self, describer: Arc<dyn ImageDescriber>) -> Self {
        self.config.describer = Some(describer);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn min_request_interval_ms(mut self, ms: u64) -> Self {
        self.config.min_request_interval_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<JobConfig, PdfScribeError> {
        let c = &self.config;
        if c.input_path.as_os_str().is_empty() {
            return Err(PdfScribeError::InvalidConfig(
                "input path must not be empty".into(),
            ));
        }
        if c.output_path.as_os_str().is_empty() {
            return Err(PdfScribeError::InvalidConfig(
                "output path must not be empty".into(),
            ));
        }
        if c.model.is_empty() {
            return Err(PdfScribeError::InvalidConfig(
                "model must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
