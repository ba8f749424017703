//! Error types for the pdfscribe library.
//!
//! Three distinct error types reflect three distinct failure granularities:
//!
//! * [`PdfScribeError`] — **Fatal**: the whole run cannot proceed (bad input
//!   path, no PDF files found, output directory cannot be created). Returned
//!   as `Err(PdfScribeError)` from [`crate::job::run`].
//!
//! * [`FileError`] — **Non-fatal**: a single file failed (unparseable PDF,
//!   output write error) but the rest of the batch is fine. Recorded in the
//!   per-file [`crate::report::FileOutcome`] and counted in the summary.
//!
//! * [`DescribeError`] — **Non-fatal**: one image's remote description call
//!   failed. The output gets a placeholder line and the file continues.
//!
//! The separation lets the shell render partial success honestly: one corrupt
//! file or one rate-limited API call never takes down the batch.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfscribe library.
///
/// File-level failures use [`FileError`] and image-level failures use
/// [`DescribeError`]; both are recorded rather than propagated here.
#[derive(Debug, Error)]
pub enum PdfScribeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input path was not found.
    #[error("input path not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// The input is a file without a recognized PDF extension, or is neither
    /// a file nor a directory.
    #[error("invalid input '{path}': {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    /// A directory input contained no PDF files at all.
    #[error("no PDF files found under '{path}'")]
    NoFilesFound { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output directory does not exist and could not be created.
    #[error("output directory '{path}' is unavailable: {source}")]
    OutputDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (panicked blocking task and the like).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single input file.
///
/// Stored in [`crate::report::FileOutcome`] when a file fails. The batch
/// continues with the next file.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The PDF could not be opened or parsed.
    #[error("failed to parse '{path}': {detail}")]
    ParseFailed { path: PathBuf, detail: String },

    /// The assembled text document could not be written.
    #[error("failed to write output '{path}': {detail}")]
    WriteFailed { path: PathBuf, detail: String },
}

/// A non-fatal error for a single image-description call.
///
/// The failed image gets a bracketed placeholder in the output document and
/// the containing file continues unaffected.
#[derive(Debug, Error)]
pub enum DescribeError {
    /// No API key is configured; descriptions are skipped for the whole run.
    #[error("description service is not configured (no API key)")]
    NotConfigured,

    /// The HTTP request itself failed (connect error, TLS, DNS).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP 429 — the service asked us to slow down.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The call exceeded the configured timeout.
    #[error("description call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service returned a well-formed but empty response.
    #[error("service returned no description")]
    EmptyResponse,
}

impl DescribeError {
    /// Whether a retry has any chance of succeeding.
    ///
    /// Auth failures and missing configuration are permanent; everything
    /// network-shaped is worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            DescribeError::NotConfigured => false,
            DescribeError::Api { status, .. } => *status >= 500,
            DescribeError::RateLimited | DescribeError::Timeout { .. } => true,
            DescribeError::Http(_) | DescribeError::EmptyResponse => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_display() {
        let e = PdfScribeError::InvalidInput {
            path: PathBuf::from("notes.docx"),
            reason: "not a .pdf file".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.docx"), "got: {msg}");
        assert!(msg.contains("not a .pdf file"));
    }

    #[test]
    fn no_files_found_display() {
        let e = PdfScribeError::NoFilesFound {
            path: PathBuf::from("/tmp/empty"),
        };
        assert!(e.to_string().contains("/tmp/empty"));
    }

    #[test]
    fn parse_failed_display() {
        let e = FileError::ParseFailed {
            path: PathBuf::from("bad.pdf"),
            detail: "xref table missing".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("bad.pdf"));
        assert!(msg.contains("xref"));
    }

    #[test]
    fn api_error_transience() {
        let server = DescribeError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        assert!(server.is_transient());

        let auth = DescribeError::Api {
            status: 401,
            message: "bad key".into(),
        };
        assert!(!auth.is_transient());

        assert!(DescribeError::RateLimited.is_transient());
        assert!(!DescribeError::NotConfigured.is_transient());
    }

    #[test]
    fn timeout_display() {
        let e = DescribeError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }
}
