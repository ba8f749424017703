//! Instruction prompt for the image-description service.
//!
//! Kept in one place so the default behaviour can be changed without
//! touching the retry or transport logic, and so tests can inspect the
//! prompt without a network call. Callers override it via
//! [`crate::config::JobConfig::prompt`].

/// Default prompt sent alongside each extracted image.
///
/// Used when `JobConfig::prompt` is `None`.
pub const DEFAULT_DESCRIBE_PROMPT: &str = "\
Analyze this image and provide a brief description covering:

1. The type of content (graph, chart, diagram, photo, logo, ...)
2. The main elements and subject matter
3. Key information or data shown, if applicable
4. Any text or numbers crucial to understanding the content

Be concise but thorough. For graphs and charts, include the key trends
and data points. Respond with the description only, no preamble.";
