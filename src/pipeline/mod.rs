//! Pipeline stages for PDF-to-text conversion.
//!
//! Each submodule implements exactly one transformation step. Keeping the
//! stages separate makes each independently testable and lets us swap an
//! implementation (e.g. the parsing backend) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ extract ──▶ describe ──▶ assemble
//! (file set)   (lopdf)     (remote AI)   (write .txt)
//! ```
//!
//! 1. [`discover`] — resolve the user-supplied path into the ordered set of
//!    PDF files for this run
//! 2. [`extract`]  — parse one PDF into per-page text and embedded images;
//!    runs in `spawn_blocking` because parsing is CPU-bound
//! 3. [`describe`] — turn image bytes into natural-language descriptions
//!    with retry/backoff; the only stage with network I/O
//! 4. [`assemble`] — join page blocks into one document and write it
//!    atomically

pub mod assemble;
pub mod describe;
pub mod discover;
pub mod extract;
