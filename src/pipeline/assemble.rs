//! Document assembly: join page blocks into one text file and write it.
//!
//! The layout mirrors what readers of the output expect from a page-ordered
//! transcript: a banner per page, the page text, an image section when the
//! page carried images, and a separator line. Assembly is deterministic
//! text-only work, so it is the easiest stage to pin down with tests.
//!
//! Writes are atomic (temp file + rename) so a crash or cancellation can
//! never leave a truncated document where a good one used to be.

use crate::error::FileError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Separator between page blocks.
const PAGE_SEPARATOR: &str =
    "==================================================";

/// One page's worth of output: extracted text plus rendered image sections
/// (a description or a failure placeholder, one per image, in page order).
#[derive(Debug, Clone)]
pub struct PageBlock {
    pub number: u32,
    pub text: String,
    pub images: Vec<String>,
}

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Render page blocks into the final document.
pub fn render_document(pages: &[PageBlock]) -> String {
    let mut parts: Vec<String> = Vec::new();

    for page in pages {
        parts.push(format!("=== Page {} ===", page.number));

        let text = page.text.trim_end();
        if !text.is_empty() {
            parts.push(text.to_string());
        }

        if !page.images.is_empty() {
            parts.push(format!("--- Images on Page {} ---", page.number));
            for (index, body) in page.images.iter().enumerate() {
                parts.push(format!("[Image {}]\n{}", index + 1, body.trim_end()));
            }
        }

        parts.push(PAGE_SEPARATOR.to_string());
    }

    normalize(&parts.join("\n\n"))
}

/// Collapse runs of blank lines and guarantee a trailing newline.
fn normalize(text: &str) -> String {
    let collapsed = BLANK_RUNS.replace_all(text, "\n\n");
    let mut out = collapsed.trim_end().to_string();
    out.push('\n');
    out
}

/// Output file for an input PDF: `<output_dir>/<base-name>.txt`.
pub fn output_file(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{stem}.txt"))
}

/// Write the document atomically: temp file in the target directory, then
/// rename over the destination.
pub async fn write_document(path: &Path, content: &str) -> Result<(), FileError> {
    let tmp_path = path.with_extension("txt.tmp");

    tokio::fs::write(&tmp_path, content)
        .await
        .map_err(|e| FileError::WriteFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| FileError::WriteFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}
