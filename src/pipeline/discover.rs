//! Input resolution: turn the user-supplied path into the run's file set.
//!
//! A single file must carry the `.pdf` extension (case-insensitive) or the
//! run fails up front — silently producing zero output for a mistyped path
//! is worse than an immediate error. A directory is walked one level deep,
//! or fully when `recursive` is set. The resulting list is sorted
//! lexicographically: enumeration order is not contractually significant,
//! but deterministic order makes runs reproducible and tests stable.

use crate::error::PdfScribeError;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Check whether a path carries the PDF extension.
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Resolve the input path into a sorted list of PDF files.
///
/// # Errors
/// * [`PdfScribeError::InputNotFound`] — the path does not exist
/// * [`PdfScribeError::InvalidInput`] — a file without the PDF extension,
///   or a path that is neither file nor directory
/// * [`PdfScribeError::NoFilesFound`] — a directory with no PDFs in scope
pub fn discover(input: &Path, recursive: bool) -> Result<Vec<PathBuf>, PdfScribeError> {
    if !input.exists() {
        return Err(PdfScribeError::InputNotFound {
            path: input.to_path_buf(),
        });
    }

    if input.is_file() {
        if !is_pdf(input) {
            return Err(PdfScribeError::InvalidInput {
                path: input.to_path_buf(),
                reason: "not a .pdf file".into(),
            });
        }
        return Ok(vec![input.to_path_buf()]);
    }

    if !input.is_dir() {
        return Err(PdfScribeError::InvalidInput {
            path: input.to_path_buf(),
            reason: "neither a file nor a directory".into(),
        });
    }

    let mut walker = WalkDir::new(input).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_pdf(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    if files.is_empty() {
        return Err(PdfScribeError::NoFilesFound {
            path: input.to_path_buf(),
        });
    }

    files.sort();
    debug!("discovered {} PDF file(s) under {}", files.len(), input.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, b"%PDF-1.4 stub").unwrap();
    }

    #[test]
    fn single_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("doc.pdf");
        touch(&pdf);

        let files = discover(&pdf, false).unwrap();
        assert_eq!(files, vec![pdf]);
    }

    #[test]
    fn single_file_wrong_extension_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.docx");
        touch(&doc);

        let err = discover(&doc, false).unwrap_err();
        assert!(matches!(err, PdfScribeError::InvalidInput { .. }));
    }

    #[test]
    fn missing_path_is_not_found() {
        let err = discover(Path::new("/definitely/not/here.pdf"), false).unwrap_err();
        assert!(matches!(err, PdfScribeError::InputNotFound { .. }));
    }

    #[test]
    fn flat_scan_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.pdf"));
        touch(&dir.path().join("a.pdf"));
        touch(&dir.path().join("notes.txt"));
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested").join("deep.pdf"));

        let files = discover(dir.path(), false).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        // Sorted, top-level PDFs only.
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn recursive_scan_finds_nested_files_once() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("top.pdf"));
        fs::create_dir_all(dir.path().join("x").join("y")).unwrap();
        touch(&dir.path().join("x").join("mid.pdf"));
        touch(&dir.path().join("x").join("y").join("deep.pdf"));

        let files = discover(dir.path(), true).unwrap();
        assert_eq!(files.len(), 3);
        // Deterministic lexicographic order.
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("SHOUTY.PDF"));

        let files = discover(dir.path(), false).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn empty_directory_is_no_files_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("readme.md"));

        let err = discover(dir.path(), false).unwrap_err();
        assert!(matches!(err, PdfScribeError::NoFilesFound { .. }));
    }
}
