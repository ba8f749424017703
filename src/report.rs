//! Run results: per-file outcomes and the terminal summary.

use crate::error::FileError;
use serde::{Deserialize, Serialize};

/// Terminal result of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Files converted to an output document.
    pub processed: usize,
    /// Files that failed to parse or whose output could not be written.
    pub failed: usize,
    /// Whether the run stopped early on a cancellation request.
    pub cancelled: bool,
}

/// What happened to a single input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileOutcome {
    /// The output document was written.
    Converted {
        pages: usize,
        /// Embedded images found across all pages.
        images: usize,
        /// Images that received a remote description.
        described: usize,
        /// Images whose description failed and got a placeholder.
        description_failures: usize,
    },
    /// Output already existed and `overwrite` was off.
    Skipped,
    /// Parse or write failure; the batch continued.
    Failed(FileError),
}

impl FileOutcome {
    /// True for outcomes where the conversion finished with a partial
    /// result (some image descriptions replaced by placeholders).
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            FileOutcome::Converted {
                description_failures,
                ..
            } if *description_failures > 0
        )
    }
}
