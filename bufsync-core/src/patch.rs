//! Applies edit scripts to a [`GapBuffer`].

use bufsync_types::{Diff, DiffType};
use thiserror::Error;

use crate::gap_buffer::{GapBuffer, GapBufferError};

/// Error applying an edit script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("diff {index} failed: {source}")]
pub struct PatchError {
    /// Position of the failing diff in the script.
    pub index: usize,
    /// What went wrong.
    #[source]
    pub source: GapBufferError,
}

/// Applies ordered insert/delete scripts.
///
/// Deleted bytes are checked against the script, so a diff computed
/// against different contents fails instead of silently corrupting the
/// buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Patcher;

impl Patcher {
    /// Create a patcher.
    pub fn new() -> Self {
        Self
    }

    /// Apply `diffs` front-to-back.
    ///
    /// Stops at the first failing diff; earlier diffs stay applied.
    pub fn apply(&self, buf: &mut GapBuffer, diffs: &[Diff]) -> Result<(), PatchError> {
        for (index, diff) in diffs.iter().enumerate() {
            let result = match diff.kind {
                DiffType::Insert => buf.insert(diff.offset, &diff.text),
                DiffType::Delete => buf.delete(diff.offset, &diff.text, true),
            };
            result.map_err(|source| PatchError { index, source })?;
        }
        Ok(())
    }
}
