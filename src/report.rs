//! Outcome of an export or import run.

/// A path that was skipped because its failure was masked by `ignore_errors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub path: String,
    pub reason: String,
}

/// Counts of processed records plus every masked failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records exported or applied successfully
    pub processed: usize,
    /// Masked failures, in the order they happened
    pub skipped: Vec<Skipped>,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn skip(&mut self, path: impl Into<String>, reason: impl ToString) {
        self.skipped.push(Skipped {
            path: path.into(),
            reason: reason.to_string(),
        });
    }

    /// Returns true if any failure was masked during the run.
    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty()
    }
}
