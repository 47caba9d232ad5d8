//! Replaying a document onto the store.

use crate::document::{Document, KeyState};
use crate::report::SyncReport;
use crate::store::{KvStore, StoreError};

/// Errors that abort an import.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Unable to write path {key:?}: {source}")]
    Write {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Unable to delete path {key:?}: {source}")]
    Delete {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Applies every record of `document` in order.
///
/// Present records replace the stored fields with `values`, absent records
/// delete the key. Records are applied one at a time and never reordered.
/// With `ignore_errors` a failed record is logged and skipped, otherwise the
/// first failure stops the run; records already applied stay applied.
pub fn apply<S: KvStore + ?Sized>(
    store: &S,
    document: &Document,
    ignore_errors: bool,
) -> Result<SyncReport, ImportError> {
    let mut report = SyncReport::new();

    for record in &document.keys {
        let key = record.key.as_str();
        let result = match record.state {
            KeyState::Absent => store
                .delete(key)
                .map_err(|source| ImportError::Delete {
                    key: key.to_string(),
                    source,
                }),
            KeyState::Present => store
                .write(key, &record.values)
                .map_err(|source| ImportError::Write {
                    key: key.to_string(),
                    source,
                }),
        };

        match result {
            Ok(()) => {
                report.processed += 1;
                match record.state {
                    KeyState::Absent => tracing::debug!(path = %key, "Successfully deleted key"),
                    KeyState::Present => {
                        tracing::debug!(path = %key, "Successfully wrote data to key")
                    }
                }
            }
            Err(e) if ignore_errors => {
                tracing::error!(path = %key, "{}", e);
                report.skip(key, &e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}
