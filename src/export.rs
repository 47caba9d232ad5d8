//! Flattening a store subtree into leaf records.

use crate::document::{Document, LeafRecord};
use crate::report::SyncReport;
use crate::store::{KvStore, StoreError};

/// Errors that abort an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Invalid export path {0:?}")]
    InvalidPrefix(String),

    #[error("Error listing {path}: {source}")]
    List {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Unable to read path {path:?}: {source}")]
    Read {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Unable to read non-existent path {path}")]
    NotFound { path: String },
}

/// Turns a user supplied prefix into a directory path.
///
/// One leading `/` is dropped and the result always ends in exactly one `/`.
pub fn normalize_prefix(prefix: &str) -> Result<String, ExportError> {
    let path = prefix.strip_prefix('/').unwrap_or(prefix);
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return Err(ExportError::InvalidPrefix(prefix.to_string()));
    }
    Ok(format!("{path}/"))
}

/// Depth-first reader over a store namespace.
///
/// Children are visited in the order the store lists them. With
/// `ignore_errors`, failed listings and leaves without data are logged and
/// skipped; a failed leaf read always aborts.
pub struct TreeReader<'a, S: KvStore + ?Sized> {
    store: &'a S,
    ignore_errors: bool,
    report: SyncReport,
}

impl<'a, S: KvStore + ?Sized> TreeReader<'a, S> {
    pub fn new(store: &'a S, ignore_errors: bool) -> Self {
        Self {
            store,
            ignore_errors,
            report: SyncReport::new(),
        }
    }

    /// Appends every leaf below `prefix` to `out`.
    pub fn read_subtree(&mut self, prefix: &str, out: &mut Document) -> Result<(), ExportError> {
        let mut pending = vec![normalize_prefix(prefix)?];

        while let Some(path) = pending.pop() {
            if path.ends_with('/') {
                let children = self.list(&path)?;
                // reversed so the first child is visited first
                for child in children.iter().rev() {
                    if child.is_empty() {
                        tracing::warn!(path = %path, "Ignoring empty child name");
                        continue;
                    }
                    pending.push(format!("{path}{child}"));
                }
            } else if let Some(record) = self.read(&path)? {
                out.push(record);
                self.report.processed += 1;
            }
        }

        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<Vec<String>, ExportError> {
        match self.store.list(path) {
            Ok(children) => Ok(children),
            Err(e) if self.ignore_errors => {
                tracing::error!(path = %path, "Error listing path: {}", e);
                self.report.skip(path, &e);
                Ok(Vec::new())
            }
            Err(source) => Err(ExportError::List {
                path: path.to_string(),
                source,
            }),
        }
    }

    fn read(&mut self, path: &str) -> Result<Option<LeafRecord>, ExportError> {
        let data = self.store.read(path).map_err(|source| ExportError::Read {
            path: path.to_string(),
            source,
        })?;

        match data {
            Some(values) => {
                tracing::debug!(path = %path, "Successfully read data from key");
                Ok(Some(LeafRecord::present(path, values)))
            }
            None if self.ignore_errors => {
                tracing::info!(path = %path, "Unable to read nil secret");
                self.report.skip(path, "no data at path");
                Ok(None)
            }
            None => Err(ExportError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    pub fn report(&self) -> &SyncReport {
        &self.report
    }

    pub fn into_report(self) -> SyncReport {
        self.report
    }
}

/// Exports every prefix in order into a single document.
///
/// Each prefix is exhausted before the next begins. Nothing is returned if
/// any prefix fails.
pub fn export<S, P>(
    store: &S,
    prefixes: &[P],
    ignore_errors: bool,
) -> Result<(Document, SyncReport), ExportError>
where
    S: KvStore + ?Sized,
    P: AsRef<str>,
{
    let mut reader = TreeReader::new(store, ignore_errors);
    let mut document = Document::new();

    for prefix in prefixes {
        reader.read_subtree(prefix.as_ref(), &mut document)?;
    }

    Ok((document, reader.into_report()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Values;
    use crate::store::memory::{Call, MemoryStore};
    use serde_json::json;

    fn values(v: serde_json::Value) -> Values {
        v.as_object().unwrap().clone()
    }

    fn keys(document: &Document) -> Vec<&str> {
        document.keys.iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("secret").unwrap(), "secret/");
        assert_eq!(normalize_prefix("/secret").unwrap(), "secret/");
        assert_eq!(normalize_prefix("secret/").unwrap(), "secret/");
        assert_eq!(normalize_prefix("/secret/app//").unwrap(), "secret/app/");
        assert!(matches!(
            normalize_prefix("/"),
            Err(ExportError::InvalidPrefix(_))
        ));
        assert!(normalize_prefix("").is_err());
    }

    #[test]
    fn test_export_completeness() {
        let store = MemoryStore::new()
            .with("p/a", values(json!({"v": "a"})))
            .with("p/b", values(json!({"v": "b"})))
            .with("p/c", values(json!({"v": "c", "n": 3})))
            .with("other/x", values(json!({"v": "x"})));

        let (document, report) = export(&store, &["p"], false).unwrap();
        assert_eq!(keys(&document), vec!["p/a", "p/b", "p/c"]);
        assert_eq!(document.keys[2].values, values(json!({"v": "c", "n": 3})));
        assert!(document.keys.iter().all(|r| r.state.is_present()));
        assert_eq!(report.processed, 3);
        assert!(!report.has_skips());
    }

    #[test]
    fn test_nested_directories_depth_first_in_store_order() {
        let store = MemoryStore::new()
            .with("secret/z", values(json!({"k": 1})))
            .with("secret/app/db", values(json!({"k": 2})))
            .with("secret/app/deep/key", values(json!({"k": 3})))
            .with("secret/app/api", values(json!({"k": 4})))
            .with("secret/a", values(json!({"k": 5})));

        let (document, _) = export(&store, &["/secret"], false).unwrap();
        assert_eq!(
            keys(&document),
            vec![
                "secret/z",
                "secret/app/db",
                "secret/app/deep/key",
                "secret/app/api",
                "secret/a"
            ]
        );
    }

    #[test]
    fn test_prefixes_are_concatenated_in_order() {
        let store = MemoryStore::new()
            .with("a/1", values(json!({"k": 1})))
            .with("b/1", values(json!({"k": 2})));

        let (document, _) = export(&store, &["b", "a"], false).unwrap();
        assert_eq!(keys(&document), vec!["b/1", "a/1"]);
    }

    #[test]
    fn test_empty_directory_yields_no_records() {
        let store = MemoryStore::new();
        let (document, report) = export(&store, &["empty"], false).unwrap();
        assert!(document.is_empty());
        assert_eq!(report, SyncReport::default());
    }

    #[test]
    fn test_list_failure_aborts_without_ignore_errors() {
        let store = MemoryStore::new()
            .with("s/bad/x", values(json!({"k": 1})))
            .with("s/good", values(json!({"k": 2})))
            .failing_list("s/bad/");

        let err = export(&store, &["s"], false).unwrap_err();
        assert!(matches!(err, ExportError::List { ref path, .. } if path == "s/bad/"));
        assert!(!store.calls().contains(&Call::Read("s/good".to_string())));
    }

    #[test]
    fn test_list_failure_is_skipped_with_ignore_errors() {
        let store = MemoryStore::new()
            .with("s/bad/x", values(json!({"k": 1})))
            .with("s/good", values(json!({"k": 2})))
            .failing_list("s/bad/");

        let (document, report) = export(&store, &["s"], true).unwrap();
        assert_eq!(keys(&document), vec!["s/good"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, "s/bad/");
    }

    #[test]
    fn test_missing_leaf_data_is_not_found() {
        let store = MemoryStore::new()
            .with_phantom("s/ghost")
            .with("s/real", values(json!({"k": 1})));

        let err = export(&store, &["s"], false).unwrap_err();
        assert!(matches!(err, ExportError::NotFound { ref path } if path == "s/ghost"));
    }

    #[test]
    fn test_missing_leaf_data_is_skipped_with_ignore_errors() {
        let store = MemoryStore::new()
            .with_phantom("s/ghost")
            .with("s/real", values(json!({"k": 1})));

        let (document, report) = export(&store, &["s"], true).unwrap();
        assert_eq!(keys(&document), vec!["s/real"]);
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped[0].path, "s/ghost");
    }

    /// Listing failures can be masked but leaf read failures never are.
    #[test]
    fn test_leaf_read_failure_is_fatal_even_with_ignore_errors() {
        let store = MemoryStore::new()
            .with("s/a", values(json!({"k": 1})))
            .with("s/b", values(json!({"k": 2})))
            .failing_read("s/a");

        let err = export(&store, &["s"], true).unwrap_err();
        assert!(matches!(err, ExportError::Read { ref path, .. } if path == "s/a"));
        assert!(!store.calls().contains(&Call::Read("s/b".to_string())));
    }

    #[test]
    fn test_reader_appends_to_existing_document() {
        let store = MemoryStore::new().with("s/a", values(json!({"k": 1})));
        let mut document = Document::new();
        document.push(LeafRecord::absent("earlier"));

        let mut reader = TreeReader::new(&store, false);
        reader.read_subtree("s", &mut document).unwrap();
        assert_eq!(keys(&document), vec!["earlier", "s/a"]);
        assert_eq!(reader.report().processed, 1);
    }
}
