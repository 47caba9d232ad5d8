//! Key-value store capability used by the export and import engines.
//!
//! The engine only ever needs four operations against the store: listing the
//! children of a directory node, reading a leaf, writing a leaf (full replace)
//! and deleting a leaf. Connection setup and authentication belong to the
//! implementation.

#[cfg(test)]
pub mod memory;
pub mod vault;

pub use vault::VaultClient;

use crate::document::Values;

/// Errors reported by a [`KvStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vault returned status {status}: {}", .errors.join("; "))]
    Api { status: u16, errors: Vec<String> },

    #[error("Invalid response from Vault: {0}")]
    InvalidResponse(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

/// Blocking access to a hierarchical key-value store.
///
/// Paths ending in `/` are directory nodes, every other path is a leaf.
pub trait KvStore {
    /// Returns the immediate child names of a directory node.
    ///
    /// Child names that are directories themselves end in `/`. A directory
    /// without children yields an empty list.
    fn list(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Reads the fields stored at a leaf.
    ///
    /// `Ok(None)` means the store answered but holds no data at `path`, which
    /// is distinct from a failed request.
    fn read(&self, path: &str) -> Result<Option<Values>, StoreError>;

    /// Replaces all fields stored at `path` with `values`.
    fn write(&self, path: &str, values: &Values) -> Result<(), StoreError>;

    /// Removes the leaf at `path`.
    fn delete(&self, path: &str) -> Result<(), StoreError>;
}
