//! Vault Sync Library
//!
//! Export a hierarchical Vault namespace into a flat YAML document and replay
//! such a document back onto Vault.
//!
//! - [`export`] walks a subtree and collects its leaves
//! - [`template`] expands macros in a document source before parsing
//! - [`document`] encodes and decodes the document format
//! - [`import`] applies a document with create/update/delete semantics

pub mod document;
pub mod export;
pub mod import;
pub mod report;
pub mod store;
pub mod template;

pub use document::{CodecError, Document, KeyState, LeafRecord, Values};
pub use export::{export, ExportError, TreeReader};
pub use import::{apply, ImportError};
pub use report::{Skipped, SyncReport};
pub use store::{KvStore, StoreError, VaultClient};
pub use template::{
    Expander, FunctionRegistry, MacroError, MacroLookupError, RegistryError, TemplateError,
};

/// Any failure of an export or import run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Unable to read from Vault: {0}")]
    Export(#[from] ExportError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Exports `prefixes` and renders the result as a document.
pub fn export_document<S, P>(
    store: &S,
    prefixes: &[P],
    ignore_errors: bool,
) -> Result<(Vec<u8>, SyncReport), Error>
where
    S: KvStore + ?Sized,
    P: AsRef<str>,
{
    let (document, report) = export(store, prefixes, ignore_errors)?;
    Ok((document::serialize(&document)?, report))
}

/// Expands, parses and applies a document source.
pub fn import_document<S: KvStore + ?Sized>(
    store: &S,
    registry: &FunctionRegistry,
    source: &[u8],
    ignore_errors: bool,
) -> Result<SyncReport, Error> {
    let expanded = Expander::new(registry).expand_bytes(source)?;
    let document = document::deserialize(&expanded)?;
    tracing::debug!("Parsed {} record(s)", document.len());
    Ok(apply(store, &document, ignore_errors)?)
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
