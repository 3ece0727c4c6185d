//! Error types for ldapsync-reconcile.

use thiserror::Error;

use ldapsync_core::{AttributeSetError, Dn, StateError};
use ldapsync_directory::DirectoryError;

/// All errors that can arise from reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The directory rejected an operation or could not be reached.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Reading or writing a state record failed.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Invalid search parameters.
    #[error(transparent)]
    Validation(#[from] AttributeSetError),

    /// A unique lookup matched more than one entry.
    #[error("filter {filter} returned {count} entries; expected exactly one")]
    MultipleEntries { filter: String, count: usize },

    /// A unique lookup matched nothing.
    #[error("filter {filter} returned no entries")]
    NoEntries { filter: String },

    /// The lookup base does not exist.
    #[error("no such object while searching with filter {filter}")]
    ObjectNotFound { filter: String },

    /// A search result carried no distinguished name.
    #[error("entry returned by filter {filter} has no distinguished name")]
    MissingDn { filter: String },

    /// A managed entry was expected in the directory but is gone.
    #[error("entry {dn} does not exist in the directory")]
    EntryGone { dn: Dn },

    /// Encoding lookup results as JSON failed.
    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
