//! Error types for ldapsync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Dn, Ownership};

/// Validation failures for attribute data and search parameters.
#[derive(Debug, Error)]
pub enum AttributeSetError {
    /// An attribute map in a declared set did not hold exactly one entry.
    #[error("attribute map #{index} must hold exactly one key, found {keys}")]
    NotSingleKey { index: usize, keys: usize },

    /// A search depth name outside the accepted spellings.
    #[error("search depth of '{given}' not a valid option; expected one of: {expected}")]
    InvalidScope { given: String, expected: String },
}

/// All errors that can arise from state-store operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse state record at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No record exists for the requested entry.
    #[error("no {ownership} state record for {dn}")]
    RecordNotFound { dn: Dn, ownership: Ownership },
}

/// Errors raised while loading a declarative manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error reading manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("entry {dn} is declared more than once with {ownership} ownership")]
    Duplicate { dn: Dn, ownership: Ownership },

    #[error("entry {dn} has full ownership but declares no object classes")]
    MissingObjectClasses { dn: Dn },

    #[error("entry with an empty DN")]
    EmptyDn,
}

/// Convenience constructor for [`StateError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.into(),
        source,
    }
}
