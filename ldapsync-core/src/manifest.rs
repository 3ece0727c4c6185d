//! Declarative manifest of desired directory entries.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::types::{ManagedEntry, Ownership};

/// Root of a manifest YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub entries: Vec<ManagedEntry>,
}

impl Manifest {
    /// Parse and validate a manifest from a YAML string. `origin` is only used
    /// in error messages.
    pub fn from_yaml(contents: &str, origin: &Path) -> Result<Self, ManifestError> {
        let manifest: Manifest =
            serde_yaml::from_str(contents).map_err(|source| ManifestError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and validate the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents, path)
    }

    /// Reject empty DNs, full-ownership entries without object classes, and
    /// repeated `(dn, ownership)` pairs.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut seen = BTreeSet::new();
        for entry in &self.entries {
            if entry.dn.as_str().trim().is_empty() {
                return Err(ManifestError::EmptyDn);
            }
            if entry.ownership == Ownership::Full && entry.object_classes.is_empty() {
                return Err(ManifestError::MissingObjectClasses {
                    dn: entry.dn.clone(),
                });
            }
            if !seen.insert((entry.dn.clone(), entry.ownership)) {
                return Err(ManifestError::Duplicate {
                    dn: entry.dn.clone(),
                    ownership: entry.ownership,
                });
            }
        }
        Ok(())
    }

    /// The declared entry for `(dn, ownership)`, if any.
    pub fn find(&self, dn: &crate::types::Dn, ownership: Ownership) -> Option<&ManagedEntry> {
        self.entries
            .iter()
            .find(|e| &e.dn == dn && e.ownership == ownership)
    }
}
