//! Recorded reconciliation state, one YAML file per managed entry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.ldapsync/
//!   state/                          (mode 0700)
//!     full-<key>.yaml               (mode 0600)
//!     partial-<key>.yaml
//! ```
//!
//! `<key>` is the first 16 hex characters of the SHA-256 of the DN, so the
//! same DN can be recorded once per ownership mode.
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{io_err, StateError};
use crate::types::{Dn, ManagedEntry, Ownership};

/// A managed entry as last observed, plus bookkeeping timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(flatten)]
    pub entry: ManagedEntry,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    pub fn new(entry: ManagedEntry) -> Self {
        let now = Utc::now();
        Self {
            entry,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the recorded entry, keeping `created_at`.
    pub fn refreshed(&self, entry: ManagedEntry) -> Self {
        Self {
            entry,
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.ldapsync/state/`: pure, no I/O.
pub fn state_dir_at(home: &Path) -> PathBuf {
    home.join(".ldapsync").join("state")
}

/// File stem for a record: `<ownership>-<sha256(dn)[..16]>`.
pub fn record_key(dn: &Dn, ownership: Ownership) -> String {
    let digest = hex::encode(Sha256::digest(dn.as_str().as_bytes()));
    format!("{ownership}-{}", &digest[..16])
}

/// `<home>/.ldapsync/state/<key>.yaml`: pure, no I/O.
pub fn record_path_at(home: &Path, dn: &Dn, ownership: Ownership) -> PathBuf {
    state_dir_at(home).join(format!("{}.yaml", record_key(dn, ownership)))
}

/// Create the state directory (mode `0700`) if it does not yet exist.
fn ensure_state_dir(home: &Path) -> Result<PathBuf, StateError> {
    let dir = state_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the record for `(dn, ownership)`.
///
/// Returns `StateError::RecordNotFound` if absent, `StateError::Parse` if
/// the file is malformed.
pub fn load_at(home: &Path, dn: &Dn, ownership: Ownership) -> Result<StateRecord, StateError> {
    let path = record_path_at(home, dn, ownership);
    if !path.exists() {
        return Err(StateError::RecordNotFound {
            dn: dn.clone(),
            ownership,
        });
    }
    read_record(&path)
}

/// `load_at` convenience wrapper.
pub fn load(dn: &Dn, ownership: Ownership) -> Result<StateRecord, StateError> {
    load_at(&home()?, dn, ownership)
}

/// Like [`load_at`], but `Ok(None)` when no record exists.
pub fn find_at(
    home: &Path,
    dn: &Dn,
    ownership: Ownership,
) -> Result<Option<StateRecord>, StateError> {
    match load_at(home, dn, ownership) {
        Ok(record) => Ok(Some(record)),
        Err(StateError::RecordNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Every record under `<home>/.ldapsync/state/`, sorted by DN then ownership.
///
/// Leftover `.tmp` files are ignored.
pub fn list_at(home: &Path) -> Result<Vec<StateRecord>, StateError> {
    let dir = state_dir_at(home);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut records = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        records.push(read_record(&path)?);
    }
    records.sort_by(|a, b| {
        (&a.entry.dn, a.entry.ownership).cmp(&(&b.entry.dn, b.entry.ownership))
    });
    Ok(records)
}

/// `list_at` convenience wrapper.
pub fn list() -> Result<Vec<StateRecord>, StateError> {
    list_at(&home()?)
}

fn read_record(path: &Path) -> Result<StateRecord, StateError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// 3. Save (atomic) / remove
// ---------------------------------------------------------------------------

/// Atomically save `record`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, record: &StateRecord) -> Result<PathBuf, StateError> {
    ensure_state_dir(home)?;
    let path = record_path_at(home, &record.entry.dn, record.entry.ownership);
    let tmp_path = path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(record)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    tracing::debug!(dn = %record.entry.dn, path = %path.display(), "state record saved");
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(record: &StateRecord) -> Result<PathBuf, StateError> {
    save_at(&home()?, record)
}

/// Remove the record for `(dn, ownership)`. Returns `false` if there was none.
pub fn remove_at(home: &Path, dn: &Dn, ownership: Ownership) -> Result<bool, StateError> {
    let path = record_path_at(home, dn, ownership);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            tracing::debug!(dn = %dn, %ownership, "state record removed");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(path, e)),
    }
}

/// `remove_at` convenience wrapper.
pub fn remove(dn: &Dn, ownership: Ownership) -> Result<bool, StateError> {
    remove_at(&home()?, dn, ownership)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, StateError> {
    dirs::home_dir().ok_or(StateError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StateError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StateError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StateError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StateError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
