//! Manifest pipeline shared by every CLI command.
//!
//! ## `apply`: per declared entry
//!
//! 1. Load the state record for `(dn, ownership)`.
//! 2. Read the live entry back through the recorded snapshot, filtered by
//!    the manifest's skip and select lists.
//! 3. Classify: no record or vanished → create; directives → update;
//!    otherwise unchanged.
//! 4. Unless dry-run, send the request and write the refreshed record.
//!
//! Records with no declared counterpart are deleted afterwards, deepest DN
//! first. The first error aborts the run; entries already applied keep
//! their records and the failing entry's record is left as it was.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use ldapsync_core::{state, Directive, Dn, ManagedEntry, Manifest, Ownership, StateRecord};
use ldapsync_directory::Directory;

use crate::error::ReconcileError;
use crate::reconciler::Reconciler;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened (or would happen) to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Created,
    WouldCreate,
    Updated { directives: Vec<Directive> },
    WouldUpdate { directives: Vec<Directive> },
    Unchanged,
    Deleted,
    WouldDelete,
}

impl EntryOutcome {
    /// Short label used in CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            EntryOutcome::Created => "created",
            EntryOutcome::WouldCreate => "would create",
            EntryOutcome::Updated { .. } => "updated",
            EntryOutcome::WouldUpdate { .. } => "would update",
            EntryOutcome::Unchanged => "unchanged",
            EntryOutcome::Deleted => "deleted",
            EntryOutcome::WouldDelete => "would delete",
        }
    }

    pub fn directives(&self) -> &[Directive] {
        match self {
            EntryOutcome::Updated { directives } | EntryOutcome::WouldUpdate { directives } => {
                directives
            }
            _ => &[],
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, EntryOutcome::Unchanged)
    }
}

/// Outcome for one `(dn, ownership)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub dn: Dn,
    pub ownership: Ownership,
    pub outcome: EntryOutcome,
}

impl EntryReport {
    fn new(entry: &ManagedEntry, outcome: EntryOutcome) -> Self {
        Self {
            dn: entry.dn.clone(),
            ownership: entry.ownership,
            outcome,
        }
    }
}

/// Result of comparing a record with the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    /// The record matches the directory.
    Current,
    /// The directory changed; the record was rewritten.
    Drifted,
    /// The entry (or every owned value) is gone; the record was removed.
    Gone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub dn: Dn,
    pub ownership: Ownership,
    pub status: RefreshStatus,
}

// ---------------------------------------------------------------------------
// plan / apply
// ---------------------------------------------------------------------------

/// Everything `apply` would do, without touching the directory or state.
pub fn plan<D: Directory>(
    reconciler: &mut Reconciler<D>,
    home: &Path,
    manifest: &Manifest,
) -> Result<Vec<EntryReport>, ReconcileError> {
    apply(reconciler, home, manifest, true)
}

/// Converge the directory to `manifest` and record the result under `home`.
pub fn apply<D: Directory>(
    reconciler: &mut Reconciler<D>,
    home: &Path,
    manifest: &Manifest,
    dry_run: bool,
) -> Result<Vec<EntryReport>, ReconcileError> {
    let mut reports = Vec::new();

    for declared in &manifest.entries {
        let record = state::find_at(home, &declared.dn, declared.ownership)?;
        let report = apply_entry(reconciler, home, declared, record, dry_run)?;
        reports.push(report);
    }

    let mut orphans: Vec<StateRecord> = state::list_at(home)?
        .into_iter()
        .filter(|r| manifest.find(&r.entry.dn, r.entry.ownership).is_none())
        .collect();
    sort_deepest_first(&mut orphans);
    for record in orphans {
        let outcome = if dry_run {
            EntryOutcome::WouldDelete
        } else {
            reconciler.delete(&record.entry)?;
            state::remove_at(home, &record.entry.dn, record.entry.ownership)?;
            info!(dn = %record.entry.dn, ownership = %record.entry.ownership, "removed undeclared entry");
            EntryOutcome::Deleted
        };
        reports.push(EntryReport::new(&record.entry, outcome));
    }

    Ok(reports)
}

fn apply_entry<D: Directory>(
    reconciler: &mut Reconciler<D>,
    home: &Path,
    declared: &ManagedEntry,
    record: Option<StateRecord>,
    dry_run: bool,
) -> Result<EntryReport, ReconcileError> {
    // Read through the manifest's filter lists so a name that was skipped
    // when recorded shows up once it is managed.
    let live = match &record {
        Some(r) => reconciler.read(&ManagedEntry {
            skip_attributes: declared.skip_attributes.clone(),
            select_attributes: declared.select_attributes.clone(),
            ..r.entry.clone()
        })?,
        None => None,
    };

    let Some(live) = live else {
        if dry_run {
            return Ok(EntryReport::new(declared, EntryOutcome::WouldCreate));
        }
        let created = reconciler.create(declared)?;
        save(home, record.as_ref(), created)?;
        return Ok(EntryReport::new(declared, EntryOutcome::Created));
    };
    let directives = reconciler.plan(&live, declared);
    if directives.is_empty() {
        debug!(dn = %declared.dn, "entry is up to date");
        if !dry_run && record.as_ref().map(|r| &r.entry) != Some(&live) {
            save(home, record.as_ref(), live)?;
        }
        return Ok(EntryReport::new(declared, EntryOutcome::Unchanged));
    }

    if dry_run {
        return Ok(EntryReport::new(
            declared,
            EntryOutcome::WouldUpdate { directives },
        ));
    }

    match reconciler.update(&live, declared)? {
        Some(updated) => save(home, record.as_ref(), updated)?,
        None => {
            state::remove_at(home, &declared.dn, declared.ownership)?;
        }
    }
    Ok(EntryReport::new(declared, EntryOutcome::Updated { directives }))
}

fn save(home: &Path, previous: Option<&StateRecord>, entry: ManagedEntry) -> Result<(), ReconcileError> {
    let record = match previous {
        Some(prev) => prev.refreshed(entry),
        None => StateRecord::new(entry),
    };
    state::save_at(home, &record)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// refresh / destroy
// ---------------------------------------------------------------------------

/// Re-read every record; rewrite drifted ones and drop vanished ones.
pub fn refresh<D: Directory>(
    reconciler: &mut Reconciler<D>,
    home: &Path,
) -> Result<Vec<RefreshReport>, ReconcileError> {
    let mut reports = Vec::new();
    for record in state::list_at(home)? {
        let status = match reconciler.read(&record.entry)? {
            None => {
                state::remove_at(home, &record.entry.dn, record.entry.ownership)?;
                RefreshStatus::Gone
            }
            Some(live) if live == record.entry => RefreshStatus::Current,
            Some(live) => {
                state::save_at(home, &record.refreshed(live))?;
                RefreshStatus::Drifted
            }
        };
        debug!(dn = %record.entry.dn, ?status, "refreshed record");
        reports.push(RefreshReport {
            dn: record.entry.dn,
            ownership: record.entry.ownership,
            status,
        });
    }
    Ok(reports)
}

/// Delete every recorded entry (deepest DN first) and its record.
pub fn destroy<D: Directory>(
    reconciler: &mut Reconciler<D>,
    home: &Path,
) -> Result<Vec<EntryReport>, ReconcileError> {
    let mut records = state::list_at(home)?;
    sort_deepest_first(&mut records);
    let mut reports = Vec::new();
    for record in records {
        reconciler.delete(&record.entry)?;
        state::remove_at(home, &record.entry.dn, record.entry.ownership)?;
        reports.push(EntryReport::new(&record.entry, EntryOutcome::Deleted));
    }
    Ok(reports)
}

/// Adopt an existing entry and record it with full ownership.
pub fn import<D: Directory>(
    reconciler: &mut Reconciler<D>,
    home: &Path,
    dn: &Dn,
) -> Result<StateRecord, ReconcileError> {
    let entry = reconciler.import(dn)?;
    let record = StateRecord::new(entry);
    state::save_at(home, &record)?;
    Ok(record)
}

/// Partial records before full ones at the same depth, so owned values are
/// released before their entry disappears.
fn sort_deepest_first(records: &mut [StateRecord]) {
    records.sort_by(|a, b| {
        depth(&b.entry.dn)
            .cmp(&depth(&a.entry.dn))
            .then(b.entry.ownership.cmp(&a.entry.ownership))
            .then(a.entry.dn.cmp(&b.entry.dn))
    });
}

fn depth(dn: &Dn) -> usize {
    dn.as_str().split(',').count()
}
