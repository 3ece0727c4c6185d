//! The per-entry reconciler.
//!
//! [`Reconciler`] binds a directory client, a codec table and a logging span.
//! Its operations dispatch on the entry's [`Ownership`]; the mode-specific
//! halves live in `object.rs` (full) and `attributes.rs` (partial).
//!
//! Every mutating call sends at most one directory request, so either all
//! computed directives are applied or none are.

use tracing::{info_span, Span};

use ldapsync_core::{CodecTable, Directive, Dn, ManagedEntry, Ownership};
use ldapsync_directory::Directory;

use crate::error::ReconcileError;

pub struct Reconciler<D> {
    pub(crate) directory: D,
    pub(crate) codecs: CodecTable,
    span: Span,
}

impl<D: Directory> Reconciler<D> {
    /// Reconciler with the default codec table and a fresh `reconciler` span.
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            codecs: CodecTable::default(),
            span: info_span!("reconciler"),
        }
    }

    pub fn with_codecs(mut self, codecs: CodecTable) -> Self {
        self.codecs = codecs;
        self
    }

    /// Log every operation inside `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn codecs(&self) -> &CodecTable {
        &self.codecs
    }

    pub fn directory_mut(&mut self) -> &mut D {
        &mut self.directory
    }

    pub fn into_directory(self) -> D {
        self.directory
    }

    pub(crate) fn op_span(&self, ownership: Ownership, op: &'static str, dn: &Dn) -> Span {
        match ownership {
            Ownership::Full => info_span!(parent: &self.span, "ldap_object", op, dn = %dn),
            Ownership::Partial => {
                info_span!(parent: &self.span, "ldap_object_attributes", op, dn = %dn)
            }
        }
    }

    /// Bring `desired` into existence and return it as read back.
    ///
    /// Full ownership adds a new entry; partial ownership adds the declared
    /// values to an entry that must already exist.
    pub fn create(&mut self, desired: &ManagedEntry) -> Result<ManagedEntry, ReconcileError> {
        let span = self.op_span(desired.ownership, "create", &desired.dn);
        let _enter = span.enter();
        match desired.ownership {
            Ownership::Full => self.create_object(desired),
            Ownership::Partial => self.create_attributes(desired),
        }
    }

    /// Current state of a recorded entry, or `None` when it no longer exists
    /// (for partial ownership: when none of the owned values remain).
    pub fn read(&mut self, recorded: &ManagedEntry) -> Result<Option<ManagedEntry>, ReconcileError> {
        let span = self.op_span(recorded.ownership, "read", &recorded.dn);
        let _enter = span.enter();
        match recorded.ownership {
            Ownership::Full => self.read_object(recorded),
            Ownership::Partial => self.read_attributes(&recorded.attributes, recorded),
        }
    }

    /// Directives that would turn `old` into `new`, without sending them.
    pub fn plan(&self, old: &ManagedEntry, new: &ManagedEntry) -> Vec<Directive> {
        match new.ownership {
            Ownership::Full => self.plan_object(old, new),
            Ownership::Partial => self.plan_attributes(old, new),
        }
    }

    /// Apply the changes from `old` to `new` in a single modify request and
    /// return the entry as read back.
    pub fn update(
        &mut self,
        old: &ManagedEntry,
        new: &ManagedEntry,
    ) -> Result<Option<ManagedEntry>, ReconcileError> {
        let span = self.op_span(new.ownership, "update", &new.dn);
        let _enter = span.enter();
        let directives = self.plan(old, new);
        self.send_modify(&new.dn, &directives)?;
        match new.ownership {
            Ownership::Full => self.read_object(new),
            Ownership::Partial => self.read_attributes(&old.attributes, new),
        }
    }

    /// Remove the entry (full) or only its owned values (partial).
    pub fn delete(&mut self, recorded: &ManagedEntry) -> Result<(), ReconcileError> {
        let span = self.op_span(recorded.ownership, "delete", &recorded.dn);
        let _enter = span.enter();
        match recorded.ownership {
            Ownership::Full => self.delete_object(&recorded.dn),
            Ownership::Partial => self.delete_attributes(recorded),
        }
    }

    /// Send `directives` as one modify request; an empty list sends nothing.
    pub(crate) fn send_modify(
        &mut self,
        dn: &Dn,
        directives: &[Directive],
    ) -> Result<(), ReconcileError> {
        if directives.is_empty() {
            tracing::warn!(dn = %dn, "no changes requested; skipping modify");
            return Ok(());
        }
        if let Err(e) = self.directory.modify(dn.as_str(), directives) {
            tracing::error!(dn = %dn, error = %e, "modify rejected");
            return Err(e.into());
        }
        tracing::info!(dn = %dn, changes = directives.len(), "modified entry");
        Ok(())
    }
}
