//! Full ownership: the reconciler owns the whole entry.

use ldapsync_core::{Directive, Dn, ManagedEntry, Ownership, SearchScope, WireValue, OBJECT_CLASS};
use ldapsync_directory::{Directory, DirectoryEntry, ALL_ATTRIBUTES, NO_ATTRIBUTES};
use tracing::{debug, info, warn};

use crate::diff::full_diff;
use crate::error::ReconcileError;
use crate::readback::{attributes_from_entry, object_classes, RdnHandling};
use crate::reconciler::Reconciler;

/// Filter used for base-scope reads by DN.
pub(crate) const ANY_OBJECT: &str = "(objectclass=*)";

impl<D: Directory> Reconciler<D> {
    pub(crate) fn create_object(
        &mut self,
        desired: &ManagedEntry,
    ) -> Result<ManagedEntry, ReconcileError> {
        let policy = desired.policy();
        let mut attributes: Vec<(String, Vec<WireValue>)> = vec![(
            OBJECT_CLASS.to_owned(),
            desired.object_classes.iter().map(|c| WireValue::from(c.as_str())).collect(),
        )];
        for (name, values) in desired.attributes.grouped() {
            if policy.excludes(&name) {
                debug!(attribute = %name, "skipping filtered attribute");
                continue;
            }
            let encoded = self.codecs.encode_all(&name, &values);
            attributes.push((name, encoded));
        }

        self.directory.add(desired.dn.as_str(), &attributes)?;
        info!(dn = %desired.dn, attributes = attributes.len(), "created entry");

        self.read_object(desired)?
            .ok_or_else(|| ReconcileError::EntryGone {
                dn: desired.dn.clone(),
            })
    }

    /// Read the live entry; the skip/select lists are taken from `recorded`.
    pub(crate) fn read_object(
        &mut self,
        recorded: &ManagedEntry,
    ) -> Result<Option<ManagedEntry>, ReconcileError> {
        let Some(live) = self.fetch(&recorded.dn)? else {
            return Ok(None);
        };
        let attributes =
            attributes_from_entry(&recorded.dn, &live, &recorded.policy(), RdnHandling::Exclude);
        Ok(Some(ManagedEntry {
            dn: recorded.dn.clone(),
            ownership: Ownership::Full,
            object_classes: object_classes(&live),
            attributes,
            skip_attributes: recorded.skip_attributes.clone(),
            select_attributes: recorded.select_attributes.clone(),
        }))
    }

    /// Base-scope read of every user attribute; `None` on "no such object".
    pub(crate) fn fetch(&mut self, dn: &Dn) -> Result<Option<DirectoryEntry>, ReconcileError> {
        match self
            .directory
            .search(dn.as_str(), SearchScope::Base, ANY_OBJECT, &[ALL_ATTRIBUTES])
        {
            Ok(entries) => Ok(entries.into_iter().next()),
            Err(e) if e.is_no_such_object() => {
                warn!(dn = %dn, "entry no longer exists in the directory");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `true` when `dn` exists. Requests no attributes.
    pub fn exists(&mut self, dn: &Dn) -> Result<bool, ReconcileError> {
        let span = self.op_span(Ownership::Full, "exists", dn);
        let _enter = span.enter();
        match self
            .directory
            .search(dn.as_str(), SearchScope::Base, ANY_OBJECT, &[NO_ATTRIBUTES])
        {
            Ok(entries) => Ok(!entries.is_empty()),
            Err(e) if e.is_no_such_object() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Adopt an existing entry as a full-ownership record.
    pub fn import(&mut self, dn: &Dn) -> Result<ManagedEntry, ReconcileError> {
        let span = self.op_span(Ownership::Full, "import", dn);
        let _enter = span.enter();
        let template = ManagedEntry::new(dn.clone(), Ownership::Full);
        self.read_object(&template)?
            .ok_or_else(|| ReconcileError::EntryGone { dn: dn.clone() })
    }

    /// `Replace(objectClass)` first when the class set changed, then the
    /// attribute diff.
    pub(crate) fn plan_object(&self, old: &ManagedEntry, new: &ManagedEntry) -> Vec<Directive> {
        let mut directives = Vec::new();
        if old.object_classes != new.object_classes {
            debug!(dn = %new.dn, "object classes changed");
            directives.push(Directive::replace(
                OBJECT_CLASS,
                new.object_classes.iter().map(|c| WireValue::from(c.as_str())).collect(),
            ));
        }
        directives.extend(full_diff(
            &old.attributes,
            &new.attributes,
            &new.policy(),
            &self.codecs,
        ));
        directives
    }

    pub(crate) fn delete_object(&mut self, dn: &Dn) -> Result<(), ReconcileError> {
        match self.directory.delete(dn.as_str()) {
            Ok(()) => {
                info!(dn = %dn, "deleted entry");
                Ok(())
            }
            Err(e) if e.is_no_such_object() => {
                warn!(dn = %dn, "entry already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
