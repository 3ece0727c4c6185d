//! Partial ownership: the reconciler owns selected values of an entry that
//! someone else created.

use ldapsync_core::{AttributeSet, Directive, ManagedEntry};
use ldapsync_directory::Directory;
use tracing::{debug, info};

use crate::diff::partial_diff;
use crate::error::ReconcileError;
use crate::readback::{attributes_from_entry, owned_intersection, RdnHandling};
use crate::reconciler::Reconciler;

impl<D: Directory> Reconciler<D> {
    pub(crate) fn create_attributes(
        &mut self,
        desired: &ManagedEntry,
    ) -> Result<ManagedEntry, ReconcileError> {
        let policy = desired.policy();
        let mut directives = Vec::new();
        for (name, values) in desired.attributes.grouped() {
            if policy.excludes(&name) {
                debug!(attribute = %name, "skipping filtered attribute");
                continue;
            }
            let encoded = self.codecs.encode_all(&name, &values);
            directives.push(Directive::add(name, encoded));
        }
        if directives.is_empty() {
            return Ok(desired.with_attributes(AttributeSet::new()));
        }
        self.send_modify(&desired.dn, &directives)?;
        info!(dn = %desired.dn, attributes = directives.len(), "added owned values");

        self.read_attributes(&AttributeSet::new(), desired)?
            .ok_or_else(|| ReconcileError::EntryGone {
                dn: desired.dn.clone(),
            })
    }

    /// Owned values still present: `(old ∪ current.attributes) ∩ live`.
    ///
    /// `None` when the entry is gone or none of the owned values remain.
    pub(crate) fn read_attributes(
        &mut self,
        old: &AttributeSet,
        current: &ManagedEntry,
    ) -> Result<Option<ManagedEntry>, ReconcileError> {
        let Some(live) = self.fetch(&current.dn)? else {
            return Ok(None);
        };
        let live = attributes_from_entry(&current.dn, &live, &current.policy(), RdnHandling::Exclude);
        let owned = owned_intersection(old, &current.attributes, &live);
        if owned.is_empty() {
            debug!(dn = %current.dn, "no owned values remain");
            return Ok(None);
        }
        Ok(Some(current.with_attributes(owned)))
    }

    pub(crate) fn plan_attributes(&self, old: &ManagedEntry, new: &ManagedEntry) -> Vec<Directive> {
        partial_diff(&old.attributes, &new.attributes, &new.policy(), &self.codecs)
    }

    /// Remove exactly the recorded values; other values stay.
    pub(crate) fn delete_attributes(&mut self, recorded: &ManagedEntry) -> Result<(), ReconcileError> {
        let directives = partial_diff(
            &recorded.attributes,
            &AttributeSet::new(),
            &recorded.policy(),
            &self.codecs,
        );
        self.send_modify(&recorded.dn, &directives)
    }
}
