//! Per-attribute participation policy.

use std::collections::BTreeSet;

use crate::types::OBJECT_CLASS;

/// Decides whether an attribute name takes part in reconciliation.
///
/// A name on the deny list is never touched. When the allow list is
/// non-empty, any name missing from it is excluded as well, so a name on both
/// lists stays excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    deny: BTreeSet<String>,
    allow: BTreeSet<String>,
}

impl FilterPolicy {
    pub fn new(
        deny: impl IntoIterator<Item = String>,
        allow: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            deny: deny.into_iter().collect(),
            allow: allow.into_iter().collect(),
        }
    }

    /// Policy for whole-object reconciliation: `objectClass` is always denied.
    pub fn for_object(
        deny: impl IntoIterator<Item = String>,
        allow: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut policy = Self::new(deny, allow);
        policy.deny.insert(OBJECT_CLASS.to_owned());
        policy
    }

    /// Policy that lets every name through.
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn excludes(&self, name: &str) -> bool {
        if !self.allow.is_empty() && !self.allow.contains(name) {
            return true;
        }
        self.deny.contains(name)
    }

    pub fn includes(&self, name: &str) -> bool {
        !self.excludes(name)
    }

    pub fn deny(&self) -> &BTreeSet<String> {
        &self.deny
    }

    pub fn allow(&self) -> &BTreeSet<String> {
        &self.allow
    }
}
