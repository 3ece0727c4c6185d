//! Rebuilding attribute sets from live directory entries.

use std::collections::BTreeSet;

use tracing::debug;

use ldapsync_core::{AttributeSet, AttributeValue, Dn, FilterPolicy, OBJECT_CLASS};
use ldapsync_directory::DirectoryEntry;

/// Whether the entry's own naming attribute is dropped during read-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdnHandling {
    /// Skip a single-valued attribute whose `name=value` prefixes the DN.
    Exclude,
    Keep,
}

/// Build the managed attribute set from a live entry.
///
/// Filtered names are skipped. With [`RdnHandling::Exclude`], an attribute
/// holding exactly one value whose `name=value` is a literal prefix of `dn`
/// is treated as the entry's RDN and skipped too.
pub fn attributes_from_entry(
    dn: &Dn,
    entry: &DirectoryEntry,
    policy: &FilterPolicy,
    rdn: RdnHandling,
) -> AttributeSet {
    let mut set = AttributeSet::new();
    for (name, values) in &entry.attributes {
        if policy.excludes(name) {
            debug!(attribute = %name, "skipping filtered attribute");
            continue;
        }
        if rdn == RdnHandling::Exclude && values.len() == 1 && dn.starts_with_rdn(name, &values[0])
        {
            debug!(attribute = %name, "skipping RDN attribute");
            continue;
        }
        set.extend(values.iter().map(|v| AttributeValue::new(name.as_str(), v.as_str())));
    }
    set
}

/// Object classes of a live entry, whatever case the server used for the
/// attribute name.
pub fn object_classes(entry: &DirectoryEntry) -> BTreeSet<String> {
    entry
        .attributes
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case(OBJECT_CLASS))
        .flat_map(|(_, values)| values.iter().cloned())
        .collect()
}

/// The owned values that still exist remotely: `(old ∪ new) ∩ live`.
///
/// An empty result means the owned slice was removed by someone else.
pub fn owned_intersection(
    old: &AttributeSet,
    new: &AttributeSet,
    live: &AttributeSet,
) -> AttributeSet {
    old.union(new).intersection(live)
}
