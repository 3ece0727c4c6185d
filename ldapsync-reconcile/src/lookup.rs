//! Read-only lookup of a single entry by attribute values.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, error, warn};

use ldapsync_core::{AttributeSet, Dn, FilterPolicy, SearchScope};
use ldapsync_directory::{Directory, ALL_ATTRIBUTES};

use crate::error::ReconcileError;
use crate::readback::{attributes_from_entry, RdnHandling};

/// Attributes consulted, in order, when the server leaves the DN empty.
pub const DN_FALLBACK_ATTRIBUTES: [&str; 4] = ["dn", "DN", "distinguished_name", "distinguishedName"];

/// A search expected to match exactly one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupQuery {
    pub base_dn: String,
    pub scope: SearchScope,
    /// Attribute/value pairs, AND'd together. Values are used verbatim.
    pub search_values: BTreeMap<String, String>,
    pub skip_attributes: BTreeSet<String>,
    pub select_attributes: BTreeSet<String>,
}

impl LookupQuery {
    pub fn new(base_dn: impl Into<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            ..Default::default()
        }
    }

    pub fn scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn search(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.search_values.insert(name.into(), value.into());
        self
    }

    /// `(&(k1=v1)(k2=v2)...)` with keys in sorted order.
    pub fn filter(&self) -> String {
        let clauses: String = self
            .search_values
            .iter()
            .map(|(k, v)| format!("({k}={v})"))
            .collect();
        format!("(&{clauses})")
    }

    fn policy(&self) -> FilterPolicy {
        FilterPolicy::new(
            self.skip_attributes.iter().cloned(),
            self.select_attributes.iter().cloned(),
        )
    }
}

/// The entry a lookup found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    pub dn: Dn,
    pub attributes: AttributeSet,
    /// Per attribute name, its values as a JSON array string.
    pub attributes_json: BTreeMap<String, String>,
}

/// Run `query` and return its single match.
pub fn lookup<D: Directory>(
    directory: &mut D,
    query: &LookupQuery,
) -> Result<LookupResult, ReconcileError> {
    let filter = query.filter();
    debug!(base = %query.base_dn, filter = %filter, scope = %query.scope, "looking up entry");

    let entries = match directory.search(&query.base_dn, query.scope, &filter, &[ALL_ATTRIBUTES]) {
        Ok(entries) => entries,
        Err(e) if e.is_no_such_object() => {
            warn!(filter = %filter, "object not found");
            return Err(ReconcileError::ObjectNotFound { filter });
        }
        Err(e) => return Err(e.into()),
    };

    if entries.len() > 1 {
        error!(filter = %filter, count = entries.len(), "more than one entry matched");
        return Err(ReconcileError::MultipleEntries {
            filter,
            count: entries.len(),
        });
    }
    let Some(found) = entries.into_iter().next() else {
        error!(filter = %filter, "no entry matched");
        return Err(ReconcileError::NoEntries { filter });
    };

    let dn = resolve_dn(&found).ok_or_else(|| {
        error!(filter = %filter, "entry has no distinguished name");
        ReconcileError::MissingDn {
            filter: filter.clone(),
        }
    })?;

    let policy = query.policy();
    let attributes = attributes_from_entry(&dn, &found, &policy, RdnHandling::Keep);
    let mut attributes_json = BTreeMap::new();
    for (name, values) in &found.attributes {
        if policy.excludes(name) {
            continue;
        }
        attributes_json.insert(name.clone(), serde_json::to_string(values)?);
    }

    Ok(LookupResult {
        dn,
        attributes,
        attributes_json,
    })
}

fn resolve_dn(entry: &ldapsync_directory::DirectoryEntry) -> Option<Dn> {
    if !entry.dn.is_empty() {
        return Some(Dn::from(entry.dn.as_str()));
    }
    DN_FALLBACK_ATTRIBUTES
        .iter()
        .filter_map(|key| entry.first(key))
        .find(|v| !v.is_empty())
        .map(Dn::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldapsync_directory::{DirectoryEntry, MemoryDirectory};
    use rstest::rstest;

    fn people() -> MemoryDirectory {
        MemoryDirectory::new()
            .with_entry("dc=example,dc=com", &[("dc", &["example"])])
            .with_entry("ou=people,dc=example,dc=com", &[("ou", &["people"])])
            .with_entry(
                "uid=alice,ou=people,dc=example,dc=com",
                &[
                    ("objectClass", &["inetOrgPerson"]),
                    ("uid", &["alice"]),
                    ("sn", &["Smith"]),
                    ("mail", &["alice@example.com", "a.smith@example.com"]),
                ],
            )
            .with_entry(
                "uid=bob,ou=people,dc=example,dc=com",
                &[
                    ("objectClass", &["inetOrgPerson"]),
                    ("uid", &["bob"]),
                    ("sn", &["Smith"]),
                ],
            )
    }

    #[test]
    fn filter_uses_sorted_keys_and_raw_values() {
        let q = LookupQuery::new("dc=x")
            .search("uid", "a*")
            .search("objectClass", "person");
        assert_eq!(q.filter(), "(&(objectClass=person)(uid=a*))");
        assert_eq!(LookupQuery::new("dc=x").filter(), "(&)");
    }

    #[test]
    fn finds_single_entry_with_json_values() {
        let mut dir = people();
        let q = LookupQuery::new("dc=example,dc=com").search("uid", "alice");
        let found = lookup(&mut dir, &q).expect("lookup");
        assert_eq!(found.dn.as_str(), "uid=alice,ou=people,dc=example,dc=com");
        // the RDN stays in a lookup result
        assert_eq!(found.attributes.values_of("uid"), vec!["alice"]);
        assert_eq!(
            found.attributes_json["mail"],
            r#"["alice@example.com","a.smith@example.com"]"#
        );
    }

    #[test]
    fn skip_and_select_apply_to_both_views() {
        let mut dir = people();
        let mut q = LookupQuery::new("dc=example,dc=com").search("uid", "alice");
        q.select_attributes.insert("mail".into());
        q.select_attributes.insert("sn".into());
        q.skip_attributes.insert("sn".into());
        let found = lookup(&mut dir, &q).expect("lookup");
        assert_eq!(found.attributes.names().into_iter().collect::<Vec<_>>(), vec!["mail"]);
        assert_eq!(found.attributes_json.keys().collect::<Vec<_>>(), vec!["mail"]);
    }

    #[rstest]
    #[case("sn", "Smith")]
    #[case("uid", "carol")]
    fn requires_exactly_one_match(#[case] name: &str, #[case] value: &str) {
        let mut dir = people();
        let q = LookupQuery::new("dc=example,dc=com").search(name, value);
        let err = lookup(&mut dir, &q).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::MultipleEntries { count: 2, .. } | ReconcileError::NoEntries { .. }
        ));
    }

    #[test]
    fn missing_base_is_object_not_found() {
        let mut dir = people();
        let q = LookupQuery::new("ou=gone,dc=example,dc=com").search("uid", "alice");
        let err = lookup(&mut dir, &q).unwrap_err();
        match err {
            ReconcileError::ObjectNotFound { filter } => assert_eq!(filter, "(&(uid=alice))"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn one_level_scope_excludes_grandchildren() {
        let mut dir = people();
        let q = LookupQuery::new("dc=example,dc=com")
            .scope(SearchScope::OneLevel)
            .search("uid", "alice");
        assert!(matches!(
            lookup(&mut dir, &q).unwrap_err(),
            ReconcileError::NoEntries { .. }
        ));
    }

    #[test]
    fn empty_dn_falls_back_to_attributes() {
        let entry = DirectoryEntry::new("").with("distinguishedName", &["cn=x,dc=y"]);
        assert_eq!(resolve_dn(&entry), Some(Dn::from("cn=x,dc=y")));
        assert_eq!(resolve_dn(&DirectoryEntry::new("")), None);
    }
}
