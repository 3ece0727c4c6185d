//! Diff engines: turn an (old, new) pair of attribute sets into modify
//! directives.
//!
//! Both engines emit directives in a fixed order (deletes, then adds, then
//! replaces) with attribute names sorted inside each group and values sorted
//! before encoding, so identical inputs always yield identical output.

use std::collections::BTreeSet;

use tracing::debug;

use ldapsync_core::{AttributeSet, CodecTable, Directive, FilterPolicy, Ownership};

/// Diff for an entry whose attributes are wholly owned.
///
/// - a name that disappears completely becomes `Delete(name)`;
/// - a name that appears for the first time becomes `Add(name, values)`;
/// - a name whose value list shifted in any other way becomes
///   `Replace(name, values)` carrying every value from `new`.
pub fn full_diff(
    old: &AttributeSet,
    new: &AttributeSet,
    policy: &FilterPolicy,
    codecs: &CodecTable,
) -> Vec<Directive> {
    let removed = old.difference(new).names();
    let added = new.difference(old).names();
    let kept = new.intersection(old).names();
    let mut changed = BTreeSet::new();

    let mut deletes = Vec::new();
    for name in &removed {
        if policy.excludes(name) {
            debug!(attribute = %name, "skipping filtered attribute");
            continue;
        }
        if added.contains(name) || kept.contains(name) {
            changed.insert(name.clone());
        } else {
            debug!(attribute = %name, "attribute removed");
            deletes.push(Directive::delete_all(name.as_str()));
        }
    }

    let mut adds = Vec::new();
    for name in &added {
        if policy.excludes(name) {
            debug!(attribute = %name, "skipping filtered attribute");
            continue;
        }
        if removed.contains(name) || kept.contains(name) {
            changed.insert(name.clone());
        } else {
            debug!(attribute = %name, "attribute added");
            adds.push(Directive::add(
                name.as_str(),
                codecs.encode_all(name, &new.values_of(name)),
            ));
        }
    }

    let mut replaces = Vec::new();
    for name in &changed {
        if policy.excludes(name) {
            continue;
        }
        debug!(attribute = %name, "attribute changed");
        replaces.push(Directive::replace(
            name.as_str(),
            codecs.encode_all(name, &new.values_of(name)),
        ));
    }

    deletes.into_iter().chain(adds).chain(replaces).collect()
}

/// Diff for an entry where only the declared values are owned.
///
/// Removed values become `Delete(name, values)` and newly owned values
/// become `Add(name, values)`. Never emits `Replace`, which would clobber
/// values that belong to someone else.
pub fn partial_diff(
    old: &AttributeSet,
    new: &AttributeSet,
    policy: &FilterPolicy,
    codecs: &CodecTable,
) -> Vec<Directive> {
    let mut directives = Vec::new();
    for (name, values) in old.difference(new).grouped() {
        if policy.excludes(&name) {
            debug!(attribute = %name, "skipping filtered attribute");
            continue;
        }
        debug!(attribute = %name, count = values.len(), "owned values removed");
        let encoded = codecs.encode_all(&name, &values);
        directives.push(Directive::delete(name, encoded));
    }
    for (name, values) in new.difference(old).grouped() {
        if policy.excludes(&name) {
            debug!(attribute = %name, "skipping filtered attribute");
            continue;
        }
        debug!(attribute = %name, count = values.len(), "owned values added");
        let encoded = codecs.encode_all(&name, &values);
        directives.push(Directive::add(name, encoded));
    }
    directives
}

/// Dispatch to the engine for `ownership`.
pub fn diff(
    ownership: Ownership,
    old: &AttributeSet,
    new: &AttributeSet,
    policy: &FilterPolicy,
    codecs: &CodecTable,
) -> Vec<Directive> {
    match ownership {
        Ownership::Full => full_diff(old, new, policy, codecs),
        Ownership::Partial => partial_diff(old, new, policy, codecs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldapsync_core::codec::UNICODE_PWD;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn set(pairs: &[(&str, &str)]) -> AttributeSet {
        AttributeSet::from_pairs(pairs.iter().copied())
    }

    fn open() -> FilterPolicy {
        FilterPolicy::permissive()
    }

    fn codecs() -> CodecTable {
        CodecTable::default()
    }

    #[rstest]
    #[case(Ownership::Full)]
    #[case(Ownership::Partial)]
    fn diff_of_a_set_with_itself_is_empty(#[case] ownership: Ownership) {
        let s = set(&[("mail", "a@x"), ("mail", "b@x"), ("title", "eng")]);
        assert!(diff(ownership, &s, &s, &open(), &codecs()).is_empty());
    }

    #[test]
    fn from_empty_adds_every_name_once() {
        let s = set(&[("mail", "b@x"), ("mail", "a@x"), ("title", "eng")]);
        assert_eq!(
            full_diff(&AttributeSet::new(), &s, &open(), &codecs()),
            vec![
                Directive::add("mail", vec!["a@x".into(), "b@x".into()]),
                Directive::add("title", vec!["eng".into()]),
            ]
        );
    }

    #[test]
    fn to_empty_deletes_every_name_once() {
        let s = set(&[("mail", "a@x"), ("mail", "b@x"), ("title", "eng")]);
        assert_eq!(
            full_diff(&s, &AttributeSet::new(), &open(), &codecs()),
            vec![Directive::delete_all("mail"), Directive::delete_all("title")]
        );
    }

    #[test]
    fn changed_value_list_is_replaced_in_full_mode() {
        let old = set(&[("a", "1"), ("a", "2")]);
        let new = set(&[("a", "1"), ("a", "3")]);
        assert_eq!(
            full_diff(&old, &new, &open(), &codecs()),
            vec![Directive::replace("a", vec!["1".into(), "3".into()])]
        );
    }

    #[test]
    fn changed_value_list_is_delete_then_add_in_partial_mode() {
        let old = set(&[("a", "1"), ("a", "2")]);
        let new = set(&[("a", "1"), ("a", "3")]);
        assert_eq!(
            partial_diff(&old, &new, &open(), &codecs()),
            vec![
                Directive::delete("a", vec!["2".into()]),
                Directive::add("a", vec!["3".into()]),
            ]
        );
    }

    #[test]
    fn appended_value_replaces_only_that_attribute() {
        let old = set(&[("mail", "a@x"), ("title", "eng")]);
        let new = set(&[("mail", "a@x"), ("title", "eng"), ("title", "lead")]);
        assert_eq!(
            full_diff(&old, &new, &open(), &codecs()),
            vec![Directive::replace("title", vec!["eng".into(), "lead".into()])]
        );
    }

    #[test]
    fn dropped_value_with_survivor_is_replaced() {
        let old = set(&[("mail", "a@x"), ("mail", "b@x")]);
        let new = set(&[("mail", "a@x")]);
        assert_eq!(
            full_diff(&old, &new, &open(), &codecs()),
            vec![Directive::replace("mail", vec!["a@x".into()])]
        );
    }

    #[test]
    fn groups_are_ordered_deletes_adds_replaces() {
        let old = set(&[("sn", "x"), ("title", "eng")]);
        let new = set(&[("mail", "a@x"), ("title", "lead")]);
        let verbs: Vec<&str> = full_diff(&old, &new, &open(), &codecs())
            .iter()
            .map(Directive::verb)
            .collect();
        assert_eq!(verbs, vec!["delete", "add", "replace"]);
    }

    #[test]
    fn filtered_names_never_appear() {
        let old = set(&[("objectClass", "top"), ("mail", "a@x")]);
        let new = set(&[("objectClass", "person"), ("mail", "b@x"), ("sn", "s")]);
        let policy = FilterPolicy::for_object(vec!["sn".to_string()], vec![]);
        assert_eq!(
            full_diff(&old, &new, &policy, &codecs()),
            vec![Directive::replace("mail", vec!["b@x".into()])]
        );
        assert_eq!(
            partial_diff(&old, &new, &policy, &codecs()),
            vec![
                Directive::delete("mail", vec!["a@x".into()]),
                Directive::add("mail", vec!["b@x".into()]),
            ]
        );
    }

    #[test]
    fn allow_list_restricts_names() {
        let new = set(&[("mail", "a@x"), ("sn", "s")]);
        let policy = FilterPolicy::new(vec![], vec!["sn".to_string()]);
        assert_eq!(
            full_diff(&AttributeSet::new(), &new, &policy, &codecs()),
            vec![Directive::add("sn", vec!["s".into()])]
        );
    }

    #[test]
    fn password_values_are_encoded() {
        let new = set(&[(UNICODE_PWD, "pw")]);
        let directives = full_diff(&AttributeSet::new(), &new, &open(), &codecs());
        let expected: Vec<u8> = "\"pw\""
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        assert_eq!(directives[0].values()[0].as_bytes(), expected.as_slice());
    }

    #[test]
    fn partial_removal_of_everything_deletes_only_owned_values() {
        let owned = set(&[("member", "cn=a"), ("member", "cn=b")]);
        assert_eq!(
            partial_diff(&owned, &AttributeSet::new(), &open(), &codecs()),
            vec![Directive::delete("member", vec!["cn=a".into(), "cn=b".into()])]
        );
    }

    #[test]
    fn values_sharing_a_hash_are_still_diffed() {
        let a = "uid=78857f02823724bc,ou=people,dc=example,dc=com";
        let b = "uid=6bfc1382e9ad8853,ou=people,dc=example,dc=com";
        let old = set(&[("member", a)]);
        let new = set(&[("member", a), ("member", b)]);
        assert_eq!(
            full_diff(&old, &new, &open(), &codecs()),
            vec![Directive::replace("member", vec![b.into(), a.into()])]
        );
        assert_eq!(
            partial_diff(&old, &new, &open(), &codecs()),
            vec![Directive::add("member", vec![b.into()])]
        );
    }
}
