//! Attribute sets keyed by a stable content hash.
//!
//! An [`AttributeSet`] holds one [`AttributeValue`] per element; a
//! multi-valued attribute contributes one element per value. Elements are
//! bucketed by [`attribute_hash`] and compared by content within a bucket,
//! so identical pairs collapse into one element while distinct pairs that
//! happen to share a hash stay distinct.
//!
//! On the wire (manifest and state files) a set is a list of single-key maps:
//!
//! ```yaml
//! - mail: alice@example.com
//! - mail: a.smith@example.com
//! - title: engineer
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AttributeSetError;
use crate::types::AttributeValue;

/// Stable hash of one attribute value.
///
/// Computed as the IEEE CRC-32 of `map {"name" := "value";}`, read as a
/// signed 32-bit integer and folded into the non-negative range. `i32::MIN`
/// has no positive counterpart and hashes to `0`.
pub fn attribute_hash(attr: &AttributeValue) -> u32 {
    let rendered = format!("map {{{:?} := {:?};}}", attr.name, attr.value);
    fold(crc32fast::hash(rendered.as_bytes()) as i32)
}

fn fold(signed: i32) -> u32 {
    if signed >= 0 {
        return signed as u32;
    }
    signed.checked_neg().map_or(0, |h| h as u32)
}

/// An unordered collection of attribute values with value-based equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<BTreeMap<String, String>>",
    into = "Vec<BTreeMap<String, String>>"
)]
pub struct AttributeSet {
    // Each bucket is sorted and free of duplicates.
    items: BTreeMap<u32, Vec<AttributeValue>>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `(name, value)` pairs.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(n, v)| AttributeValue::new(n, v))
            .collect()
    }

    /// Insert a value. Returns `false` if an equal element was already
    /// present.
    pub fn insert(&mut self, attr: AttributeValue) -> bool {
        let bucket = self.items.entry(attribute_hash(&attr)).or_default();
        match bucket.binary_search(&attr) {
            Ok(_) => false,
            Err(at) => {
                bucket.insert(at, attr);
                true
            }
        }
    }

    pub fn contains(&self, attr: &AttributeValue) -> bool {
        self.items
            .get(&attribute_hash(attr))
            .is_some_and(|bucket| bucket.binary_search(attr).is_ok())
    }

    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Elements in hash order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeValue> {
        self.items.values().flatten()
    }

    /// Elements present in either set.
    pub fn union(&self, other: &AttributeSet) -> AttributeSet {
        let mut set = self.clone();
        set.extend(other.iter().cloned());
        set
    }

    /// Elements present in both sets.
    pub fn intersection(&self, other: &AttributeSet) -> AttributeSet {
        self.iter().filter(|a| other.contains(a)).cloned().collect()
    }

    /// Elements of `self` absent from `other`.
    pub fn difference(&self, other: &AttributeSet) -> AttributeSet {
        self.iter().filter(|a| !other.contains(a)).cloned().collect()
    }

    /// Distinct attribute names, sorted.
    pub fn names(&self) -> BTreeSet<String> {
        self.iter().map(|a| a.name.clone()).collect()
    }

    /// Every value held under `name`, sorted.
    pub fn values_of(&self, name: &str) -> Vec<String> {
        let mut values: Vec<String> = self
            .iter()
            .filter(|a| a.name == name)
            .map(|a| a.value.clone())
            .collect();
        values.sort();
        values
    }

    /// Values grouped by attribute name; each value list is sorted.
    pub fn grouped(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for attr in self.iter() {
            grouped
                .entry(attr.name.clone())
                .or_default()
                .push(attr.value.clone());
        }
        for values in grouped.values_mut() {
            values.sort();
        }
        grouped
    }

    /// Keep only the elements whose name satisfies `keep`.
    pub fn retain_names(&mut self, mut keep: impl FnMut(&str) -> bool) {
        for bucket in self.items.values_mut() {
            bucket.retain(|a| keep(&a.name));
        }
        self.items.retain(|_, bucket| !bucket.is_empty());
    }
}

impl FromIterator<AttributeValue> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = AttributeValue>>(iter: I) -> Self {
        let mut set = AttributeSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<AttributeValue> for AttributeSet {
    fn extend<I: IntoIterator<Item = AttributeValue>>(&mut self, iter: I) {
        for attr in iter {
            self.insert(attr);
        }
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a AttributeValue;
    type IntoIter = std::iter::Flatten<std::collections::btree_map::Values<'a, u32, Vec<AttributeValue>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values().flatten()
    }
}

impl TryFrom<Vec<BTreeMap<String, String>>> for AttributeSet {
    type Error = AttributeSetError;

    fn try_from(maps: Vec<BTreeMap<String, String>>) -> Result<Self, Self::Error> {
        let mut set = AttributeSet::new();
        for (index, map) in maps.into_iter().enumerate() {
            if map.len() != 1 {
                return Err(AttributeSetError::NotSingleKey {
                    index,
                    keys: map.len(),
                });
            }
            set.extend(map.into_iter().map(|(n, v)| AttributeValue::new(n, v)));
        }
        Ok(set)
    }
}

impl From<AttributeSet> for Vec<BTreeMap<String, String>> {
    fn from(set: AttributeSet) -> Self {
        let mut pairs: Vec<AttributeValue> = set.items.into_values().flatten().collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|a| BTreeMap::from([(a.name, a.value)]))
            .collect()
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        for (name, values) in self.grouped() {
            for value in values {
                writeln!(f, "    {name:?}: {value:?}")?;
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(&str, &str)]) -> AttributeSet {
        AttributeSet::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn hash_is_stable_for_identical_content() {
        let a = AttributeValue::new("mail", "a@x");
        let b = AttributeValue::new(String::from("mail"), String::from("a@x"));
        assert_eq!(attribute_hash(&a), attribute_hash(&b));
        assert_ne!(
            attribute_hash(&a),
            attribute_hash(&AttributeValue::new("mail", "b@x"))
        );
    }

    #[test]
    fn hash_matches_known_checksum() {
        // crc32("map {\"a\" := \"1\";}") folded into i32 range
        let attr = AttributeValue::new("a", "1");
        let raw = crc32fast::hash(br#"map {"a" := "1";}"#) as i32;
        assert_eq!(attribute_hash(&attr), raw.unsigned_abs());
        assert!(attribute_hash(&attr) <= i32::MAX as u32);
    }

    #[test]
    fn fold_keeps_hash_non_negative() {
        assert_eq!(fold(0), 0);
        assert_eq!(fold(-1), 1);
        assert_eq!(fold(i32::MAX), i32::MAX as u32);
        assert_eq!(fold(-i32::MAX), i32::MAX as u32);
        assert_eq!(fold(i32::MIN), 0);
    }

    // Two member DNs whose folded hashes collide.
    const COLLIDING: [&str; 2] = [
        "uid=78857f02823724bc,ou=people,dc=example,dc=com",
        "uid=6bfc1382e9ad8853,ou=people,dc=example,dc=com",
    ];

    #[test]
    fn colliding_values_stay_distinct() {
        let a = AttributeValue::new("member", COLLIDING[0]);
        let b = AttributeValue::new("member", COLLIDING[1]);
        assert_eq!(attribute_hash(&a), attribute_hash(&b));

        let only_a = AttributeSet::from_iter([a.clone()]);
        let both = AttributeSet::from_iter([a.clone(), b.clone()]);
        assert_eq!(both.len(), 2);
        assert!(both.contains(&b));
        assert!(!only_a.contains(&b));
        assert_ne!(only_a, both);
        assert_eq!(both.difference(&only_a), AttributeSet::from_iter([b.clone()]));
        assert_eq!(both.intersection(&only_a), only_a);
        assert_eq!(only_a.union(&AttributeSet::from_iter([b])), both);

        let mut trimmed = both.clone();
        trimmed.retain_names(|n| n != "member");
        assert!(trimmed.is_empty());
    }

    #[test]
    fn name_and_value_are_not_interchangeable() {
        let a = AttributeValue::new("cn", "sn");
        let b = AttributeValue::new("sn", "cn");
        assert_ne!(attribute_hash(&a), attribute_hash(&b));
    }

    #[test]
    fn duplicate_pairs_collapse() {
        let s = set(&[("a", "1"), ("a", "1"), ("a", "2"), ("b", "1")]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.names(), BTreeSet::from(["a".to_string(), "b".to_string()]));
        assert_eq!(s.values_of("a"), vec!["1", "2"]);
    }

    #[test]
    fn set_algebra() {
        let old = set(&[("a", "1"), ("a", "2")]);
        let new = set(&[("a", "1"), ("a", "3")]);
        assert_eq!(old.difference(&new), set(&[("a", "2")]));
        assert_eq!(new.difference(&old), set(&[("a", "3")]));
        assert_eq!(old.intersection(&new), set(&[("a", "1")]));
        assert_eq!(old.union(&new), set(&[("a", "1"), ("a", "2"), ("a", "3")]));
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = set(&[("x", "1"), ("y", "2")]);
        let b = set(&[("y", "2"), ("x", "1")]);
        assert_eq!(a, b);
    }

    #[test]
    fn yaml_shape_is_list_of_single_key_maps() {
        let s = set(&[("mail", "alice"), ("title", "eng")]);
        let yaml = serde_yaml::to_string(&s).expect("serialize");
        assert_eq!(yaml, "- mail: alice\n- title: eng\n");
        let back: AttributeSet = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back, s);
    }

    #[test]
    fn multi_key_map_is_rejected() {
        let err = serde_yaml::from_str::<AttributeSet>("- { a: '1', b: '2' }\n").unwrap_err();
        assert!(err.to_string().contains("exactly one"), "got: {err}");
    }

    #[test]
    fn retain_names_filters_in_place() {
        let mut s = set(&[("a", "1"), ("b", "2")]);
        s.retain_names(|n| n != "a");
        assert_eq!(s, set(&[("b", "2")]));
    }
}
