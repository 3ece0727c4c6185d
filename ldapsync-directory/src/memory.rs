//! In-process [`Directory`] with LDAP result-code semantics.
//!
//! Behaviour mirrors what a real server does for the operations the
//! reconciler issues:
//!
//! - `add` fails with 68 when the entry exists and populates the RDN
//!   attribute from the DN when the caller omitted it;
//! - `modify` applies all directives or none, failing with 32 (no entry),
//!   16 (deleting an absent attribute or value) or 20 (adding a value that
//!   is already present);
//! - `delete` fails with 32 for a missing entry and 66 for a non-leaf;
//! - `search` fails with 32 when the base entry is missing and understands
//!   `&`, `|`, `!`, presence and equality filters with `*` wildcards.
//!
//! DNs and attribute names compare case-insensitively; values compare
//! exactly. Parent entries are not required to exist.

use std::collections::BTreeMap;

use ldapsync_core::{Directive, SearchScope, WireValue};

use crate::error::{
    DirectoryError, ALREADY_EXISTS, ATTRIBUTE_OR_VALUE_EXISTS, NO_SUCH_ATTRIBUTE, NO_SUCH_OBJECT,
};
use crate::{Directory, DirectoryEntry, ALL_ATTRIBUTES, NO_ATTRIBUTES};

/// LDAP result code for "not allowed on non-leaf".
const NOT_ALLOWED_ON_NON_LEAF: u32 = 66;

/// A call received by a [`MemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Search { base: String, filter: String },
    Add { dn: String },
    Modify { dn: String, directives: Vec<Directive> },
    Delete { dn: String },
}

impl Operation {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::Search { .. })
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    dn: String,
    attributes: BTreeMap<String, Vec<String>>,
}

/// An in-memory directory tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    entries: BTreeMap<String, StoredEntry>,
    journal: Vec<Operation>,
    fail_next: Option<u32>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry directly, bypassing `add` semantics and the journal.
    pub fn with_entry(mut self, dn: &str, attributes: &[(&str, &[&str])]) -> Self {
        self.put_entry(
            dn,
            attributes
                .iter()
                .map(|(n, vs)| (n.to_string(), vs.iter().map(|v| v.to_string()).collect()))
                .collect(),
        );
        self
    }

    /// Insert or overwrite an entry, simulating a change made by someone else.
    pub fn put_entry(&mut self, dn: &str, attributes: BTreeMap<String, Vec<String>>) {
        self.entries.insert(
            key(dn),
            StoredEntry {
                dn: dn.to_owned(),
                attributes,
            },
        );
    }

    /// Overwrite one attribute of an existing entry; an empty list removes it.
    /// Returns `false` if the entry does not exist.
    pub fn set_values(&mut self, dn: &str, name: &str, values: &[&str]) -> bool {
        let Some(entry) = self.entries.get_mut(&key(dn)) else {
            return false;
        };
        let existing = find_name(&entry.attributes, name).unwrap_or_else(|| name.to_owned());
        if values.is_empty() {
            entry.attributes.remove(&existing);
        } else {
            entry
                .attributes
                .insert(existing, values.iter().map(|v| v.to_string()).collect());
        }
        true
    }

    /// Remove an entry out of band. Returns `false` if it did not exist.
    pub fn remove_entry(&mut self, dn: &str) -> bool {
        self.entries.remove(&key(dn)).is_some()
    }

    /// Snapshot of an entry's attributes.
    pub fn entry(&self, dn: &str) -> Option<DirectoryEntry> {
        self.entries.get(&key(dn)).map(|e| DirectoryEntry {
            dn: e.dn.clone(),
            attributes: e.attributes.clone(),
        })
    }

    pub fn contains(&self, dn: &str) -> bool {
        self.entries.contains_key(&key(dn))
    }

    /// Every call received so far.
    pub fn journal(&self) -> &[Operation] {
        &self.journal
    }

    /// Calls that could have changed the tree.
    pub fn mutations(&self) -> Vec<&Operation> {
        self.journal.iter().filter(|op| op.is_mutation()).collect()
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Make the next mutating call fail with `code` without touching the tree.
    pub fn fail_next_mutation(&mut self, code: u32) {
        self.fail_next = Some(code);
    }

    fn injected_failure(&mut self, op: &'static str, dn: &str) -> Result<(), DirectoryError> {
        match self.fail_next.take() {
            Some(code) => Err(result_err(op, dn, code, "injected failure")),
            None => Ok(()),
        }
    }

    fn in_scope(&self, dn_key: &str, base_key: &str, scope: SearchScope) -> bool {
        match scope {
            SearchScope::Base => dn_key == base_key,
            SearchScope::OneLevel => parent(dn_key) == Some(base_key),
            SearchScope::Subtree => {
                dn_key == base_key || dn_key.ends_with(&format!(",{base_key}"))
            }
        }
    }
}

impl Directory for MemoryDirectory {
    fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        self.journal.push(Operation::Search {
            base: base.to_owned(),
            filter: filter.to_owned(),
        });
        let parsed = Filter::parse(filter)?;
        let base_key = key(base);
        if !self.entries.contains_key(&base_key) {
            return Err(result_err("search", base, NO_SUCH_OBJECT, "no such object"));
        }

        let wants_all =
            attributes.is_empty() || attributes.iter().any(|a| *a == ALL_ATTRIBUTES);
        let wants_none = attributes.len() == 1 && attributes[0] == NO_ATTRIBUTES;

        let found = self
            .entries
            .iter()
            .filter(|(k, _)| self.in_scope(k, &base_key, scope))
            .filter(|(_, e)| parsed.matches(&e.attributes))
            .map(|(_, e)| {
                let attributes = if wants_none {
                    BTreeMap::new()
                } else if wants_all {
                    e.attributes.clone()
                } else {
                    e.attributes
                        .iter()
                        .filter(|(n, _)| attributes.iter().any(|a| a.eq_ignore_ascii_case(n)))
                        .map(|(n, v)| (n.clone(), v.clone()))
                        .collect()
                };
                DirectoryEntry {
                    dn: e.dn.clone(),
                    attributes,
                }
            })
            .collect();
        Ok(found)
    }

    fn add(
        &mut self,
        dn: &str,
        attributes: &[(String, Vec<WireValue>)],
    ) -> Result<(), DirectoryError> {
        self.journal.push(Operation::Add { dn: dn.to_owned() });
        self.injected_failure("add", dn)?;
        if self.entries.contains_key(&key(dn)) {
            return Err(result_err("add", dn, ALREADY_EXISTS, "entry already exists"));
        }

        let mut attrs: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, values) in attributes {
            let slot = attrs.entry(name.clone()).or_default();
            for v in values {
                let text = v.to_string();
                if !slot.contains(&text) {
                    slot.push(text);
                }
            }
        }
        if let Some((rdn_name, rdn_value)) = rdn(dn) {
            let name = find_name(&attrs, rdn_name).unwrap_or_else(|| rdn_name.to_owned());
            let slot = attrs.entry(name).or_default();
            if !slot.iter().any(|v| v == rdn_value) {
                slot.push(rdn_value.to_owned());
            }
        }
        self.put_entry(dn, attrs);
        Ok(())
    }

    fn modify(&mut self, dn: &str, directives: &[Directive]) -> Result<(), DirectoryError> {
        self.journal.push(Operation::Modify {
            dn: dn.to_owned(),
            directives: directives.to_vec(),
        });
        self.injected_failure("modify", dn)?;
        let Some(entry) = self.entries.get(&key(dn)) else {
            return Err(result_err("modify", dn, NO_SUCH_OBJECT, "no such object"));
        };

        // Work on a copy so a failing directive leaves the entry untouched.
        let mut attrs = entry.attributes.clone();
        for directive in directives {
            apply(&mut attrs, directive).map_err(|(code, text)| result_err("modify", dn, code, &text))?;
        }
        if let Some(entry) = self.entries.get_mut(&key(dn)) {
            entry.attributes = attrs;
        }
        Ok(())
    }

    fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        self.journal.push(Operation::Delete { dn: dn.to_owned() });
        self.injected_failure("delete", dn)?;
        let k = key(dn);
        if !self.entries.contains_key(&k) {
            return Err(result_err("delete", dn, NO_SUCH_OBJECT, "no such object"));
        }
        let suffix = format!(",{k}");
        if self.entries.keys().any(|other| other.ends_with(&suffix)) {
            return Err(result_err(
                "delete",
                dn,
                NOT_ALLOWED_ON_NON_LEAF,
                "entry has children",
            ));
        }
        self.entries.remove(&k);
        Ok(())
    }
}

fn apply(attrs: &mut BTreeMap<String, Vec<String>>, directive: &Directive) -> Result<(), (u32, String)> {
    let values: Vec<String> = directive.values().iter().map(|v| v.to_string()).collect();
    let existing = find_name(attrs, directive.name());
    match directive {
        Directive::Add { name, .. } => {
            let slot = attrs.entry(existing.unwrap_or_else(|| name.clone())).or_default();
            for v in values {
                if slot.contains(&v) {
                    return Err((ATTRIBUTE_OR_VALUE_EXISTS, format!("{name}: value {v:?} exists")));
                }
                slot.push(v);
            }
        }
        Directive::Replace { name, .. } => {
            if let Some(existing) = existing {
                attrs.remove(&existing);
            }
            if !values.is_empty() {
                attrs.insert(name.clone(), values);
            }
        }
        Directive::Delete { name, .. } => {
            let Some(existing) = existing else {
                return Err((NO_SUCH_ATTRIBUTE, format!("{name}: no such attribute")));
            };
            if values.is_empty() {
                attrs.remove(&existing);
                return Ok(());
            }
            let slot = attrs.entry(existing.clone()).or_default();
            for v in values {
                let Some(pos) = slot.iter().position(|x| *x == v) else {
                    return Err((NO_SUCH_ATTRIBUTE, format!("{name}: no value {v:?}")));
                };
                slot.remove(pos);
            }
            if slot.is_empty() {
                attrs.remove(&existing);
            }
        }
    }
    Ok(())
}

fn result_err(op: &'static str, dn: &str, code: u32, text: &str) -> DirectoryError {
    DirectoryError::Result {
        op,
        dn: dn.to_owned(),
        code,
        text: text.to_owned(),
    }
}

fn key(dn: &str) -> String {
    dn.split(',')
        .map(|part| part.trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

fn parent(dn_key: &str) -> Option<&str> {
    dn_key.split_once(',').map(|(_, rest)| rest)
}

fn rdn(dn: &str) -> Option<(&str, &str)> {
    let first = dn.split(',').next()?;
    let (name, value) = first.split_once('=')?;
    Some((name.trim(), value.trim()))
}

fn find_name(attrs: &BTreeMap<String, Vec<String>>, name: &str) -> Option<String> {
    attrs.keys().find(|k| k.eq_ignore_ascii_case(name)).cloned()
}

// ---------------------------------------------------------------------------
// Search filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equal(String, String),
}

impl Filter {
    fn parse(input: &str) -> Result<Filter, DirectoryError> {
        let invalid = |reason: &str| DirectoryError::InvalidFilter {
            filter: input.to_owned(),
            reason: reason.to_owned(),
        };
        let (filter, rest) = Self::parse_one(input.trim()).map_err(|r| invalid(&r))?;
        if !rest.trim().is_empty() {
            return Err(invalid("trailing characters"));
        }
        Ok(filter)
    }

    fn parse_one(input: &str) -> Result<(Filter, &str), String> {
        let body = input
            .strip_prefix('(')
            .ok_or_else(|| "expected '('".to_owned())?;
        match body.chars().next() {
            Some('&') => {
                let (items, rest) = Self::parse_list(&body[1..])?;
                Ok((Filter::And(items), rest))
            }
            Some('|') => {
                let (items, rest) = Self::parse_list(&body[1..])?;
                Ok((Filter::Or(items), rest))
            }
            Some('!') => {
                let (inner, rest) = Self::parse_one(&body[1..])?;
                let rest = rest
                    .strip_prefix(')')
                    .ok_or_else(|| "expected ')' after negation".to_owned())?;
                Ok((Filter::Not(Box::new(inner)), rest))
            }
            Some(_) => {
                let end = body
                    .find(')')
                    .ok_or_else(|| "unterminated item".to_owned())?;
                let item = &body[..end];
                let (attr, value) = item
                    .split_once('=')
                    .ok_or_else(|| format!("item {item:?} has no '='"))?;
                if attr.is_empty() {
                    return Err(format!("item {item:?} has no attribute"));
                }
                let filter = if value == "*" {
                    Filter::Present(attr.to_owned())
                } else {
                    Filter::Equal(attr.to_owned(), value.to_owned())
                };
                Ok((filter, &body[end + 1..]))
            }
            None => Err("empty filter".to_owned()),
        }
    }

    fn parse_list(mut input: &str) -> Result<(Vec<Filter>, &str), String> {
        let mut items = Vec::new();
        loop {
            if let Some(rest) = input.strip_prefix(')') {
                return Ok((items, rest));
            }
            if input.is_empty() {
                return Err("unterminated list".to_owned());
            }
            let (item, rest) = Self::parse_one(input)?;
            items.push(item);
            input = rest;
        }
    }

    fn matches(&self, attrs: &BTreeMap<String, Vec<String>>) -> bool {
        match self {
            Filter::And(items) => items.iter().all(|f| f.matches(attrs)),
            Filter::Or(items) => items.iter().any(|f| f.matches(attrs)),
            Filter::Not(inner) => !inner.matches(attrs),
            Filter::Present(attr) => find_name(attrs, attr).is_some(),
            Filter::Equal(attr, pattern) => find_name(attrs, attr)
                .and_then(|n| attrs.get(&n))
                .is_some_and(|values| values.iter().any(|v| glob_match(pattern, v))),
        }
    }
}

/// `*` matches any run of characters; everything else matches literally.
fn glob_match(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = value;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            let Some(stripped) = rest.strip_prefix(part) else {
                return false;
            };
            rest = stripped;
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            let Some(pos) = rest.find(part) else {
                return false;
            };
            rest = &rest[pos + part.len()..];
        }
    }
    true
}
