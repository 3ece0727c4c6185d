//! Domain types for directory reconciliation.
//!
//! Attribute names are compared exactly as written; matching them against the
//! directory schema's declared spelling is the caller's job.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attrs::AttributeSet;
use crate::error::AttributeSetError;
use crate::filter::FilterPolicy;

/// Name of the attribute holding an entry's object classes.
pub const OBJECT_CLASS: &str = "objectClass";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A distinguished name: the stable primary key of a directory entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dn(pub String);

impl Dn {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when `name=value` is a literal prefix of this DN, i.e. the pair
    /// is the entry's own relative distinguished name.
    pub fn starts_with_rdn(&self, name: &str, value: &str) -> bool {
        let rdn = format!("{name}={value}");
        self.0.starts_with(&rdn)
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Dn {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Dn {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// One value of a (possibly multi-valued) attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeValue {
    pub name: String,
    pub value: String,
}

impl AttributeValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How much of an entry the reconciler owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    /// The whole entry and the complete value list of every attribute.
    #[default]
    Full,
    /// Only the declared values; values added by other means are left alone.
    Partial,
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ownership::Full => write!(f, "full"),
            Ownership::Partial => write!(f, "partial"),
        }
    }
}

/// Depth of a directory search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum SearchScope {
    Base,
    OneLevel,
    #[default]
    Subtree,
}

impl SearchScope {
    /// Accepted spellings, canonical name first.
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            SearchScope::Subtree => &["sub", "subtree", "wholeSubtree"],
            SearchScope::Base => &["base", "baseObject"],
            SearchScope::OneLevel => &["one", "singleLevel"],
        }
    }

    pub const fn all() -> &'static [SearchScope] {
        &[SearchScope::Subtree, SearchScope::Base, SearchScope::OneLevel]
    }

    /// Human-readable list of every accepted spelling.
    pub fn help() -> String {
        Self::all()
            .iter()
            .map(|scope| {
                let aliases = scope.aliases();
                format!("{} (or {})", aliases[0], aliases[1..].join(", "))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for SearchScope {
    type Err = AttributeSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase();
        Self::all()
            .iter()
            .find(|scope| scope.aliases().iter().any(|a| a.to_lowercase() == wanted))
            .copied()
            .ok_or_else(|| AttributeSetError::InvalidScope {
                given: s.to_owned(),
                expected: Self::help(),
            })
    }
}

impl TryFrom<String> for SearchScope {
    type Error = AttributeSetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SearchScope> for String {
    fn from(scope: SearchScope) -> Self {
        scope.aliases()[0].to_owned()
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.aliases()[0])
    }
}

// ---------------------------------------------------------------------------
// Managed entry
// ---------------------------------------------------------------------------

/// A directory entry (or owned slice of one) under reconciliation.
///
/// The same shape serves as the declared desired state and as the recorded
/// snapshot used as "old" on the next pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedEntry {
    pub dn: Dn,
    #[serde(default)]
    pub ownership: Ownership,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub object_classes: BTreeSet<String>,
    #[serde(default)]
    pub attributes: AttributeSet,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub skip_attributes: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub select_attributes: BTreeSet<String>,
}

impl ManagedEntry {
    pub fn new(dn: impl Into<Dn>, ownership: Ownership) -> Self {
        Self {
            dn: dn.into(),
            ownership,
            object_classes: BTreeSet::new(),
            attributes: AttributeSet::new(),
            skip_attributes: BTreeSet::new(),
            select_attributes: BTreeSet::new(),
        }
    }

    /// The filter policy implied by this entry's skip/select lists.
    ///
    /// Full ownership always denies `objectClass`: classes are reconciled
    /// separately from ordinary attributes.
    pub fn policy(&self) -> FilterPolicy {
        match self.ownership {
            Ownership::Full => FilterPolicy::for_object(
                self.skip_attributes.iter().cloned(),
                self.select_attributes.iter().cloned(),
            ),
            Ownership::Partial => FilterPolicy::new(
                self.skip_attributes.iter().cloned(),
                self.select_attributes.iter().cloned(),
            ),
        }
    }

    /// Copy of this entry with its attribute snapshot replaced.
    pub fn with_attributes(&self, attributes: AttributeSet) -> Self {
        Self {
            attributes,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
