//! # ldapsync-directory
//!
//! The directory client the reconciler talks to.
//!
//! [`Directory`] is the seam: four synchronous request/response operations,
//! one outstanding call at a time (`&mut self`). [`LdapDirectory`] implements
//! it over an `ldap3` connection; [`MemoryDirectory`] is an in-process stand-in
//! with LDAP modify semantics, used by tests and offline planning.

pub mod config;
pub mod error;
pub mod ldap;
pub mod memory;

use std::collections::BTreeMap;

use ldapsync_core::{Directive, SearchScope, WireValue};

pub use config::ConnectionConfig;
pub use error::{DirectoryError, NO_SUCH_OBJECT};
pub use ldap::LdapDirectory;
pub use memory::MemoryDirectory;

/// Request every user attribute.
pub const ALL_ATTRIBUTES: &str = "*";
/// Request no attributes at all (RFC 4511 `1.1`).
pub const NO_ATTRIBUTES: &str = "1.1";

/// One entry returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryEntry {
    /// May be empty when the server omits it; see the attribute fallbacks in
    /// the lookup query.
    pub dn: String,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, values: &[&str]) -> Self {
        self.attributes
            .insert(name.into(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Values of `name`, or an empty slice.
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value of `name`, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }
}

/// A synchronous directory client.
pub trait Directory {
    /// Search below `base` and return the matching entries. A missing base
    /// yields a [`DirectoryError::Result`] with code [`NO_SUCH_OBJECT`].
    fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Create the entry `dn` with the given attributes.
    fn add(&mut self, dn: &str, attributes: &[(String, Vec<WireValue>)])
        -> Result<(), DirectoryError>;

    /// Apply every directive to `dn` in one request; the server applies all
    /// of them or none.
    fn modify(&mut self, dn: &str, directives: &[Directive]) -> Result<(), DirectoryError>;

    /// Remove the entry `dn`.
    fn delete(&mut self, dn: &str) -> Result<(), DirectoryError>;
}

impl<D: Directory + ?Sized> Directory for &mut D {
    fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        (**self).search(base, scope, filter, attributes)
    }

    fn add(
        &mut self,
        dn: &str,
        attributes: &[(String, Vec<WireValue>)],
    ) -> Result<(), DirectoryError> {
        (**self).add(dn, attributes)
    }

    fn modify(&mut self, dn: &str, directives: &[Directive]) -> Result<(), DirectoryError> {
        (**self).modify(dn, directives)
    }

    fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        (**self).delete(dn)
    }
}

impl<D: Directory + ?Sized> Directory for Box<D> {
    fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        (**self).search(base, scope, filter, attributes)
    }

    fn add(
        &mut self,
        dn: &str,
        attributes: &[(String, Vec<WireValue>)],
    ) -> Result<(), DirectoryError> {
        (**self).add(dn, attributes)
    }

    fn modify(&mut self, dn: &str, directives: &[Directive]) -> Result<(), DirectoryError> {
        (**self).modify(dn, directives)
    }

    fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        (**self).delete(dn)
    }
}
