//! [`Directory`] over a synchronous `ldap3` connection.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, Mod, Scope, SearchEntry, SearchResult};
use tracing::{debug, info, instrument, warn};

use ldapsync_core::{Directive, SearchScope, WireValue};

use crate::config::ConnectionConfig;
use crate::error::{check_result, DirectoryError};
use crate::{Directory, DirectoryEntry};

/// A bound LDAP connection.
///
/// The connection is not shared internally: each call blocks until the
/// server answers (or the configured timeout elapses).
pub struct LdapDirectory {
    conn: LdapConn,
    timeout: Option<Duration>,
}

impl LdapDirectory {
    /// Connect, optionally upgrade with StartTLS, and perform a simple bind.
    #[instrument(skip(config), fields(url = %config.url))]
    pub fn connect(config: &ConnectionConfig) -> Result<Self, DirectoryError> {
        config.validate()?;

        let mut settings = LdapConnSettings::new()
            .set_starttls(config.use_starttls)
            .set_no_tls_verify(config.skip_verify);
        if let Some(timeout) = config.timeout() {
            settings = settings.set_conn_timeout(timeout);
        }

        let conn = LdapConn::with_settings(settings, &config.url).map_err(|source| {
            DirectoryError::Connect {
                url: config.url.clone(),
                source,
            }
        })?;
        let mut directory = Self {
            conn,
            timeout: config.timeout(),
        };

        debug!(bind_user = %config.bind_user, "performing LDAP bind");
        let result = directory
            .conn()
            .simple_bind(&config.bind_user, &config.bind_password)?;
        if result.rc != 0 {
            return Err(DirectoryError::Bind {
                user: config.bind_user.clone(),
                code: result.rc,
                text: result.text,
            });
        }

        info!("LDAP connection established");
        Ok(directory)
    }

    /// Close the connection politely.
    pub fn unbind(mut self) -> Result<(), DirectoryError> {
        self.conn.unbind()?;
        Ok(())
    }

    fn conn(&mut self) -> &mut LdapConn {
        if let Some(timeout) = self.timeout {
            self.conn.with_timeout(timeout);
        }
        &mut self.conn
    }
}

fn to_ldap_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

fn value_set(values: &[WireValue]) -> HashSet<Vec<u8>> {
    values.iter().map(|v| v.as_bytes().to_vec()).collect()
}

fn to_mod(directive: &Directive) -> Mod<Vec<u8>> {
    let name = directive.name().as_bytes().to_vec();
    let values = value_set(directive.values());
    match directive {
        Directive::Add { .. } => Mod::Add(name, values),
        Directive::Replace { .. } => Mod::Replace(name, values),
        Directive::Delete { .. } => Mod::Delete(name, values),
    }
}

/// Non-UTF-8 values are kept with lossy conversion so the attribute is not
/// mistaken for absent.
impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        let mut attributes: BTreeMap<String, Vec<String>> = entry.attrs.into_iter().collect();
        if !entry.bin_attrs.is_empty() {
            warn!(
                dn = %entry.dn,
                attributes = ?entry.bin_attrs.keys().collect::<Vec<_>>(),
                "attribute values are not valid UTF-8; comparing lossy text"
            );
        }
        for (name, values) in entry.bin_attrs {
            attributes
                .entry(name)
                .or_default()
                .extend(values.iter().map(|v| String::from_utf8_lossy(v).into_owned()));
        }
        Self {
            dn: entry.dn,
            attributes,
        }
    }
}

impl Directory for LdapDirectory {
    #[instrument(skip(self, attributes))]
    fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let SearchResult(entries, result) =
            self.conn()
                .search(base, to_ldap_scope(scope), filter, attributes.to_vec())?;
        check_result("search", base, result.rc, &result.text)?;
        debug!(count = entries.len(), "search returned entries");
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(DirectoryEntry::from)
            .collect())
    }

    #[instrument(skip(self, attributes))]
    fn add(
        &mut self,
        dn: &str,
        attributes: &[(String, Vec<WireValue>)],
    ) -> Result<(), DirectoryError> {
        let attrs: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attributes
            .iter()
            .map(|(name, values)| (name.as_bytes().to_vec(), value_set(values)))
            .collect();
        let result = self.conn().add(dn, attrs)?;
        check_result("add", dn, result.rc, &result.text)
    }

    #[instrument(skip(self, directives), fields(changes = directives.len()))]
    fn modify(&mut self, dn: &str, directives: &[Directive]) -> Result<(), DirectoryError> {
        let mods: Vec<Mod<Vec<u8>>> = directives.iter().map(to_mod).collect();
        let result = self.conn().modify(dn, mods)?;
        check_result("modify", dn, result.rc, &result.text)
    }

    #[instrument(skip(self))]
    fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        let result = self.conn().delete(dn)?;
        check_result("delete", dn, result.rc, &result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_map_to_ldap3() {
        assert!(matches!(to_ldap_scope(SearchScope::Base), Scope::Base));
        assert!(matches!(to_ldap_scope(SearchScope::OneLevel), Scope::OneLevel));
        assert!(matches!(to_ldap_scope(SearchScope::Subtree), Scope::Subtree));
    }

    #[test]
    fn directives_map_to_mods() {
        let add = to_mod(&Directive::add("mail", vec!["a@x".into()]));
        match add {
            Mod::Add(name, values) => {
                assert_eq!(name, b"mail".to_vec());
                assert!(values.contains(&b"a@x".to_vec()));
            }
            _ => panic!("expected Mod::Add"),
        }
        match to_mod(&Directive::delete_all("title")) {
            Mod::Delete(name, values) => {
                assert_eq!(name, b"title".to_vec());
                assert!(values.is_empty());
            }
            _ => panic!("expected Mod::Delete"),
        }
        assert!(matches!(
            to_mod(&Directive::replace("sn", vec!["x".into()])),
            Mod::Replace(..)
        ));
    }

    #[test]
    fn search_entry_conversion_keeps_text_attributes() {
        let entry = SearchEntry {
            dn: "cn=a,dc=x".into(),
            attrs: [("cn".to_string(), vec!["a".to_string()])].into_iter().collect(),
            bin_attrs: Default::default(),
        };
        let converted = DirectoryEntry::from(entry);
        assert_eq!(converted.dn, "cn=a,dc=x");
        assert_eq!(converted.first("cn"), Some("a"));
    }

    #[test]
    fn search_entry_conversion_keeps_binary_attributes() {
        let entry = SearchEntry {
            dn: "cn=a,dc=x".into(),
            attrs: [("cn".to_string(), vec!["a".to_string()])].into_iter().collect(),
            bin_attrs: [("photo".to_string(), vec![vec![0xff, b'a']])]
                .into_iter()
                .collect(),
        };
        let converted = DirectoryEntry::from(entry);
        assert_eq!(converted.values("photo"), &["\u{fffd}a".to_string()]);
        assert_eq!(converted.first("cn"), Some("a"));
    }
}
