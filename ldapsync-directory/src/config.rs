//! Connection settings for the directory server.
//!
//! Values come from a YAML file, from the environment, or from explicit
//! construction. Environment variable names:
//!
//! | field           | variable              | default |
//! |-----------------|-----------------------|---------|
//! | `url`           | `LDAP_URL`            | required |
//! | `use_starttls`  | `LDAP_USE_STARTTLS`   | `false` |
//! | `skip_verify`   | `LDAP_SKIP_VERIFY`    | `false` |
//! | `bind_user`     | `LDAP_BIND_USER`      | required |
//! | `bind_password` | `LDAP_BIND_PASSWORD`  | empty   |
//! | `timeout_secs`  | `LDAP_TIMEOUT_SECS`   | none    |

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

pub const ENV_URL: &str = "LDAP_URL";
pub const ENV_USE_STARTTLS: &str = "LDAP_USE_STARTTLS";
pub const ENV_SKIP_VERIFY: &str = "LDAP_SKIP_VERIFY";
pub const ENV_BIND_USER: &str = "LDAP_BIND_USER";
pub const ENV_BIND_PASSWORD: &str = "LDAP_BIND_PASSWORD";
pub const ENV_TIMEOUT_SECS: &str = "LDAP_TIMEOUT_SECS";

/// How to reach and authenticate against the directory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub use_starttls: bool,
    #[serde(default)]
    pub skip_verify: bool,
    #[serde(default)]
    pub bind_user: String,
    #[serde(default)]
    pub bind_password: String,
    /// Connect and per-operation deadline. `None` waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ConnectionConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, DirectoryError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DirectoryError> {
        let flag = |key: &str| -> Result<bool, DirectoryError> {
            match lookup(key) {
                None => Ok(false),
                Some(v) => parse_bool(&v)
                    .ok_or_else(|| DirectoryError::Config(format!("{key}={v:?} is not a boolean"))),
            }
        };
        let timeout_secs = match lookup(ENV_TIMEOUT_SECS) {
            None => None,
            Some(v) => Some(v.trim().parse::<u64>().map_err(|_| {
                DirectoryError::Config(format!("{ENV_TIMEOUT_SECS}={v:?} is not a number of seconds"))
            })?),
        };
        let config = Self {
            url: lookup(ENV_URL).unwrap_or_default(),
            use_starttls: flag(ENV_USE_STARTTLS)?,
            skip_verify: flag(ENV_SKIP_VERIFY)?,
            bind_user: lookup(ENV_BIND_USER).unwrap_or_default(),
            bind_password: lookup(ENV_BIND_PASSWORD).unwrap_or_default(),
            timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load settings from a YAML file. Missing fields are left empty so
    /// flags or the environment can fill them; call [`validate`](Self::validate)
    /// once everything is merged.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let contents = std::fs::read_to_string(path).map_err(|e| DirectoryError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self =
            serde_yaml::from_str(&contents).map_err(|e| DirectoryError::ConfigFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(config)
    }

    /// Reject settings that cannot produce a working connection.
    pub fn validate(&self) -> Result<(), DirectoryError> {
        if self.url.trim().is_empty() {
            return Err(DirectoryError::Config(format!("no server URL ({ENV_URL})")));
        }
        let scheme_ok = ["ldap://", "ldaps://", "ldapi://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme));
        if !scheme_ok {
            return Err(DirectoryError::Config(format!(
                "URL {:?} must start with ldap://, ldaps:// or ldapi://",
                self.url
            )));
        }
        if self.use_starttls && self.url.starts_with("ldaps://") {
            return Err(DirectoryError::Config(
                "StartTLS cannot be combined with an ldaps:// URL".to_owned(),
            ));
        }
        if self.bind_user.is_empty() {
            return Err(DirectoryError::Config(format!("no bind user ({ENV_BIND_USER})")));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("use_starttls", &self.use_starttls)
            .field("skip_verify", &self.skip_verify)
            .field("bind_user", &self.bind_user)
            .field("bind_password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_all_variables() {
        let config = ConnectionConfig::from_lookup(env(&[
            (ENV_URL, "ldap://localhost:389"),
            (ENV_USE_STARTTLS, "true"),
            (ENV_SKIP_VERIFY, "1"),
            (ENV_BIND_USER, "cn=admin,dc=example,dc=com"),
            (ENV_BIND_PASSWORD, "secret"),
            (ENV_TIMEOUT_SECS, "30"),
        ]))
        .expect("config");
        assert!(config.use_starttls);
        assert!(config.skip_verify);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn flags_default_to_false() {
        let config = ConnectionConfig::from_lookup(env(&[
            (ENV_URL, "ldaps://dc.example.com"),
            (ENV_BIND_USER, "admin"),
        ]))
        .expect("config");
        assert!(!config.use_starttls);
        assert!(!config.skip_verify);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn missing_url_is_rejected() {
        let err = ConnectionConfig::from_lookup(env(&[(ENV_BIND_USER, "admin")])).unwrap_err();
        assert!(err.to_string().contains("LDAP_URL"), "got: {err}");
    }

    #[test]
    fn starttls_over_ldaps_is_rejected() {
        let err = ConnectionConfig::from_lookup(env(&[
            (ENV_URL, "ldaps://dc.example.com"),
            (ENV_USE_STARTTLS, "yes"),
            (ENV_BIND_USER, "admin"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("StartTLS"), "got: {err}");
    }

    #[test]
    fn bad_boolean_is_rejected() {
        let err = ConnectionConfig::from_lookup(env(&[
            (ENV_URL, "ldap://x"),
            (ENV_SKIP_VERIFY, "maybe"),
            (ENV_BIND_USER, "admin"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LDAP_SKIP_VERIFY"), "got: {err}");
    }

    #[test]
    fn partial_file_leaves_gaps_for_flags() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("connection.yaml");
        std::fs::write(&path, "url: ldap://dc.example.com\nuse_starttls: true\n").expect("write");

        let mut config = ConnectionConfig::load(&path).expect("load");
        assert!(config.use_starttls);
        assert!(config.validate().is_err());

        config.bind_user = "cn=admin,dc=example,dc=com".into();
        config.validate().expect("complete");
    }

    #[test]
    fn unreadable_file_names_the_path() {
        let err = ConnectionConfig::load(Path::new("/nonexistent/connection.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/connection.yaml"), "got: {err}");
    }

    #[test]
    fn debug_redacts_password() {
        let config = ConnectionConfig {
            url: "ldap://x".into(),
            bind_user: "admin".into(),
            bind_password: "hunter2".into(),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
