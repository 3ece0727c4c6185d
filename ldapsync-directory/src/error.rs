//! Error types for ldapsync-directory.

use thiserror::Error;

/// LDAP result code for "no such object".
pub const NO_SUCH_OBJECT: u32 = 32;
/// LDAP result code for "no such attribute".
pub const NO_SUCH_ATTRIBUTE: u32 = 16;
/// LDAP result code for "attribute or value exists".
pub const ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
/// LDAP result code for "invalid credentials".
pub const INVALID_CREDENTIALS: u32 = 49;
/// LDAP result code for "entry already exists".
pub const ALREADY_EXISTS: u32 = 68;

/// All errors surfaced by a directory client.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Could not open a connection (or negotiate TLS) to the server.
    #[error("failed to connect to LDAP server at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: ldap3::LdapError,
    },

    /// The bind was refused.
    #[error("bind as {user} failed with code {code}: {text}")]
    Bind { user: String, code: u32, text: String },

    /// The server answered an operation with a non-success result code.
    #[error("LDAP {op} on {dn} failed with code {code}: {text}")]
    Result {
        op: &'static str,
        dn: String,
        code: u32,
        text: String,
    },

    /// Transport or protocol failure below the result-code level.
    #[error("LDAP protocol error: {0}")]
    Ldap(#[from] ldap3::LdapError),

    /// A search filter the client could not interpret.
    #[error("invalid search filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// Connection settings failed validation.
    #[error("invalid connection configuration: {0}")]
    Config(String),

    /// Connection configuration file could not be read or parsed.
    #[error("failed to load connection configuration from {path}: {reason}")]
    ConfigFile { path: std::path::PathBuf, reason: String },
}

impl DirectoryError {
    /// The LDAP result code, when the server produced one.
    pub fn code(&self) -> Option<u32> {
        match self {
            DirectoryError::Result { code, .. } | DirectoryError::Bind { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// `true` when the server reported that the entry does not exist.
    pub fn is_no_such_object(&self) -> bool {
        self.code() == Some(NO_SUCH_OBJECT)
    }
}

/// Map a server result to `Ok(())` or a [`DirectoryError::Result`].
pub(crate) fn check_result(op: &'static str, dn: &str, code: u32, text: &str) -> Result<(), DirectoryError> {
    if code == 0 {
        return Ok(());
    }
    Err(DirectoryError::Result {
        op,
        dn: dn.to_owned(),
        code,
        text: text.to_owned(),
    })
}
