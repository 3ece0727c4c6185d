//! Attribute value encoding for the wire.
//!
//! Most attributes are sent as their UTF-8 text. Some directory servers want
//! a different representation for particular attributes; Active Directory
//! only accepts `unicodePwd` as a double-quoted, UTF-16LE string without a
//! byte-order mark. [`CodecTable`] maps attribute names to the
//! [`ValueCodec`] that produces their wire form.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Attribute that Active Directory uses for password writes.
pub const UNICODE_PWD: &str = "unicodePwd";

/// Raw bytes sent to the directory for one attribute value.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WireValue(pub Vec<u8>);

impl WireValue {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&str> for WireValue {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for WireValue {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl fmt::Debug for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{s:?}"),
            Err(_) => write!(f, "<{} bytes>", self.0.len()),
        }
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// A value could not be transcoded by its codec.
#[derive(Debug, Error)]
#[error("cannot encode value of {attribute}: {reason}")]
pub struct CodecError {
    pub attribute: String,
    pub reason: String,
}

/// Turns a declared attribute value into its wire form.
pub trait ValueCodec: Send + Sync {
    fn encode(&self, attribute: &str, raw: &str) -> Result<Vec<u8>, CodecError>;
}

/// UTF-8 bytes of the value, unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl ValueCodec for Identity {
    fn encode(&self, _attribute: &str, raw: &str) -> Result<Vec<u8>, CodecError> {
        Ok(raw.as_bytes().to_vec())
    }
}

/// `"value"` encoded as UTF-16 little-endian, no byte-order mark.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotedUtf16Le;

impl ValueCodec for QuotedUtf16Le {
    fn encode(&self, _attribute: &str, raw: &str) -> Result<Vec<u8>, CodecError> {
        let quoted = format!("\"{raw}\"");
        Ok(quoted.encode_utf16().flat_map(u16::to_le_bytes).collect())
    }
}

/// Codec lookup keyed by attribute name, with identity as the fallback.
pub struct CodecTable {
    codecs: HashMap<String, Box<dyn ValueCodec>>,
}

impl CodecTable {
    /// Table with no special cases: every value is sent as UTF-8.
    pub fn identity() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register `codec` for `attribute`, replacing any previous entry.
    pub fn with(mut self, attribute: impl Into<String>, codec: impl ValueCodec + 'static) -> Self {
        self.codecs.insert(attribute.into(), Box::new(codec));
        self
    }

    pub fn has_codec(&self, attribute: &str) -> bool {
        self.codecs.contains_key(attribute)
    }

    /// Wire form of `raw` for `attribute`.
    ///
    /// A codec failure is not propagated: the raw UTF-8 value is sent instead
    /// and a warning is logged.
    pub fn encode(&self, attribute: &str, raw: &str) -> WireValue {
        let Some(codec) = self.codecs.get(attribute) else {
            return WireValue::from(raw);
        };
        match codec.encode(attribute, raw) {
            Ok(bytes) => WireValue(bytes),
            Err(e) => {
                tracing::warn!(attribute, error = %e, "value codec failed; sending raw value");
                WireValue::from(raw)
            }
        }
    }

    /// Encode every value in `values` for `attribute`.
    pub fn encode_all<'a>(
        &self,
        attribute: &str,
        values: impl IntoIterator<Item = &'a String>,
    ) -> Vec<WireValue> {
        values
            .into_iter()
            .map(|v| self.encode(attribute, v))
            .collect()
    }
}

impl Default for CodecTable {
    /// `unicodePwd` uses [`QuotedUtf16Le`]; everything else is identity.
    fn default() -> Self {
        Self::identity().with(UNICODE_PWD, QuotedUtf16Le)
    }
}

impl fmt::Debug for CodecTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.codecs.keys().collect();
        names.sort();
        f.debug_struct("CodecTable").field("special", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl ValueCodec for Failing {
        fn encode(&self, attribute: &str, _raw: &str) -> Result<Vec<u8>, CodecError> {
            Err(CodecError {
                attribute: attribute.to_owned(),
                reason: "unrepresentable".to_owned(),
            })
        }
    }

    #[test]
    fn ordinary_attributes_pass_through() {
        let table = CodecTable::default();
        assert_eq!(table.encode("mail", "a@x"), WireValue::from("a@x"));
    }

    #[test]
    fn password_is_quoted_utf16le_without_bom() {
        let table = CodecTable::default();
        let wire = table.encode(UNICODE_PWD, "ab");
        assert_eq!(
            wire.as_bytes(),
            &[b'"', 0, b'a', 0, b'b', 0, b'"', 0],
            "expected quoted UTF-16LE, got {wire:?}"
        );
    }

    #[test]
    fn password_non_ascii_uses_surrogate_pairs() {
        let wire = QuotedUtf16Le.encode(UNICODE_PWD, "é😀").unwrap();
        // quote + é + surrogate pair + quote
        assert_eq!(wire.len(), 2 * 5);
        assert_eq!(&wire[2..4], &[0xE9, 0x00]);
    }

    #[test]
    fn codec_failure_falls_back_to_raw_value() {
        let table = CodecTable::identity().with("weird", Failing);
        assert_eq!(table.encode("weird", "v"), WireValue::from("v"));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let table = CodecTable::default();
        assert_eq!(table.encode("unicodepwd", "x"), WireValue::from("x"));
        assert!(table.has_codec(UNICODE_PWD));
    }

    #[test]
    fn debug_output_lists_special_names() {
        let rendered = format!("{:?}", CodecTable::default());
        assert!(rendered.contains("unicodePwd"));
    }
}
