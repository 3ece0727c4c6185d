//! Modify directives emitted by the diff engines.

use std::fmt;

use crate::codec::{CodecTable, WireValue};

/// One change to a single attribute of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Add `values` to the attribute, creating it if absent.
    Add { name: String, values: Vec<WireValue> },
    /// Set the attribute to exactly `values`.
    Replace { name: String, values: Vec<WireValue> },
    /// Remove `values` from the attribute; an empty list removes the whole
    /// attribute.
    Delete { name: String, values: Vec<WireValue> },
}

impl Directive {
    pub fn add(name: impl Into<String>, values: Vec<WireValue>) -> Self {
        Directive::Add {
            name: name.into(),
            values,
        }
    }

    pub fn replace(name: impl Into<String>, values: Vec<WireValue>) -> Self {
        Directive::Replace {
            name: name.into(),
            values,
        }
    }

    /// Delete of the whole attribute.
    pub fn delete_all(name: impl Into<String>) -> Self {
        Directive::Delete {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn delete(name: impl Into<String>, values: Vec<WireValue>) -> Self {
        Directive::Delete {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Directive::Add { name, .. }
            | Directive::Replace { name, .. }
            | Directive::Delete { name, .. } => name,
        }
    }

    pub fn values(&self) -> &[WireValue] {
        match self {
            Directive::Add { values, .. }
            | Directive::Replace { values, .. }
            | Directive::Delete { values, .. } => values,
        }
    }

    /// Short verb used in plan output.
    pub fn verb(&self) -> &'static str {
        match self {
            Directive::Add { .. } => "add",
            Directive::Replace { .. } => "replace",
            Directive::Delete { .. } => "delete",
        }
    }

    /// Plan-output rendering. Values of attributes with a registered codec
    /// are masked, since they carry secrets such as passwords.
    pub fn render(&self, codecs: &CodecTable) -> String {
        if !codecs.has_codec(self.name()) || self.values().is_empty() {
            return self.to_string();
        }
        let masked = vec!["<redacted>"; self.values().len()];
        format!("{} {} [{}]", self.verb(), self.name(), masked.join(", "))
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.name())?;
        let values = self.values();
        if values.is_empty() {
            return Ok(());
        }
        let rendered: Vec<String> = values.iter().map(|v| format!("{v:?}")).collect();
        write!(f, " [{}]", rendered.join(", "))
    }
}
