//! ldapsync core library. Provides the attribute model, filter policy, value codecs,
//! manifest and recorded state.
//!
//! - [`types`]: DNs, attribute values, ownership modes, managed entries
//! - [`attrs`]: [`AttributeSet`] and its content hash
//! - [`filter`]: [`FilterPolicy`]
//! - [`codec`]: wire encoding per attribute name
//! - [`directive`]: modify directives
//! - [`manifest`]: declarative input
//! - [`state`]: load / save / list recorded entries

pub mod attrs;
pub mod codec;
pub mod directive;
pub mod error;
pub mod filter;
pub mod manifest;
pub mod state;
pub mod types;

pub use attrs::{attribute_hash, AttributeSet};
pub use codec::{CodecTable, ValueCodec, WireValue};
pub use directive::Directive;
pub use error::{AttributeSetError, ManifestError, StateError};
pub use filter::FilterPolicy;
pub use manifest::Manifest;
pub use state::StateRecord;
pub use types::{AttributeValue, Dn, ManagedEntry, Ownership, SearchScope, OBJECT_CLASS};
