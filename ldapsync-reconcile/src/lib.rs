//! # ldapsync-reconcile
//!
//! Attribute reconciliation against a [`Directory`](ldapsync_directory::Directory).
//!
//! [`diff`] holds the two pure diff engines, [`Reconciler`] runs them against
//! a directory for one entry at a time, and [`pipeline`] drives a whole
//! manifest plus its recorded state. [`lookup`] is a read-only query.

mod attributes;
pub mod diff;
pub mod error;
pub mod lookup;
mod object;
pub mod pipeline;
pub mod readback;
pub mod reconciler;

pub use diff::{full_diff, partial_diff};
pub use error::ReconcileError;
pub use lookup::{lookup, LookupQuery, LookupResult};
pub use pipeline::{EntryOutcome, EntryReport, RefreshReport, RefreshStatus};
pub use readback::RdnHandling;
pub use reconciler::Reconciler;
