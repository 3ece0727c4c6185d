//! `ldapsync import <dn>`

use anyhow::{Context, Result};
use clap::Args;

use ldapsync_core::{state, Dn};
use ldapsync_reconcile::pipeline;

use super::{disconnect, home, ConnectionArgs};

/// Arguments for `ldapsync import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Distinguished name of the entry to adopt.
    pub dn: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl ImportArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let dn = Dn::from(self.dn);
        let mut reconciler = self.connection.connect()?;
        let record = pipeline::import(&mut reconciler, &home, &dn)
            .with_context(|| format!("failed to import {dn}"))?;
        disconnect(reconciler);

        let path = state::record_path_at(&home, &dn, record.entry.ownership);
        println!(
            "✓ imported {dn} ({} attribute values) → {}",
            record.entry.attributes.len(),
            path.display()
        );
        Ok(())
    }
}
