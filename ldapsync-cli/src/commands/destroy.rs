//! `ldapsync destroy`: remove everything ldapsync recorded.

use anyhow::{bail, Context, Result};
use clap::Args;

use ldapsync_reconcile::pipeline;

use super::{disconnect, home, print_reports, ConnectionArgs};

/// Arguments for `ldapsync destroy`.
#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Confirm deletion.
    #[arg(long)]
    pub yes: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl DestroyArgs {
    pub fn run(self) -> Result<()> {
        if !self.yes {
            bail!("refusing to delete recorded entries without --yes");
        }
        let home = home()?;
        let mut reconciler = self.connection.connect()?;
        let reports = pipeline::destroy(&mut reconciler, &home).context("destroy failed")?;
        print_reports(&reports, false, reconciler.codecs());
        disconnect(reconciler);
        Ok(())
    }
}
