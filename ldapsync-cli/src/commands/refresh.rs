//! `ldapsync refresh`: detect drift in recorded entries.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ldapsync_reconcile::{pipeline, RefreshStatus};

use super::{disconnect, home, ConnectionArgs};

/// Arguments for `ldapsync refresh`.
#[derive(Args, Debug)]
pub struct RefreshArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl RefreshArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let mut reconciler = self.connection.connect()?;
        let reports = pipeline::refresh(&mut reconciler, &home).context("refresh failed")?;
        disconnect(reconciler);

        if reports.is_empty() {
            println!("No entries recorded.");
            return Ok(());
        }
        for report in &reports {
            let status = match report.status {
                RefreshStatus::Current => "CURRENT".green(),
                RefreshStatus::Drifted => "DRIFTED".yellow(),
                RefreshStatus::Gone => "GONE".red(),
            };
            println!("  {status}  {} ({})", report.dn, report.ownership);
        }
        Ok(())
    }
}
