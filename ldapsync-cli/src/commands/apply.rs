//! `ldapsync plan` and `ldapsync apply`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use ldapsync_core::Manifest;
use ldapsync_reconcile::pipeline;

use super::{disconnect, home, print_reports, ConnectionArgs};

/// Arguments for `ldapsync plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Manifest YAML file.
    pub manifest: PathBuf,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let manifest = load_manifest(&self.manifest)?;
        let home = home()?;
        let mut reconciler = self.connection.connect()?;
        let reports = pipeline::plan(&mut reconciler, &home, &manifest).context("plan failed")?;
        print_reports(&reports, true, reconciler.codecs());
        disconnect(reconciler);
        Ok(())
    }
}

/// Arguments for `ldapsync apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Manifest YAML file.
    pub manifest: PathBuf,

    /// Show what would change without touching the directory or state.
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        let manifest = load_manifest(&self.manifest)?;
        let home = home()?;
        let mut reconciler = self.connection.connect()?;
        let reports = pipeline::apply(&mut reconciler, &home, &manifest, self.dry_run)
            .context("apply failed")?;
        print_reports(&reports, self.dry_run, reconciler.codecs());
        disconnect(reconciler);
        Ok(())
    }
}

fn load_manifest(path: &Path) -> Result<Manifest> {
    Manifest::load(path).with_context(|| format!("failed to load manifest {}", path.display()))
}
