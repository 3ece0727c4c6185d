pub mod apply;
pub mod destroy;
pub mod import;
pub mod lookup;
pub mod refresh;
pub mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::Args;
use colored::Colorize;

use ldapsync_core::CodecTable;
use ldapsync_directory::{ConnectionConfig, LdapDirectory};
use ldapsync_reconcile::{EntryOutcome, EntryReport, Reconciler};

/// Directory connection flags shared by every online command.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// YAML file with connection settings; flags and env override it.
    #[arg(long, value_name = "FILE")]
    pub connection_file: Option<PathBuf>,

    /// Server URL (ldap://, ldaps:// or ldapi://).
    #[arg(long, env = "LDAP_URL")]
    pub url: Option<String>,

    /// Upgrade the connection with StartTLS.
    #[arg(long = "starttls", env = "LDAP_USE_STARTTLS", value_parser = BoolishValueParser::new())]
    pub use_starttls: bool,

    /// Do not verify the server certificate.
    #[arg(long, env = "LDAP_SKIP_VERIFY", value_parser = BoolishValueParser::new())]
    pub skip_verify: bool,

    /// DN to bind as.
    #[arg(long, env = "LDAP_BIND_USER")]
    pub bind_user: Option<String>,

    #[arg(long, env = "LDAP_BIND_PASSWORD", hide_env_values = true)]
    pub bind_password: Option<String>,

    /// Connect and per-request timeout.
    #[arg(long, env = "LDAP_TIMEOUT_SECS", value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

impl ConnectionArgs {
    pub fn config(&self) -> Result<ConnectionConfig> {
        let mut config = match &self.connection_file {
            Some(path) => ConnectionConfig::load(path)?,
            None => ConnectionConfig::default(),
        };
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        config.use_starttls |= self.use_starttls;
        config.skip_verify |= self.skip_verify;
        if let Some(user) = &self.bind_user {
            config.bind_user = user.clone();
        }
        if let Some(password) = &self.bind_password {
            config.bind_password = password.clone();
        }
        if self.timeout_secs.is_some() {
            config.timeout_secs = self.timeout_secs;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn connect(&self) -> Result<Reconciler<LdapDirectory>> {
        let config = self.config().context("invalid connection settings")?;
        let directory = LdapDirectory::connect(&config)
            .with_context(|| format!("failed to connect to {}", config.url))?;
        Ok(Reconciler::new(directory))
    }
}

/// Close the connection; a failed unbind is only logged.
pub fn disconnect(reconciler: Reconciler<LdapDirectory>) {
    if let Err(e) = reconciler.into_directory().unbind() {
        tracing::debug!(error = %e, "unbind failed");
    }
}

pub fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Values of codec-encoded attributes are masked.
pub fn print_reports(reports: &[EntryReport], dry_run: bool, codecs: &CodecTable) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let changed = reports.iter().filter(|r| r.outcome.is_change()).count();
    if reports.is_empty() {
        println!("{prefix}✓ nothing declared, nothing recorded");
        return;
    }
    println!(
        "{prefix}✓ {} entries ({changed} to change, {} unchanged)",
        reports.len(),
        reports.len() - changed
    );
    for report in reports {
        let marker = match &report.outcome {
            EntryOutcome::Created | EntryOutcome::WouldCreate => "+".green(),
            EntryOutcome::Updated { .. } | EntryOutcome::WouldUpdate { .. } => "~".yellow(),
            EntryOutcome::Deleted | EntryOutcome::WouldDelete => "-".red(),
            EntryOutcome::Unchanged => "·".bright_black(),
        };
        println!(
            "  {marker}  {} ({}) {}",
            report.dn,
            report.ownership,
            report.outcome.label().bold()
        );
        for directive in report.outcome.directives() {
            println!("       {}", directive.render(codecs));
        }
    }
}
