//! ldapsync: declarative LDAP entry reconciliation.
//!
//! # Usage
//!
//! ```text
//! ldapsync plan <manifest>
//! ldapsync apply <manifest> [--dry-run]
//! ldapsync refresh
//! ldapsync destroy --yes
//! ldapsync lookup --base-dn <dn> [--depth sub|base|one] --where attr=value... [--json]
//! ldapsync import <dn>
//! ldapsync state list [--json]
//! ```
//!
//! Connection settings come from `--url`/`--bind-user`/... flags, the
//! matching `LDAP_*` environment variables, or `--connection-file`.

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{
    apply::{ApplyArgs, PlanArgs},
    destroy::DestroyArgs,
    import::ImportArgs,
    lookup::LookupArgs,
    refresh::RefreshArgs,
    state::StateCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ldapsync",
    version,
    about = "Reconcile declared LDAP entries and attributes against a live directory",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins if set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show what `apply` would change, without changing anything.
    Plan(PlanArgs),

    /// Converge the directory to a manifest and record the result.
    Apply(ApplyArgs),

    /// Re-read every recorded entry and update the records.
    Refresh(RefreshArgs),

    /// Delete every recorded entry (or owned values) from the directory.
    Destroy(DestroyArgs),

    /// Find exactly one entry by attribute values.
    Lookup(LookupArgs),

    /// Record an existing entry under full ownership.
    Import(ImportArgs),

    /// Inspect recorded state.
    State {
        #[command(subcommand)]
        command: StateCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Plan(args) => args.run(),
        Commands::Apply(args) => args.run(),
        Commands::Refresh(args) => args.run(),
        Commands::Destroy(args) => args.run(),
        Commands::Lookup(args) => args.run(),
        Commands::Import(args) => args.run(),
        Commands::State { command } => commands::state::run(command),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
