//! `ldapsync lookup`: find one entry by attribute values.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ldapsync_core::SearchScope;
use ldapsync_reconcile::{lookup, LookupQuery};

use super::{disconnect, ConnectionArgs};

/// Arguments for `ldapsync lookup`.
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Search base.
    #[arg(long)]
    pub base_dn: String,

    /// Search depth: sub (or subtree, wholeSubtree), base (or baseObject),
    /// one (or singleLevel).
    #[arg(long, default_value = "subtree")]
    pub depth: SearchScope,

    /// `attribute=value` pair to match; repeat to AND several together.
    #[arg(long = "where", value_name = "ATTR=VALUE", value_parser = parse_pair, required = true)]
    pub search_values: Vec<(String, String)>,

    /// Attribute to leave out of the result.
    #[arg(long = "skip", value_name = "ATTR")]
    pub skip_attributes: Vec<String>,

    /// Only report these attributes.
    #[arg(long = "select", value_name = "ATTR")]
    pub select_attributes: Vec<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl LookupArgs {
    pub fn run(self) -> Result<()> {
        let query = self.query();
        let mut reconciler = self.connection.connect()?;
        let found = lookup(reconciler.directory_mut(), &query)
            .with_context(|| format!("lookup below {} failed", query.base_dn))?;
        disconnect(reconciler);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&found).context("failed to serialize lookup JSON")?
            );
            return Ok(());
        }
        println!("{}", found.dn.as_str().bold());
        for (name, values) in found.attributes.grouped() {
            for value in values {
                println!("  {}: {value}", name.cyan());
            }
        }
        Ok(())
    }

    fn query(&self) -> LookupQuery {
        LookupQuery {
            base_dn: self.base_dn.clone(),
            scope: self.depth,
            search_values: self.search_values.iter().cloned().collect(),
            skip_attributes: self.skip_attributes.iter().cloned().collect(),
            select_attributes: self.select_attributes.iter().cloned().collect(),
        }
    }
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected ATTR=VALUE, got '{s}'")),
    }
}
