//! `ldapsync state list`: offline view of recorded entries.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use ldapsync_core::{state, Ownership, StateRecord};

use super::home;

/// Inspect recorded state.
#[derive(Subcommand, Debug)]
pub enum StateCommand {
    /// List every recorded entry.
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::List(args) => list(args),
    }
}

#[derive(Serialize)]
struct RecordJson<'a> {
    dn: &'a str,
    ownership: Ownership,
    object_classes: Vec<&'a str>,
    attributes: std::collections::BTreeMap<String, Vec<String>>,
    updated_at: String,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "dn")]
    dn: String,
    #[tabled(rename = "ownership")]
    ownership: String,
    #[tabled(rename = "attributes")]
    attributes: String,
    #[tabled(rename = "updated")]
    updated: String,
}

fn list(args: ListArgs) -> Result<()> {
    let home = home()?;
    let records = state::list_at(&home).context("failed to read recorded state")?;

    if args.json {
        let payload: Vec<RecordJson> = records.iter().map(to_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize state JSON")?
        );
        return Ok(());
    }

    if records.is_empty() {
        println!("No entries recorded.");
        println!("Run: ldapsync apply <manifest>");
        return Ok(());
    }

    let rows: Vec<RecordRow> = records.iter().map(to_row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} full, {} partial",
        count(&records, Ownership::Full).to_string().bold(),
        count(&records, Ownership::Partial).to_string().bold()
    );
    Ok(())
}

fn to_json(record: &StateRecord) -> RecordJson<'_> {
    RecordJson {
        dn: record.entry.dn.as_str(),
        ownership: record.entry.ownership,
        object_classes: record.entry.object_classes.iter().map(String::as_str).collect(),
        attributes: record.entry.attributes.grouped(),
        updated_at: record.updated_at.to_rfc3339(),
    }
}

fn to_row(record: &StateRecord) -> RecordRow {
    let names = record.entry.attributes.names();
    RecordRow {
        dn: record.entry.dn.to_string(),
        ownership: record.entry.ownership.to_string(),
        attributes: format!(
            "{} values in {} attributes",
            record.entry.attributes.len(),
            names.len()
        ),
        updated: record.updated_at.format("%Y-%m-%d %H:%M").to_string(),
    }
}

fn count(records: &[StateRecord], ownership: Ownership) -> usize {
    records
        .iter()
        .filter(|r| r.entry.ownership == ownership)
        .count()
}
