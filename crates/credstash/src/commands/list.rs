//! `credstash list`

use anyhow::{Context, Result};
use camino::Utf8Path;
use clap::Args;
use console::style;
use credstash_core::{version, SecretListing};
use tabled::{settings::Style as TableStyle, Table, Tabled};

use super::Session;
use crate::cli::StoreArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Row for table output
#[derive(Tabled)]
struct SecretRow {
    name: String,
    version: String,
}

pub async fn run(args: ListArgs, store_args: &StoreArgs, config: Option<&Utf8Path>) -> Result<()> {
    let session = Session::open(store_args, config).await?;
    session.check_table().await?;

    let spinner = output::spinner("Scanning table...");
    let result = session.store().list().await;
    spinner.finish_and_clear();

    let mut listings = result.context("Failed to list secrets")?;
    sort_listings(&mut listings);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    if listings.is_empty() {
        output::info("No secrets found.");
        return Ok(());
    }

    let rows: Vec<SecretRow> = listings
        .into_iter()
        .map(|l| SecretRow {
            name: l.name,
            version: l.version,
        })
        .collect();
    let count = rows.len();
    let table = Table::new(rows).with(TableStyle::rounded()).to_string();
    println!("{}", table);
    println!("\n{} secret version(s)", style(count).green().bold());
    Ok(())
}

/// Name first, then version numerically
fn sort_listings(listings: &mut [SecretListing]) {
    listings.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| version::parse(&a.version).cmp(&version::parse(&b.version)))
            .then_with(|| a.version.cmp(&b.version))
    });
}
