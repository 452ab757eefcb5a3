//! `credstash setup`

use anyhow::{Context, Result};
use camino::Utf8Path;

use super::Session;
use crate::cli::StoreArgs;
use crate::output;

pub async fn run(store_args: &StoreArgs, config: Option<&Utf8Path>) -> Result<()> {
    let session = Session::open(store_args, config).await?;
    let table = &session.config.table;

    output::header("Credstash Setup");
    output::kv("Table", table);
    output::kv("Region", &session.config.region);
    if let Some(endpoint) = &session.config.dynamodb_endpoint {
        output::kv("Endpoint", endpoint);
    }
    println!();

    let spinner = output::spinner("Checking table...");
    let result = session.clients.table.ensure_table().await;
    spinner.finish_and_clear();

    if result.with_context(|| format!("Failed to set up table '{}'", table))? {
        output::success(&format!("Table '{}' created", table));
    } else {
        output::info(&format!("Table '{}' already exists", table));
    }
    Ok(())
}
