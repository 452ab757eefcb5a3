//! `credstash delete`

use anyhow::{Context, Result};
use camino::Utf8Path;
use clap::Args;
use credstash_core::DeleteOptions;

use super::Session;
use crate::cli::StoreArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Secret name
    pub name: String,

    /// Version to delete (default: latest)
    #[arg(short = 'v', long, conflicts_with = "all")]
    pub key_version: Option<String>,

    /// Delete all versions
    #[arg(short, long)]
    pub all: bool,
}

pub async fn run(
    args: DeleteArgs,
    store_args: &StoreArgs,
    config: Option<&Utf8Path>,
) -> Result<()> {
    let options = DeleteOptions {
        version: args.key_version.clone(),
        all: args.all,
    };

    let session = Session::open(store_args, config).await?;
    session.check_table().await?;

    let spinner = output::spinner("Deleting...");
    let result = session.store().delete(&args.name, &options).await;
    spinner.finish_and_clear();

    let deleted = result.with_context(|| format!("Failed to delete secret '{}'", args.name))?;
    if args.all {
        output::success(&format!(
            "All {} version(s) of secret '{}' deleted",
            deleted.len(),
            args.name
        ));
    } else {
        output::success(&format!(
            "Secret '{}' version {} deleted",
            args.name,
            deleted.join(", ")
        ));
    }
    Ok(())
}
