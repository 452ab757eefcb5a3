//! `credstash get`

use anyhow::{Context, Result};
use camino::Utf8Path;
use clap::Args;
use credstash_core::GetOptions;
use std::io::Write;

use super::{encryption_context, Session};
use crate::cli::StoreArgs;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Secret name
    pub name: String,

    /// Version to fetch (default: latest)
    #[arg(short = 'v', long)]
    pub key_version: Option<String>,

    /// Encryption context used when the secret was stored
    #[arg(short, long)]
    pub context: Option<String>,

    /// Don't append a newline
    #[arg(short, long)]
    pub noline: bool,
}

pub async fn run(args: GetArgs, store_args: &StoreArgs, config: Option<&Utf8Path>) -> Result<()> {
    let options = GetOptions {
        version: args.key_version.clone(),
        context: encryption_context(args.context.as_deref())?,
    };

    let session = Session::open(store_args, config).await?;
    session.check_table().await?;

    let secret = session
        .store()
        .get(&args.name, &options)
        .await
        .with_context(|| format!("Failed to retrieve secret '{}'", args.name))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(secret.as_str().as_bytes())?;
    if !args.noline {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
