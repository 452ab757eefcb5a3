//! `credstash put`

use anyhow::{Context, Result};
use camino::Utf8Path;
use clap::Args;
use credstash_core::{HmacDigest, PutOptions};
use std::io::Read;

use super::{encryption_context, Session};
use crate::cli::StoreArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Secret name
    pub name: String,

    /// Secret value (prompted for when omitted)
    pub secret: Option<String>,

    /// Explicit version (default: next version)
    #[arg(short = 'v', long)]
    pub key_version: Option<String>,

    /// Encryption context as a JSON object, e.g. '{"env":"prod"}'
    #[arg(short, long)]
    pub context: Option<String>,

    /// HMAC digest: sha224, sha256, sha384 or sha512
    #[arg(long)]
    pub digest: Option<HmacDigest>,

    /// Read the secret value from stdin
    #[arg(long, conflicts_with = "secret")]
    pub stdin: bool,
}

pub async fn run(args: PutArgs, store_args: &StoreArgs, config: Option<&Utf8Path>) -> Result<()> {
    let options = PutOptions {
        version: args.key_version.clone(),
        context: encryption_context(args.context.as_deref())?,
        digest: args.digest,
        key_id: None,
    };
    let secret = read_secret(&args)?;

    let session = Session::open(store_args, config).await?;
    session.check_table().await?;

    let spinner = output::spinner("Encrypting and storing...");
    let result = session.store().put(&args.name, &secret, &options).await;
    spinner.finish_and_clear();

    let version =
        result.with_context(|| format!("Failed to store secret '{}'", args.name))?;
    output::success(&format!(
        "Secret '{}' stored as version {}",
        args.name, version
    ));
    Ok(())
}

fn read_secret(args: &PutArgs) -> Result<String> {
    if let Some(secret) = &args.secret {
        return Ok(secret.clone());
    }

    if args.stdin {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read secret from stdin")?;
        return Ok(strip_line_ending(&buffer).to_string());
    }

    use dialoguer::Password;
    Ok(Password::new()
        .with_prompt(format!("Secret value for '{}'", args.name))
        .allow_empty_password(true)
        .interact()?)
}

fn strip_line_ending(value: &str) -> &str {
    value
        .strip_suffix("\r\n")
        .or_else(|| value.strip_suffix('\n'))
        .unwrap_or(value)
}
