//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use credstash_core::ConfigOverrides;

pub use crate::commands::delete::DeleteArgs;
pub use crate::commands::get::GetArgs;
pub use crate::commands::list::ListArgs;
pub use crate::commands::put::PutArgs;

/// Credstash - credential management with AWS KMS and DynamoDB
#[derive(Parser, Debug)]
#[command(name = "credstash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv); must precede the subcommand
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a config file (default: ~/.credstash/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection settings shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// AWS region
    #[arg(short, long, global = true)]
    pub region: Option<String>,

    /// AWS region for KMS (default: --region)
    #[arg(long, global = true)]
    pub kms_region: Option<String>,

    /// DynamoDB table name
    #[arg(short, long, global = true)]
    pub table: Option<String>,

    /// KMS key ID or alias
    #[arg(short, long, global = true)]
    pub kms_key_id: Option<String>,

    /// AWS profile
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Custom endpoint URL for DynamoDB
    #[arg(short, long, global = true)]
    pub dynamodb_endpoint: Option<String>,

    /// Custom endpoint URL for KMS
    #[arg(short = 'e', long, global = true)]
    pub kms_endpoint: Option<String>,
}

impl From<&StoreArgs> for ConfigOverrides {
    fn from(args: &StoreArgs) -> Self {
        Self {
            region: args.region.clone(),
            kms_region: args.kms_region.clone(),
            table: args.table.clone(),
            kms_key_id: args.kms_key_id.clone(),
            profile: args.profile.clone(),
            dynamodb_endpoint: args.dynamodb_endpoint.clone(),
            kms_endpoint: args.kms_endpoint.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a new credential version
    Put(PutArgs),

    /// Retrieve a credential
    Get(GetArgs),

    /// Delete a credential
    Delete(DeleteArgs),

    /// List all stored credentials
    List(ListArgs),

    /// Create the DynamoDB table
    Setup,
}
