//! AWS implementations of the collaborator traits

pub mod dynamodb;
pub mod kms;

pub use dynamodb::DynamoDbTable;
pub use kms::AwsKms;

use crate::config::StoreConfig;
use aws_config::{BehaviorVersion, Region};
use tracing::debug;

/// Clients for one resolved configuration
#[derive(Debug, Clone)]
pub struct AwsClients {
    pub kms: AwsKms,
    pub table: DynamoDbTable,
}

/// Build KMS and DynamoDB clients from one shared SDK config
///
/// Region and profile apply to both services. The KMS client then takes its
/// own region, and each service its own endpoint override.
pub async fn connect(config: &StoreConfig) -> AwsClients {
    debug!(
        "Loading AWS config (region {}, profile {})",
        config.region, config.profile
    );
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .profile_name(&config.profile)
        .load()
        .await;

    AwsClients {
        kms: AwsKms::new(
            &sdk_config,
            Some(&config.kms_region),
            config.kms_endpoint.as_deref(),
        ),
        table: DynamoDbTable::new(
            &sdk_config,
            config.table.clone(),
            config.dynamodb_endpoint.as_deref(),
        ),
    }
}
