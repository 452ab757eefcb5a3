//! DynamoDB record table
//!
//! Table layout: hash key `name` (S), range key `version` (S). The remaining
//! attributes `key`, `contents`, `hmac` and `digest` are all strings.

use crate::error::{Error, Result};
use crate::record::{SecretListing, SecretRecord, StoredRecord};
use crate::table::{ScanCursor, ScanPage, SecretTable};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

pub const ATTR_NAME: &str = "name";
pub const ATTR_VERSION: &str = "version";
pub const ATTR_KEY: &str = "key";
pub const ATTR_CONTENTS: &str = "contents";
pub const ATTR_HMAC: &str = "hmac";
pub const ATTR_DIGEST: &str = "digest";

/// Polls of `DescribeTable` while a new table becomes active
const TABLE_ACTIVE_POLLS: u32 = 60;
const TABLE_ACTIVE_INTERVAL: Duration = Duration::from_secs(1);

type Item = HashMap<String, AttributeValue>;

/// Secret records in a DynamoDB table
#[derive(Clone)]
pub struct DynamoDbTable {
    client: Client,
    table_name: String,
}

impl std::fmt::Debug for DynamoDbTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbTable")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoDbTable {
    /// Build a client from a shared SDK config with an optional endpoint
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        table_name: impl Into<String>,
        endpoint: Option<&str>,
    ) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(endpoint) = endpoint {
            debug!("Using custom DynamoDB endpoint: {}", endpoint);
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            table_name: table_name.into(),
        }
    }

    /// Check whether the table exists
    pub async fn table_exists(&self) -> Result<bool> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => {
                debug!("Table {} is accessible", self.table_name);
                Ok(true)
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_resource_not_found_exception() {
                    debug!("Table {} does not exist", self.table_name);
                    Ok(false)
                } else {
                    Err(Error::table(service_error))
                }
            }
        }
    }

    /// Fail with `TableNotFound` unless the table exists
    pub async fn check_table(&self) -> Result<()> {
        if self.table_exists().await? {
            Ok(())
        } else {
            Err(Error::TableNotFound(self.table_name.clone()))
        }
    }

    /// Create the table if it does not exist
    ///
    /// Returns true if the table was created.
    pub async fn ensure_table(&self) -> Result<bool> {
        if self.table_exists().await? {
            return Ok(false);
        }

        info!("Creating table: {}", self.table_name);
        let key = |name: &str, key_type: KeyType| {
            KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .map_err(Error::table)
        };
        let attribute = |name: &str| {
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(Error::table)
        };

        self.client
            .create_table()
            .table_name(&self.table_name)
            .key_schema(key(ATTR_NAME, KeyType::Hash)?)
            .key_schema(key(ATTR_VERSION, KeyType::Range)?)
            .attribute_definitions(attribute(ATTR_NAME)?)
            .attribute_definitions(attribute(ATTR_VERSION)?)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| Error::table(e.into_service_error()))?;

        self.wait_until_active().await?;
        info!("Created table {}", self.table_name);
        Ok(true)
    }

    async fn wait_until_active(&self) -> Result<()> {
        for _ in 0..TABLE_ACTIVE_POLLS {
            let response = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .map_err(|e| Error::table(e.into_service_error()))?;

            let status = response.table().and_then(|t| t.table_status());
            if status == Some(&TableStatus::Active) {
                return Ok(());
            }
            debug!("Table {} status {:?}, waiting", self.table_name, status);
            tokio::time::sleep(TABLE_ACTIVE_INTERVAL).await;
        }

        Err(Error::table(format!(
            "table {} did not become active",
            self.table_name
        )))
    }

    fn record_to_item(record: &SecretRecord) -> Item {
        HashMap::from([
            (ATTR_NAME.to_string(), AttributeValue::S(record.name.clone())),
            (
                ATTR_VERSION.to_string(),
                AttributeValue::S(record.version.clone()),
            ),
            (ATTR_KEY.to_string(), AttributeValue::S(record.encoded_key())),
            (
                ATTR_CONTENTS.to_string(),
                AttributeValue::S(record.encoded_contents()),
            ),
            (ATTR_HMAC.to_string(), AttributeValue::S(record.hmac.clone())),
            (
                ATTR_DIGEST.to_string(),
                AttributeValue::S(record.digest.to_string()),
            ),
        ])
    }

    /// Read an item without decoding its attributes
    fn item_to_stored(item: &Item) -> Result<StoredRecord> {
        let listing = Self::item_to_listing(item)?;
        Ok(StoredRecord {
            name: listing.name,
            version: listing.version,
            key: string_attr(item, ATTR_KEY).map(str::to_string),
            contents: string_attr(item, ATTR_CONTENTS).map(str::to_string),
            hmac: hmac_attr(item),
            digest: string_attr(item, ATTR_DIGEST).map(str::to_string),
        })
    }

    fn item_to_listing(item: &Item) -> Result<SecretListing> {
        match (string_attr(item, ATTR_NAME), string_attr(item, ATTR_VERSION)) {
            (Some(name), Some(version)) => Ok(SecretListing::new(name, version)),
            _ => Err(Error::table("item without string name and version keys")),
        }
    }

    fn cursor_to_key(cursor: ScanCursor) -> Item {
        HashMap::from([
            (ATTR_NAME.to_string(), AttributeValue::S(cursor.name)),
            (ATTR_VERSION.to_string(), AttributeValue::S(cursor.version)),
        ])
    }
}

fn string_attr<'a>(item: &'a Item, attr: &str) -> Option<&'a str> {
    item.get(attr)?.as_s().ok().map(String::as_str)
}

/// Some writers store the HMAC as a binary attribute holding the hex text
fn hmac_attr(item: &Item) -> Option<String> {
    match item.get(ATTR_HMAC)? {
        AttributeValue::S(s) => Some(s.clone()),
        AttributeValue::B(b) => String::from_utf8(b.as_ref().to_vec()).ok(),
        _ => None,
    }
}

#[async_trait]
impl SecretTable for DynamoDbTable {
    async fn put(&self, record: &SecretRecord) -> Result<()> {
        debug!(
            "Writing {} version {} to {}",
            record.name, record.version, self.table_name
        );

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::record_to_item(record)))
            .condition_expression("attribute_not_exists(#n)")
            .expression_attribute_names("#n", ATTR_NAME)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    Err(Error::VersionExists {
                        name: record.name.clone(),
                        version: record.version.clone(),
                    })
                } else {
                    Err(Error::table(err))
                }
            }
        }
    }

    async fn query(
        &self,
        name: &str,
        consistent_read: bool,
        descending: bool,
    ) -> Result<Vec<StoredRecord>> {
        debug!("Querying {} for {}", self.table_name, name);
        let mut records = Vec::new();
        let mut last_evaluated_key = None;

        loop {
            let response = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#n = :name")
                .expression_attribute_names("#n", ATTR_NAME)
                .expression_attribute_values(":name", AttributeValue::S(name.to_string()))
                .consistent_read(consistent_read)
                .scan_index_forward(!descending)
                .set_exclusive_start_key(last_evaluated_key.take())
                .send()
                .await
                .map_err(|e| Error::table(e.into_service_error()))?;

            for item in response.items() {
                records.push(Self::item_to_stored(item)?);
            }

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => last_evaluated_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn versions(&self, name: &str) -> Result<Vec<String>> {
        let mut versions = Vec::new();
        let mut last_evaluated_key = None;

        loop {
            let response = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#n = :name")
                .projection_expression("#n, #v")
                .expression_attribute_names("#n", ATTR_NAME)
                .expression_attribute_names("#v", ATTR_VERSION)
                .expression_attribute_values(":name", AttributeValue::S(name.to_string()))
                .consistent_read(true)
                .set_exclusive_start_key(last_evaluated_key.take())
                .send()
                .await
                .map_err(|e| Error::table(e.into_service_error()))?;

            for item in response.items() {
                versions.push(Self::item_to_listing(item)?.version);
            }

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => last_evaluated_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(versions)
    }

    async fn scan_page(&self, start: Option<ScanCursor>) -> Result<ScanPage> {
        let response = self
            .client
            .scan()
            .table_name(&self.table_name)
            .projection_expression("#n, #v")
            .expression_attribute_names("#n", ATTR_NAME)
            .expression_attribute_names("#v", ATTR_VERSION)
            .set_exclusive_start_key(start.map(Self::cursor_to_key))
            .send()
            .await
            .map_err(|e| Error::table(e.into_service_error()))?;

        let items = response
            .items()
            .iter()
            .map(Self::item_to_listing)
            .collect::<Result<Vec<_>>>()?;

        let last_key = match response.last_evaluated_key() {
            Some(key) if !key.is_empty() => Some(Self::item_to_listing(key)?),
            _ => None,
        };

        Ok(ScanPage { items, last_key })
    }

    async fn delete(&self, name: &str, version: &str) -> Result<()> {
        debug!("Deleting {} version {} from {}", name, version, self.table_name);
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(ATTR_NAME, AttributeValue::S(name.to_string()))
            .key(ATTR_VERSION, AttributeValue::S(version.to_string()))
            .send()
            .await
            .map_err(|e| Error::table(e.into_service_error()))?;
        Ok(())
    }
}
