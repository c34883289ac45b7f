use crate::config::DynamoDbConfig;
use crate::models::{MediaRecord, UserCursor};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Builder as DynamoConfigBuilder;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, instrument};

type Item = HashMap<String, AttributeValue>;

/// Errors returned by the key-value store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("DynamoDB request to {table} failed: {source}")]
    Request {
        table: String,
        #[source]
        source: aws_sdk_dynamodb::Error,
    },

    #[error("Item in {table} has a missing or malformed {attribute} attribute")]
    InvalidAttribute { table: String, attribute: &'static str },
}

/// Per-user cursor table
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get_cursor(&self, user_id: u64) -> Result<Option<UserCursor>, StoreError>;

    /// Unconditional upsert
    async fn put_cursor(&self, cursor: &UserCursor) -> Result<(), StoreError>;
}

/// Processed-media table; a record's presence marks its photo as done
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn media_exists(&self, media_id: &str) -> Result<bool, StoreError>;

    /// Unconditional upsert
    async fn put_media(&self, record: &MediaRecord) -> Result<(), StoreError>;
}

/// DynamoDB-backed cursor and media tables
pub struct DynamoStore {
    client: DynamoClient,
    cursor_table: String,
    media_table: String,
}

impl DynamoStore {
    /// Create a store from the default AWS credential chain
    pub async fn new(config: &DynamoDbConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(ref region) = config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let aws_config = loader.load().await;

        let mut dynamo_config_builder = DynamoConfigBuilder::from(&aws_config);

        // Custom endpoint for DynamoDB Local/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            dynamo_config_builder = dynamo_config_builder.endpoint_url(endpoint_url);
        }

        let client = DynamoClient::from_conf(dynamo_config_builder.build());

        info!(
            cursor_table = %config.cursor_table,
            media_table = %config.media_table,
            "DynamoDB store initialized"
        );

        Self::with_client(client, config)
    }

    pub fn with_client(client: DynamoClient, config: &DynamoDbConfig) -> Self {
        Self {
            client,
            cursor_table: config.cursor_table.clone(),
            media_table: config.media_table.clone(),
        }
    }

    fn request_error(&self, table: &str, source: impl Into<aws_sdk_dynamodb::Error>) -> StoreError {
        StoreError::Request {
            table: table.to_string(),
            source: source.into(),
        }
    }
}

#[async_trait]
impl CursorStore for DynamoStore {
    #[instrument(skip(self))]
    async fn get_cursor(&self, user_id: u64) -> Result<Option<UserCursor>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.cursor_table)
            .key("UserID", AttributeValue::N(user_id.to_string()))
            .send()
            .await
            .map_err(|e| self.request_error(&self.cursor_table, e))?;

        output
            .item()
            .map(|item| cursor_from_item(&self.cursor_table, item))
            .transpose()
    }

    #[instrument(skip(self, cursor), fields(user_id = cursor.user_id, tweet_id = cursor.tweet_id))]
    async fn put_cursor(&self, cursor: &UserCursor) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.cursor_table)
            .set_item(Some(cursor_item(cursor)))
            .send()
            .await
            .map_err(|e| self.request_error(&self.cursor_table, e))?;

        debug!("Cursor saved");
        Ok(())
    }
}

#[async_trait]
impl MediaStore for DynamoStore {
    #[instrument(skip(self))]
    async fn media_exists(&self, media_id: &str) -> Result<bool, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.media_table)
            .key("MediaID", AttributeValue::N(media_id.to_string()))
            .projection_expression("MediaID")
            .send()
            .await
            .map_err(|e| self.request_error(&self.media_table, e))?;

        Ok(output.item().is_some())
    }

    #[instrument(skip(self, record), fields(media_id = %record.media_id))]
    async fn put_media(&self, record: &MediaRecord) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.media_table)
            .set_item(Some(media_item(record)))
            .send()
            .await
            .map_err(|e| self.request_error(&self.media_table, e))?;

        debug!("Media record saved");
        Ok(())
    }
}

fn cursor_item(cursor: &UserCursor) -> Item {
    HashMap::from([
        ("UserID".to_string(), AttributeValue::N(cursor.user_id.to_string())),
        ("TweetID".to_string(), AttributeValue::N(cursor.tweet_id.to_string())),
    ])
}

fn cursor_from_item(table: &str, item: &Item) -> Result<UserCursor, StoreError> {
    Ok(UserCursor {
        user_id: number_attribute(table, item, "UserID")?,
        tweet_id: number_attribute(table, item, "TweetID")?,
    })
}

fn media_item(record: &MediaRecord) -> Item {
    HashMap::from([
        ("MediaID".to_string(), AttributeValue::N(record.media_id.clone())),
        ("UserID".to_string(), AttributeValue::N(record.user_id.to_string())),
        ("MediaURL".to_string(), AttributeValue::S(record.media_url.clone())),
        ("Prediction".to_string(), AttributeValue::S(record.prediction.clone())),
        ("Timestamp".to_string(), AttributeValue::N(record.timestamp.to_string())),
    ])
}

fn number_attribute<T: std::str::FromStr>(
    table: &str,
    item: &Item,
    attribute: &'static str,
) -> Result<T, StoreError> {
    item.get(attribute)
        .and_then(|value| value.as_n().ok())
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| StoreError::InvalidAttribute {
            table: table.to_string(),
            attribute,
        })
}
