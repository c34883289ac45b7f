use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding a queue record
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Failed to deserialize message body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("user_id is not a numeric identifier: {0:?}")]
    InvalidUserId(String),
}

/// Batch of queue records delivered to one invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<QueueRecord>,
}

/// Single queue record; only the body is read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRecord {
    #[serde(rename = "messageId", default)]
    pub message_id: String,
    pub body: String,
}

/// Message body naming the user to crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    /// String-encoded numeric user id
    pub user_id: String,
}

impl QueueRecord {
    /// Decode the body and return the numeric user id it names
    pub fn user_id(&self) -> Result<u64, EventError> {
        let request: CrawlRequest = serde_json::from_str(&self.body)?;
        request
            .user_id
            .trim()
            .parse()
            .map_err(|_| EventError::InvalidUserId(request.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(body: &str) -> QueueRecord {
        QueueRecord {
            message_id: "m-1".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_deserialize_sample_event() {
        let event: QueueEvent =
            serde_json::from_str(include_str!("../fixtures/sample_event.json")).unwrap();

        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].user_id().unwrap(), 183230661);
    }

    #[test]
    fn test_user_id_must_be_numeric() {
        let err = record(r#"{"user_id":"abc"}"#).user_id().unwrap_err();
        assert!(matches!(err, EventError::InvalidUserId(id) if id == "abc"));
    }

    #[test]
    fn test_body_must_be_json() {
        let err = record("not json").user_id().unwrap_err();
        assert!(matches!(err, EventError::Body(_)));
    }

    #[test]
    fn test_missing_records_is_empty_batch() {
        let event: QueueEvent = serde_json::from_str("{}").unwrap();
        assert!(event.records.is_empty());
    }
}
