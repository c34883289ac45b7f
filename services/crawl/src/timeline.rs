use crate::config::TwitterConfig;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

const USER_TIMELINE_PATH: &str = "/1.1/statuses/user_timeline.json";
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Errors returned by the timeline API
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Failed to load timeline ({0})")]
    Status(StatusCode),

    #[error("Timeline request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A post as returned by the timeline API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: i64,
    /// e.g. `Wed Oct 10 20:19:24 +0000 2018`
    pub created_at: String,
    #[serde(default)]
    pub entities: Entities,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    /// Absent when the post carries no media
    pub media: Option<Vec<Media>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(rename = "type")]
    pub media_type: String,
    pub id_str: String,
    pub media_url_https: String,
}

impl Media {
    pub fn is_photo(&self) -> bool {
        self.media_type == "photo"
    }
}

impl Tweet {
    /// Creation time in milliseconds since the epoch
    pub fn created_at_millis(&self) -> Result<i64, chrono::ParseError> {
        let created_at = DateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT)?;
        Ok(created_at.timestamp_millis())
    }

    /// Photos attached to this post, other media types removed
    pub fn photos(&self) -> impl Iterator<Item = &Media> {
        self.entities
            .media
            .iter()
            .flatten()
            .filter(|media| media.is_photo())
    }
}

/// Source of posts newer than a cursor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimelineFetcher: Send + Sync {
    /// Fetch up to one page of posts newer than `since_id`, newest first
    async fn fetch(&self, user_id: u64, since_id: Option<i64>) -> Result<Vec<Tweet>, TimelineError>;
}

/// Timeline client for the v1.1 `statuses/user_timeline` endpoint
pub struct TwitterTimelineClient {
    http: Client,
    url: String,
    access_token: String,
    page_size: u32,
    include_retweets: bool,
}

impl TwitterTimelineClient {
    pub fn new(config: &TwitterConfig) -> Result<Self, TimelineError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url: format!(
                "{}{}",
                config.api_base.trim_end_matches('/'),
                USER_TIMELINE_PATH
            ),
            access_token: config.access_token.clone(),
            page_size: config.page_size,
            include_retweets: config.include_retweets,
        })
    }
}

#[async_trait]
impl TimelineFetcher for TwitterTimelineClient {
    #[instrument(skip(self))]
    async fn fetch(&self, user_id: u64, since_id: Option<i64>) -> Result<Vec<Tweet>, TimelineError> {
        let mut params = vec![
            ("user_id", user_id.to_string()),
            ("count", self.page_size.to_string()),
            ("include_rts", self.include_retweets.to_string()),
        ];
        if let Some(since_id) = since_id {
            params.push(("since_id", since_id.to_string()));
        }

        let resp = self
            .http
            .get(&self.url)
            .query(&params)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Err(TimelineError::Status(resp.status()));
        }

        let tweets: Vec<Tweet> = resp.json().await?;
        debug!(count = tweets.len(), "Fetched timeline");

        Ok(tweets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TwitterTimelineClient {
        TwitterTimelineClient::new(&TwitterConfig {
            api_base: server.uri(),
            access_token: "secret".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn timeline_body() -> serde_json::Value {
        serde_json::json!([
            {
                "id": 502,
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "text": "no media here",
                "entities": { "hashtags": [] }
            },
            {
                "id": 501,
                "created_at": "Wed Oct 10 20:00:00 +0000 2018",
                "entities": {
                    "media": [
                        {
                            "type": "photo",
                            "id_str": "1050118621198921728",
                            "media_url_https": "https://pbs.twimg.com/media/a.jpg"
                        },
                        {
                            "type": "video",
                            "id_str": "1050118621198921729",
                            "media_url_https": "https://pbs.twimg.com/media/b.jpg"
                        }
                    ]
                }
            }
        ])
    }

    #[test]
    fn test_created_at_millis() {
        let tweet = Tweet {
            id: 1,
            created_at: "Wed Oct 10 20:19:24 +0000 2018".to_string(),
            entities: Entities::default(),
        };
        assert_eq!(tweet.created_at_millis().unwrap(), 1_539_202_764_000);
    }

    #[test]
    fn test_created_at_rejects_other_formats() {
        let tweet = Tweet {
            id: 1,
            created_at: "2018-10-10T20:19:24Z".to_string(),
            entities: Entities::default(),
        };
        assert!(tweet.created_at_millis().is_err());
    }

    #[test]
    fn test_photos_skips_other_media() {
        let tweets: Vec<Tweet> = serde_json::from_value(timeline_body()).unwrap();

        assert_eq!(tweets[0].photos().count(), 0);
        let photos: Vec<_> = tweets[1].photos().collect();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].id_str, "1050118621198921728");
    }

    #[tokio::test]
    async fn test_fetch_without_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(USER_TIMELINE_PATH))
            .and(query_param("user_id", "183230661"))
            .and(query_param("count", "40"))
            .and(query_param("include_rts", "false"))
            .and(query_param_is_missing("since_id"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(timeline_body()))
            .expect(1)
            .mount(&server)
            .await;

        let tweets = client_for(&server).fetch(183230661, None).await.unwrap();

        assert_eq!(tweets.len(), 2);
        assert_eq!(tweets[0].id, 502);
    }

    #[tokio::test]
    async fn test_fetch_with_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(USER_TIMELINE_PATH))
            .and(query_param("since_id", "500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let tweets = client_for(&server).fetch(1, Some(500)).await.unwrap();
        assert!(tweets.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch(1, None).await.unwrap_err();
        assert!(matches!(err, TimelineError::Status(StatusCode::FORBIDDEN)));
    }
}
