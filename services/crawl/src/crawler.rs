use crate::classifier::{Classifier, ClassifierError};
use crate::downloader::MediaDownloader;
use crate::event::QueueEvent;
use crate::models::{MediaRecord, UserCursor, NO_CURSOR};
use crate::store::{CursorStore, MediaStore, StoreError};
use crate::timeline::{Media, TimelineError, TimelineFetcher, Tweet};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Errors raised while crawling a user.
///
/// Only [`CrawlError::Timeline`] is fatal to the batch; every other variant
/// abandons the current user without saving its cursor.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Failed to load timeline for user {user_id}: {source}")]
    Timeline {
        user_id: u64,
        #[source]
        source: TimelineError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("Post {tweet_id} has an unparseable created_at: {source}")]
    CreatedAt {
        tweet_id: i64,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Failed to read scratch file: {0}")]
    Scratch(#[from] std::io::Error),
}

impl CrawlError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrawlError::Timeline { .. })
    }
}

/// Outcome counts for one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub users_processed: usize,
    pub users_failed: usize,
    pub malformed_records: usize,
    pub photos_classified: usize,
    pub photos_skipped: usize,
    pub photos_download_failed: usize,
}

/// Sequences cursor lookup, timeline fetch, photo classification and
/// bookkeeping writes for every user named in a batch
pub struct Crawler {
    cursors: Arc<dyn CursorStore>,
    media: Arc<dyn MediaStore>,
    timeline: Arc<dyn TimelineFetcher>,
    downloader: Arc<dyn MediaDownloader>,
    classifier: Arc<dyn Classifier>,
}

impl Crawler {
    pub fn new(
        cursors: Arc<dyn CursorStore>,
        media: Arc<dyn MediaStore>,
        timeline: Arc<dyn TimelineFetcher>,
        downloader: Arc<dyn MediaDownloader>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            cursors,
            media,
            timeline,
            downloader,
            classifier,
        }
    }

    /// Process every record of a batch in order.
    ///
    /// Returns early with the fatal error when a timeline fetch fails.
    #[instrument(skip(self, event), fields(records = event.records.len()))]
    pub async fn process_batch(&self, event: &QueueEvent) -> Result<BatchSummary, CrawlError> {
        let mut summary = BatchSummary::default();

        for record in &event.records {
            let user_id = match record.user_id() {
                Ok(user_id) => user_id,
                Err(e) => {
                    warn!(message_id = %record.message_id, error = %e, "Skipping malformed record");
                    summary.malformed_records += 1;
                    continue;
                }
            };

            match self.process_user(user_id, &mut summary).await {
                Ok(()) => {
                    summary.users_processed += 1;
                    metrics::counter!("crawl.users.processed").increment(1);
                }
                Err(e) if e.is_fatal() => {
                    error!(user_id, error = %e, "Aborting batch");
                    return Err(e);
                }
                Err(e) => {
                    error!(user_id, error = %e, "Failed to crawl user, cursor left unchanged");
                    summary.users_failed += 1;
                    metrics::counter!("crawl.users.failed").increment(1);
                }
            }
        }

        Ok(summary)
    }

    #[instrument(skip(self, summary))]
    async fn process_user(&self, user_id: u64, summary: &mut BatchSummary) -> Result<(), CrawlError> {
        let cursor = self.cursors.get_cursor(user_id).await?;
        let since_id = cursor.and_then(|c| c.since_id());
        let mut max_tweet_id = cursor.map_or(NO_CURSOR, |c| c.tweet_id);

        let tweets = self
            .timeline
            .fetch(user_id, since_id)
            .await
            .map_err(|source| CrawlError::Timeline { user_id, source })?;

        info!(user_id, since_id = ?since_id, count = tweets.len(), "Processing timeline");

        for tweet in &tweets {
            max_tweet_id = max_tweet_id.max(tweet.id);

            for photo in tweet.photos() {
                self.process_photo(user_id, tweet, photo, summary).await?;
            }
        }

        self.cursors
            .put_cursor(&UserCursor {
                user_id,
                tweet_id: max_tweet_id,
            })
            .await?;

        Ok(())
    }

    #[instrument(skip(self, tweet, photo, summary), fields(media_id = %photo.id_str))]
    async fn process_photo(
        &self,
        user_id: u64,
        tweet: &Tweet,
        photo: &Media,
        summary: &mut BatchSummary,
    ) -> Result<(), CrawlError> {
        let media_id = &photo.id_str;

        if self.media.media_exists(media_id).await? {
            info!(media_id = %media_id, "Skipping photo, already processed");
            summary.photos_skipped += 1;
            metrics::counter!("crawl.photos.skipped").increment(1);
            return Ok(());
        }

        let timestamp = tweet
            .created_at_millis()
            .map_err(|source| CrawlError::CreatedAt {
                tweet_id: tweet.id,
                source,
            })?;

        let path = match self.downloader.download(media_id, &photo.media_url_https).await {
            Ok(path) => path,
            Err(e) => {
                warn!(media_id = %media_id, url = %photo.media_url_https, error = %e, "Skipping photo");
                summary.photos_download_failed += 1;
                metrics::counter!("crawl.photos.download_failed").increment(1);
                return Ok(());
            }
        };

        let image = tokio::fs::read(&path).await?;
        let prediction = self.classifier.classify(&image).await?;

        self.media
            .put_media(&MediaRecord {
                media_id: media_id.clone(),
                user_id,
                media_url: photo.media_url_https.clone(),
                prediction: prediction.clone(),
                timestamp,
            })
            .await?;

        info!(media_id = %media_id, prediction = %prediction, "Photo classified");
        summary.photos_classified += 1;
        metrics::counter!("crawl.photos.classified").increment(1);

        Ok(())
    }
}
