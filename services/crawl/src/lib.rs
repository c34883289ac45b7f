//! Nier Crawl Service
//!
//! Queue-triggered crawler for the Nier photo classification pipeline. Each
//! queue record names a user; the service fetches that user's posts newer than
//! a stored cursor, downloads every attached photo, classifies it with a
//! remote image model and records the label, then advances the cursor.
//!
//! ## Architecture
//!
//! ```text
//!  Queue batch                                   DynamoDB
//! ┌──────────────┐     ┌──────────────┐        ┌──────────────┐
//! │ Records[]    │────▶│ Crawler      │◀──────▶│ NDSCursor    │
//! │ {user_id}    │     └──────────────┘        └──────────────┘
//! └──────────────┘        │   │    │
//!                         │   │    └──────────▶┌──────────────┐
//!                         │   │                │ NDSMedia     │
//!                         ▼   ▼                └──────────────┘
//!           ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//!           │ Timeline API │ │ Downloader   │ │ Classifier   │
//!           └──────────────┘ │ (scratch dir)│ │ (AutoML)     │
//!                            └──────────────┘ └──────────────┘
//! ```
//!
//! Everything runs sequentially: one user, one post, one photo at a time.
//! A failed timeline fetch aborts the batch; a failed photo download only
//! skips that photo.

pub mod classifier;
pub mod config;
pub mod crawler;
pub mod downloader;
pub mod event;
pub mod models;
pub mod store;
pub mod timeline;

pub use classifier::{AutoMlClassifier, Classifier, ClassifierError};
pub use config::{Config, ConfigError};
pub use crawler::{BatchSummary, CrawlError, Crawler};
pub use downloader::{DownloadError, HttpMediaDownloader, MediaDownloader};
pub use event::{CrawlRequest, QueueEvent, QueueRecord};
pub use models::{MediaRecord, UserCursor, NO_CURSOR};
pub use store::{CursorStore, DynamoStore, MediaStore, StoreError};
pub use timeline::{Media, TimelineError, TimelineFetcher, Tweet, TwitterTimelineClient};
