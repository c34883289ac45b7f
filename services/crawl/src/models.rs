use serde::{Deserialize, Serialize};

/// Running maximum before any post has been seen; below every real post id.
pub const NO_CURSOR: i64 = -1;

/// Last seen post id for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCursor {
    pub user_id: u64,
    pub tweet_id: i64,
}

impl UserCursor {
    /// The `since_id` to request, if the stored value names a real post.
    ///
    /// A user whose first run found nothing carries the `NO_CURSOR` sentinel,
    /// which must not be sent to the timeline API.
    pub fn since_id(&self) -> Option<i64> {
        (self.tweet_id > 0).then_some(self.tweet_id)
    }
}

/// One classified photo; its existence marks the photo as processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub media_id: String,
    pub user_id: u64,
    pub media_url: String,
    pub prediction: String,
    /// Post creation time, milliseconds since the epoch
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_id_for_real_post() {
        let cursor = UserCursor {
            user_id: 1,
            tweet_id: 500,
        };
        assert_eq!(cursor.since_id(), Some(500));
    }

    #[test]
    fn test_since_id_ignores_sentinel() {
        let cursor = UserCursor {
            user_id: 1,
            tweet_id: NO_CURSOR,
        };
        assert_eq!(cursor.since_id(), None);
    }
}
