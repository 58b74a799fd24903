//! Platform Capability Boundary
//!
//! Trait abstraction over the external social network: timeline fetch,
//! publish/reply/quote, metrics fetch, follow, user lookup. The platform is
//! rate-limited, fallible, and idempotency-unaware; everything above this
//! boundary must cope with that.

pub mod retry;
pub mod x_api;

pub use retry::{with_backoff, RetryPolicy};
pub use x_api::XApiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error types for platform operations
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Explicit rate-limit signal, distinguishable from other failures
    #[error("rate limited: retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx API response
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

impl PlatformError {
    /// Transient errors are retried with backoff within a tick
    pub fn is_transient(&self) -> bool {
        match self {
            PlatformError::RateLimited { .. } | PlatformError::Timeout => true,
            PlatformError::Network(_) => true,
            PlatformError::Api { status, .. } => *status >= 500,
            PlatformError::Malformed(_) => false,
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlatformError::Timeout
        } else {
            PlatformError::Network(err.to_string())
        }
    }
}

/// One item from the platform timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineItem {
    /// Platform-assigned id; numeric and monotonically increasing
    pub id: i64,
    pub author_id: String,
    pub text: String,
    pub created_at: String,
}

/// Reference to a quote or comment on one of the bot's posts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRef {
    pub id: String,
    pub author_id: String,
    pub text: String,
}

/// Engagement snapshot for a single post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub likes: i64,
    pub retweets: i64,
    pub quotes: Vec<ReplyRef>,
    pub comments: Vec<ReplyRef>,
}

/// Public profile of a platform user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub handle: String,
    pub followers: i64,
    pub following: i64,
    pub bio: String,
    pub location: String,
}

/// Platform client trait - implement once per social network
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Fetch up to `limit` timeline items newer than `since` (newest first).
    /// `since = None` means no watermark yet.
    async fn get_timeline(
        &self,
        account_id: &str,
        since: Option<i64>,
        limit: usize,
    ) -> Result<Vec<TimelineItem>, PlatformError>;

    /// Publish a standalone post, returning the platform-assigned id
    async fn publish(&self, text: &str) -> Result<String, PlatformError>;

    /// Reply to an existing item, returning the reply's id
    async fn reply(&self, parent_id: i64, text: &str) -> Result<String, PlatformError>;

    /// Quote an existing item, returning the quote's id
    async fn quote(&self, parent_id: i64, text: &str) -> Result<String, PlatformError>;

    /// Current engagement metrics for one of the bot's posts
    async fn get_metrics(&self, post_id: &str) -> Result<EngagementMetrics, PlatformError>;

    /// Follow a user; false means the platform refused (already pending, etc.)
    async fn follow(&self, user_id: &str) -> Result<bool, PlatformError>;

    /// Look up a user by handle (with or without leading '@')
    async fn get_user_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<UserProfile>, PlatformError>;

    /// Recent posts authored by a user (bootstrap corpus source)
    async fn get_user_posts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<TimelineItem>, PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(PlatformError::RateLimited { retry_after: 5 }.is_transient());
        assert!(PlatformError::Timeout.is_transient());
        assert!(PlatformError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!PlatformError::Api {
            status: 403,
            message: "forbidden".into()
        }
        .is_transient());
        assert!(!PlatformError::Malformed("missing id".into()).is_transient());
    }
}
