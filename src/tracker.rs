//! Engagement Tracking
//!
//! Periodically samples engagement metrics for every post still inside its
//! tracking window and appends them to the time series. Quote and comment
//! bodies are written to JSON snapshot files; the sample row carries only
//! the paths. Replies are recorded by identity so re-discovering the same
//! quote on a later pass is a no-op.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::platform::{with_backoff, PlatformClient, ReplyRef, RetryPolicy};
use crate::store::{EngagementSample, EngagementStore, PostStore, ReplyStore};

/// Outcome of one engagement refresh attempt
#[derive(Debug, Default)]
pub struct RefreshOutcome {
    pub attempt_id: Uuid,
    /// Posts sampled this attempt
    pub sampled: usize,
    /// Posts outside their tracking window, skipped
    pub retired: usize,
    /// Posts whose metrics fetch failed
    pub failed: usize,
    /// Quotes and comments not seen before
    pub new_replies: usize,
}

pub struct EngagementTracker {
    platform: Arc<dyn PlatformClient>,
    posts: Arc<PostStore>,
    engagement: Arc<EngagementStore>,
    replies: Arc<ReplyStore>,
    snapshot_dir: PathBuf,
    /// Tracking window: retirement needs the latest sample older than this
    max_tracking_age_secs: i64,
    /// Retirement also needs at least this many samples taken
    min_samples: i64,
    retry: RetryPolicy,
}

impl EngagementTracker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        posts: Arc<PostStore>,
        engagement: Arc<EngagementStore>,
        replies: Arc<ReplyStore>,
        snapshot_dir: PathBuf,
        max_tracking_age_secs: i64,
        min_samples: i64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            platform,
            posts,
            engagement,
            replies,
            snapshot_dir,
            max_tracking_age_secs,
            min_samples,
            retry,
        }
    }

    /// Sample every active post once. Per-post failures degrade the outcome
    /// but never abort the pass.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let attempt_id = Uuid::new_v4();
        let now = chrono::Utc::now().timestamp();

        let posts = self.posts.all_posts().context("listing posts")?;
        let summaries = self
            .engagement
            .sample_summaries()
            .context("reading sample summaries")?;

        let mut outcome = RefreshOutcome {
            attempt_id,
            ..Default::default()
        };

        for post in posts {
            if let Some(summary) = summaries.get(&post.post_id) {
                let stale = summary.latest_at < now - self.max_tracking_age_secs;
                if stale && summary.samples >= self.min_samples {
                    outcome.retired += 1;
                    continue;
                }
                // samples are keyed by second; never take two in the same one
                if summary.latest_at >= now {
                    continue;
                }
            }

            let metrics = with_backoff("get_metrics", &self.retry, || {
                self.platform.get_metrics(&post.post_id)
            })
            .await;
            let metrics = match metrics {
                Ok(metrics) => metrics,
                Err(err) => {
                    warn!(
                        attempt = %attempt_id,
                        post_id = %post.post_id,
                        "metrics fetch failed: {}",
                        err
                    );
                    outcome.failed += 1;
                    continue;
                }
            };

            // a snapshot write failure degrades this post only, like a
            // failed metrics fetch
            let snapshots = self
                .write_snapshot(&post.post_id, now, "quotes", &metrics.quotes)
                .and_then(|quotes_path| {
                    let comments_path =
                        self.write_snapshot(&post.post_id, now, "comments", &metrics.comments)?;
                    Ok((quotes_path, comments_path))
                });
            let (quotes_path, comments_path) = match snapshots {
                Ok(paths) => paths,
                Err(err) => {
                    warn!(
                        attempt = %attempt_id,
                        post_id = %post.post_id,
                        "snapshot write failed: {}",
                        err
                    );
                    outcome.failed += 1;
                    continue;
                }
            };

            self.engagement
                .add_sample(&EngagementSample {
                    post_id: post.post_id.clone(),
                    retrieved_at: now,
                    likes: metrics.likes,
                    retweets: metrics.retweets,
                    quotes_path,
                    comments_path,
                })
                .context("appending engagement sample")?;

            for quote in &metrics.quotes {
                if self.replies.add_reply(&post.post_id, &quote.id, false)? {
                    outcome.new_replies += 1;
                }
            }
            for comment in &metrics.comments {
                if self.replies.add_reply(&post.post_id, &comment.id, true)? {
                    outcome.new_replies += 1;
                }
            }

            debug!(
                attempt = %attempt_id,
                post_id = %post.post_id,
                likes = metrics.likes,
                retweets = metrics.retweets,
                "sampled"
            );
            outcome.sampled += 1;
        }

        info!(
            attempt = %attempt_id,
            sampled = outcome.sampled,
            retired = outcome.retired,
            failed = outcome.failed,
            new_replies = outcome.new_replies,
            "engagement refresh finished"
        );
        Ok(outcome)
    }

    /// Write a reply snapshot and return its path; empty lists get no file
    fn write_snapshot(
        &self,
        post_id: &str,
        at: i64,
        kind: &str,
        replies: &[ReplyRef],
    ) -> Result<Option<String>> {
        if replies.is_empty() {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.snapshot_dir)?;
        let path = self
            .snapshot_dir
            .join(format!("{}-{}-{}.json", post_id, at, kind));
        let json = serde_json::to_string_pretty(replies)?;
        std::fs::write(&path, json)?;
        Ok(Some(path_to_string(&path)))
    }
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
