//! Timeline Processing
//!
//! One attempt: fetch items above the persisted watermark, classify each
//! against both criteria, generate and publish replies to accepted items,
//! then advance the watermark. Re-running an attempt over the same items is
//! a no-op because the watermark only ever moves forward.
//!
//! Failure handling is deliberately asymmetric. A publish failure is logged
//! and does not hold the watermark back (the item had its chance, we move
//! on); a failed Post write after a confirmed publish does hold it back,
//! because losing the row would orphan the published reply from every
//! downstream consumer.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SharedPersona;
use crate::learner::{ClassifyCriteria, Learner};
use crate::platform::{with_backoff, PlatformClient, RetryPolicy, TimelineItem};
use crate::store::PostStore;

const PERSIST_ATTEMPTS: u32 = 3;

/// An accepted item and the reply published for it
#[derive(Debug, Clone)]
pub struct Decision {
    pub item: TimelineItem,
    pub reply: String,
    /// Platform id of the published reply; None when publishing is disabled
    pub post_id: Option<String>,
}

/// An accepted item whose reply could not be published or persisted
#[derive(Debug, Clone)]
pub struct FailedDecision {
    pub item: TimelineItem,
    pub reply: String,
    pub error: String,
}

/// Outcome of one timeline attempt
#[derive(Debug)]
pub struct TimelineOutcome {
    pub attempt_id: Uuid,
    pub responded: Vec<Decision>,
    pub ignored: Vec<TimelineItem>,
    pub failed: Vec<FailedDecision>,
    /// Items skipped because classification itself errored
    pub classify_errors: usize,
    /// Accepted items skipped because generation errored
    pub generate_errors: usize,
    /// Watermark after the attempt, if one exists
    pub watermark: Option<i64>,
}

pub struct TimelineProcessor {
    platform: Arc<dyn PlatformClient>,
    learner: Arc<dyn Learner>,
    posts: Arc<PostStore>,
    persona: SharedPersona,
    account_id: String,
    batch_size: usize,
    retry: RetryPolicy,
}

impl TimelineProcessor {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        learner: Arc<dyn Learner>,
        posts: Arc<PostStore>,
        persona: SharedPersona,
        account_id: String,
        batch_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            platform,
            learner,
            posts,
            persona,
            account_id,
            batch_size,
            retry,
        }
    }

    /// Run one timeline attempt. With `reply_enabled = false` the pipeline
    /// runs through generation but nothing is published or persisted and
    /// the watermark still advances (dry-run).
    pub async fn process(&self, reply_enabled: bool) -> Result<TimelineOutcome> {
        let attempt_id = Uuid::new_v4();
        let since = self
            .posts
            .watermark(&self.account_id)
            .context("reading timeline watermark")?;

        let items = with_backoff("get_timeline", &self.retry, || {
            self.platform
                .get_timeline(&self.account_id, since, self.batch_size)
        })
        .await
        .context("fetching timeline")?;

        debug!(
            attempt = %attempt_id,
            since = ?since,
            fetched = items.len(),
            "timeline attempt started"
        );

        let mut outcome = TimelineOutcome {
            attempt_id,
            responded: Vec::new(),
            ignored: Vec::new(),
            failed: Vec::new(),
            classify_errors: 0,
            generate_errors: 0,
            watermark: since,
        };

        // Highest id seen this attempt, and the lowest id whose Post row
        // could not be written. The watermark may cross everything below
        // the latter but never the persistence failure itself.
        let mut highest_seen: Option<i64> = None;
        let mut lowest_persist_failure: Option<i64> = None;

        for item in items {
            // own posts count as processed, otherwise the watermark stalls
            // below them and they are refetched on every tick
            highest_seen = Some(highest_seen.map_or(item.id, |h| h.max(item.id)));
            if item.author_id == self.account_id {
                outcome.ignored.push(item);
                continue;
            }

            let accepted = match self.classify_both(&item).await {
                Ok(accepted) => accepted,
                Err(err) => {
                    // fail-safe: an unclassifiable item is treated as ignore
                    warn!(attempt = %attempt_id, item = item.id, "classify failed: {}", err);
                    outcome.classify_errors += 1;
                    outcome.ignored.push(item);
                    continue;
                }
            };
            if !accepted {
                outcome.ignored.push(item);
                continue;
            }

            let persona = self.persona.get();
            let reply = match self.learner.generate(&item, &persona).await {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(attempt = %attempt_id, item = item.id, "generate failed: {}", err);
                    outcome.generate_errors += 1;
                    continue;
                }
            };

            if !reply_enabled {
                debug!(attempt = %attempt_id, item = item.id, "reply disabled, would respond");
                outcome.responded.push(Decision {
                    item,
                    reply,
                    post_id: None,
                });
                continue;
            }

            let published = with_backoff("reply", &self.retry, || {
                self.platform.reply(item.id, &reply)
            })
            .await;

            match published {
                Ok(post_id) => {
                    if let Err(err) = self.persist_post(&post_id, &item, &reply) {
                        warn!(
                            attempt = %attempt_id,
                            item = item.id,
                            post_id = %post_id,
                            "post row write failed, holding watermark: {}",
                            err
                        );
                        lowest_persist_failure =
                            Some(lowest_persist_failure.map_or(item.id, |l| l.min(item.id)));
                        outcome.failed.push(FailedDecision {
                            item,
                            reply,
                            error: err.to_string(),
                        });
                        continue;
                    }
                    info!(attempt = %attempt_id, item = item.id, post_id = %post_id, "replied");
                    outcome.responded.push(Decision {
                        item,
                        reply,
                        post_id: Some(post_id),
                    });
                }
                Err(err) => {
                    warn!(attempt = %attempt_id, item = item.id, "publish failed: {}", err);
                    outcome.failed.push(FailedDecision {
                        item,
                        reply,
                        error: err.to_string(),
                    });
                }
            }
        }

        if let Some(mut candidate) = highest_seen {
            if let Some(blocked) = lowest_persist_failure {
                candidate = candidate.min(blocked - 1);
            }
            if since.map_or(candidate >= 0, |w| candidate > w) {
                let effective = self
                    .posts
                    .advance_watermark(&self.account_id, candidate)
                    .context("advancing timeline watermark")?;
                outcome.watermark = Some(effective);
            }
        }

        info!(
            attempt = %attempt_id,
            responded = outcome.responded.len(),
            ignored = outcome.ignored.len(),
            failed = outcome.failed.len(),
            classify_errors = outcome.classify_errors,
            watermark = ?outcome.watermark,
            "timeline attempt finished"
        );
        Ok(outcome)
    }

    /// Both criteria must accept for the item to get a reply
    async fn classify_both(&self, item: &TimelineItem) -> Result<bool> {
        let newsworthy = self
            .learner
            .classify(item, ClassifyCriteria::Newsworthy)
            .await?;
        if !newsworthy {
            return Ok(false);
        }
        let substantive = self
            .learner
            .classify(item, ClassifyCriteria::SubstantiveIdea)
            .await?;
        Ok(substantive)
    }

    /// Post row write with a short immediate-retry loop. The publish already
    /// succeeded by this point, so we try hard before giving up.
    fn persist_post(&self, post_id: &str, item: &TimelineItem, reply: &str) -> Result<()> {
        let prompt = format!("Reply to tweet: {}", item.text);
        let mut last_err = None;
        for _ in 0..PERSIST_ATTEMPTS {
            match self.posts.add_post(post_id, &prompt, reply, true) {
                Ok(()) => return Ok(()),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("post write failed")))
    }
}
