//! Bootstrap
//!
//! One-time startup sequence: follow the configured accounts, pull a text
//! corpus from their recent posts, and run the learner's initial fit. The
//! loop does not start until this succeeds; a bot with no fitted model has
//! nothing sensible to say.
//!
//! Individual follow failures are tolerated (a suspended or renamed account
//! should not brick startup), but an empty corpus or a failed initial fit
//! is fatal.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::BootstrapConfig;
use crate::learner::Learner;
use crate::platform::{with_backoff, PlatformClient, RetryPolicy};
use crate::store::{CommunityMember, CommunityStore};

/// What bootstrap accomplished
#[derive(Debug)]
pub struct BootstrapReport {
    pub followed: usize,
    pub corpus_posts: usize,
    pub corpus_chars: usize,
    pub checkpoint_ref: String,
}

pub struct Bootstrapper {
    platform: Arc<dyn PlatformClient>,
    learner: Arc<dyn Learner>,
    community: Arc<CommunityStore>,
    accounts_to_follow: Vec<String>,
    config: BootstrapConfig,
    retry: RetryPolicy,
}

impl Bootstrapper {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        learner: Arc<dyn Learner>,
        community: Arc<CommunityStore>,
        accounts_to_follow: Vec<String>,
        config: BootstrapConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            platform,
            learner,
            community,
            accounts_to_follow,
            config,
            retry,
        }
    }

    pub async fn run(&self) -> Result<BootstrapReport> {
        let members = self.follow_accounts().await?;
        let (corpus, corpus_posts) = self.pull_corpus(&members).await?;
        if corpus.is_empty() {
            bail!("bootstrap corpus is empty; cannot run initial fit");
        }
        let corpus_chars = corpus.iter().map(|t| t.len()).sum();

        let checkpoint = self
            .learner
            .initial_fit(&corpus)
            .await
            .context("initial fit")?;

        info!(
            followed = members.len(),
            corpus_posts,
            corpus_chars,
            checkpoint = %checkpoint,
            "bootstrap finished"
        );
        Ok(BootstrapReport {
            followed: members.len(),
            corpus_posts,
            corpus_chars,
            checkpoint_ref: checkpoint.0,
        })
    }

    /// Follow each configured handle and record it as a community member.
    /// Unknown handles and refused follows are logged and skipped.
    async fn follow_accounts(&self) -> Result<Vec<CommunityMember>> {
        let mut members = Vec::new();
        for handle in &self.accounts_to_follow {
            let profile = match with_backoff("get_user_by_handle", &self.retry, || {
                self.platform.get_user_by_handle(handle)
            })
            .await
            {
                Ok(Some(profile)) => profile,
                Ok(None) => {
                    warn!("handle {} not found, skipping", handle);
                    continue;
                }
                Err(err) => {
                    warn!("lookup for {} failed, skipping: {}", handle, err);
                    continue;
                }
            };

            match with_backoff("follow", &self.retry, || {
                self.platform.follow(&profile.user_id)
            })
            .await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!("platform refused follow of {}, keeping as member", handle);
                }
                Err(err) => {
                    warn!("follow of {} failed, skipping: {}", handle, err);
                    continue;
                }
            }

            let member = CommunityMember {
                user_id: profile.user_id.clone(),
                handle: profile.handle.clone(),
                followers: profile.followers,
                following: profile.following,
                bio: profile.bio.clone(),
                location: profile.location.clone(),
                summary: format!(
                    "@{} ({} followers): {}",
                    profile.handle, profile.followers, profile.bio
                ),
            };
            self.community
                .upsert_member(&member)
                .context("recording community member")?;
            members.push(member);
        }
        Ok(members)
    }

    /// Pull recent posts from each member and interleave them round-robin
    /// until the character budget is reached, so one prolific account
    /// cannot crowd out the rest of the corpus.
    async fn pull_corpus(&self, members: &[CommunityMember]) -> Result<(Vec<String>, usize)> {
        let mut per_member: Vec<Vec<String>> = Vec::with_capacity(members.len());
        for member in members {
            let posts = match with_backoff("get_user_posts", &self.retry, || {
                self.platform
                    .get_user_posts(&member.user_id, self.config.posts_per_user)
            })
            .await
            {
                Ok(posts) => posts,
                Err(err) => {
                    warn!("corpus pull from @{} failed: {}", member.handle, err);
                    Vec::new()
                }
            };
            per_member.push(posts.into_iter().map(|p| p.text).collect());
        }

        let mut corpus = Vec::new();
        let mut chars = 0usize;
        let mut index = 0;
        'outer: loop {
            let mut any = false;
            for posts in &per_member {
                if let Some(text) = posts.get(index) {
                    any = true;
                    chars += text.len();
                    corpus.push(text.clone());
                    if chars >= self.config.corpus_char_budget {
                        break 'outer;
                    }
                }
            }
            if !any {
                break;
            }
            index += 1;
        }

        let count = corpus.len();
        Ok((corpus, count))
    }
}
