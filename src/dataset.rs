//! Dataset Building and Training
//!
//! Joins published posts against their most recent engagement sample and
//! reply volume, hands the resulting examples to the learner, and records
//! the returned checkpoint reference. Posts with no sample yet are left out
//! of the dataset rather than given a zero signal; they join once the
//! tracker has seen them.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::learner::{EngagementSignal, Learner, TrainingExample};
use crate::store::{EngagementStore, PostStore, ReplyStore, TrainingStore};

/// Outcome of one training attempt
#[derive(Debug)]
pub enum TrainingRun {
    Completed {
        attempt_id: Uuid,
        examples_used: usize,
        checkpoint_ref: String,
    },
    /// Not enough joined examples yet; the learner was not called
    Skipped { attempt_id: Uuid, examples: usize },
}

pub struct DatasetBuilder {
    learner: Arc<dyn Learner>,
    posts: Arc<PostStore>,
    engagement: Arc<EngagementStore>,
    replies: Arc<ReplyStore>,
    training: Arc<TrainingStore>,
    min_examples: usize,
}

impl DatasetBuilder {
    pub fn new(
        learner: Arc<dyn Learner>,
        posts: Arc<PostStore>,
        engagement: Arc<EngagementStore>,
        replies: Arc<ReplyStore>,
        training: Arc<TrainingStore>,
        min_examples: usize,
    ) -> Self {
        Self {
            learner,
            posts,
            engagement,
            replies,
            training,
            min_examples,
        }
    }

    /// Posts joined with their latest sample and reply count
    pub fn build_dataset(&self) -> Result<Vec<TrainingExample>> {
        let posts = self.posts.all_posts().context("listing posts")?;
        let latest: HashMap<String, _> = self
            .engagement
            .latest_samples()
            .context("reading latest samples")?
            .into_iter()
            .map(|s| (s.post_id.clone(), s))
            .collect();
        let reply_counts = self.replies.reply_counts().context("counting replies")?;

        let examples = posts
            .into_iter()
            .filter_map(|post| {
                let sample = latest.get(&post.post_id)?;
                Some(TrainingExample {
                    prompt: post.prompt,
                    content: post.content,
                    engagement: EngagementSignal {
                        likes: sample.likes,
                        retweets: sample.retweets,
                        replies: reply_counts.get(&post.post_id).copied().unwrap_or(0),
                    },
                })
            })
            .collect();
        Ok(examples)
    }

    /// Build the dataset and run one training pass over it. Returns
    /// `Skipped` without touching the learner when the dataset is too small.
    pub async fn build_and_train(&self) -> Result<TrainingRun> {
        let attempt_id = Uuid::new_v4();
        let examples = self.build_dataset()?;

        if examples.len() < self.min_examples {
            debug!(
                attempt = %attempt_id,
                examples = examples.len(),
                min = self.min_examples,
                "dataset too small, skipping training"
            );
            return Ok(TrainingRun::Skipped {
                attempt_id,
                examples: examples.len(),
            });
        }

        let checkpoint = self
            .learner
            .train(&examples)
            .await
            .context("training run")?;
        self.training
            .record_checkpoint(&checkpoint.0, examples.len())
            .context("recording checkpoint")?;

        info!(
            attempt = %attempt_id,
            examples = examples.len(),
            checkpoint = %checkpoint,
            "training finished"
        );
        Ok(TrainingRun::Completed {
            attempt_id,
            examples_used: examples.len(),
            checkpoint_ref: checkpoint.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EngagementSample;
    use crate::testkit::MockLearner;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn builder(
        learner: Arc<MockLearner>,
        dir: &TempDir,
        min_examples: usize,
    ) -> DatasetBuilder {
        let db = dir.path().join("test.db");
        DatasetBuilder::new(
            learner,
            Arc::new(PostStore::open(&db).unwrap()),
            Arc::new(EngagementStore::open(&db).unwrap()),
            Arc::new(ReplyStore::open(&db).unwrap()),
            Arc::new(TrainingStore::open(&db).unwrap()),
            min_examples,
        )
    }

    fn seed_post(builder: &DatasetBuilder, post_id: &str, likes: i64, at: i64) {
        builder
            .posts
            .add_post(post_id, &format!("prompt {}", post_id), "content", true)
            .unwrap();
        builder
            .engagement
            .add_sample(&EngagementSample {
                post_id: post_id.to_string(),
                retrieved_at: at,
                likes,
                retweets: likes / 2,
                quotes_path: None,
                comments_path: None,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn below_threshold_skips_without_calling_the_learner() {
        let learner = Arc::new(MockLearner::default());
        let dir = TempDir::new().unwrap();
        let builder = builder(learner.clone(), &dir, 3);
        seed_post(&builder, "p1", 5, 100);

        let run = builder.build_and_train().await.unwrap();
        assert!(matches!(run, TrainingRun::Skipped { examples: 1, .. }));
        assert_eq!(learner.train_calls.load(Ordering::SeqCst), 0);
        assert_eq!(builder.training.latest_checkpoint().unwrap(), None);
    }

    #[tokio::test]
    async fn trains_and_records_checkpoint_at_threshold() {
        let learner = Arc::new(MockLearner::default());
        let dir = TempDir::new().unwrap();
        let builder = builder(learner.clone(), &dir, 2);
        seed_post(&builder, "p1", 5, 100);
        seed_post(&builder, "p2", 9, 100);

        let run = builder.build_and_train().await.unwrap();
        match run {
            TrainingRun::Completed {
                examples_used,
                checkpoint_ref,
                ..
            } => {
                assert_eq!(examples_used, 2);
                assert_eq!(checkpoint_ref, "ckpt/001");
            }
            other => panic!("expected completed run, got {:?}", other),
        }
        assert_eq!(
            builder.training.latest_checkpoint().unwrap().as_deref(),
            Some("ckpt/001")
        );
        assert_eq!(learner.trained_examples.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dataset_uses_latest_sample_and_reply_volume() {
        let learner = Arc::new(MockLearner::default());
        let dir = TempDir::new().unwrap();
        let builder = builder(learner, &dir, 1);
        seed_post(&builder, "p1", 2, 100);
        // a later sample supersedes the first in the dataset
        builder
            .engagement
            .add_sample(&EngagementSample {
                post_id: "p1".to_string(),
                retrieved_at: 200,
                likes: 11,
                retweets: 3,
                quotes_path: None,
                comments_path: None,
            })
            .unwrap();
        builder.replies.add_reply("p1", "r1", true).unwrap();
        builder.replies.add_reply("p1", "r2", false).unwrap();
        // a post with no sample yet stays out of the dataset
        builder.posts.add_post("p2", "p", "c", true).unwrap();

        let examples = builder.build_dataset().unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].engagement.likes, 11);
        assert_eq!(examples[0].engagement.retweets, 3);
        assert_eq!(examples[0].engagement.replies, 2);
    }

    #[tokio::test]
    async fn learner_failure_records_no_checkpoint() {
        let learner = Arc::new(MockLearner::default());
        *learner.fail_training.lock().unwrap() = true;
        let dir = TempDir::new().unwrap();
        let builder = builder(learner, &dir, 1);
        seed_post(&builder, "p1", 5, 100);

        assert!(builder.build_and_train().await.is_err());
        assert_eq!(builder.training.latest_checkpoint().unwrap(), None);
    }
}
