//! Deterministic fakes for the capability boundaries, used across the
//! crate's unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::Persona;
use crate::learner::{
    CheckpointRef, ClassifyCriteria, Learner, LearnerError, TrainingExample,
};
use crate::platform::{
    EngagementMetrics, PlatformClient, PlatformError, TimelineItem, UserProfile,
};

pub fn item(id: i64, author: &str, text: &str) -> TimelineItem {
    TimelineItem {
        id,
        author_id: author.to_string(),
        text: text.to_string(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

pub fn persona() -> Persona {
    Persona {
        name: "Vibe".into(),
        description: "a curious observer of technology".into(),
        tone: "dry".into(),
        interests: vec!["ai".into()],
        adaptive: true,
    }
}

/// Scripted outcome for a publish/reply call
pub enum PublishScript {
    Ok(String),
    Fail,
    RateLimited,
}

/// Deterministic platform fake. Timeline items are served newest-first
/// and filtered by the caller's watermark, like the real platform.
#[derive(Default)]
pub struct MockPlatform {
    pub timeline: Mutex<Vec<TimelineItem>>,
    /// Reply outcome per parent item id; missing = Ok("r<parent>")
    pub reply_script: Mutex<HashMap<i64, PublishScript>>,
    pub metrics: Mutex<HashMap<String, EngagementMetrics>>,
    /// Post ids whose metrics fetch should fail
    pub metrics_failures: Mutex<Vec<String>>,
    pub users: Mutex<HashMap<String, UserProfile>>,
    pub user_posts: Mutex<HashMap<String, Vec<TimelineItem>>>,
    pub publish_calls: AtomicUsize,
    pub timeline_calls: AtomicUsize,
    pub follow_calls: AtomicUsize,
}

impl MockPlatform {
    pub fn with_timeline(items: Vec<TimelineItem>) -> Self {
        let platform = Self::default();
        *platform.timeline.lock().unwrap() = items;
        platform
    }

    pub fn script_reply(&self, parent_id: i64, script: PublishScript) {
        self.reply_script.lock().unwrap().insert(parent_id, script);
    }

    pub fn set_metrics(&self, post_id: &str, metrics: EngagementMetrics) {
        self.metrics
            .lock()
            .unwrap()
            .insert(post_id.to_string(), metrics);
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn get_timeline(
        &self,
        _account_id: &str,
        since: Option<i64>,
        limit: usize,
    ) -> Result<Vec<TimelineItem>, PlatformError> {
        self.timeline_calls.fetch_add(1, Ordering::SeqCst);
        let mut items: Vec<TimelineItem> = self
            .timeline
            .lock()
            .unwrap()
            .iter()
            .filter(|i| since.map(|w| i.id > w).unwrap_or(true))
            .cloned()
            .collect();
        items.sort_by_key(|i| std::cmp::Reverse(i.id));
        items.truncate(limit);
        Ok(items)
    }

    async fn publish(&self, _text: &str) -> Result<String, PlatformError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("pub{}", self.publish_calls.load(Ordering::SeqCst)))
    }

    async fn reply(&self, parent_id: i64, _text: &str) -> Result<String, PlatformError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        match self.reply_script.lock().unwrap().get(&parent_id) {
            Some(PublishScript::Ok(id)) => Ok(id.clone()),
            Some(PublishScript::Fail) => Err(PlatformError::Api {
                status: 403,
                message: "rejected".into(),
            }),
            Some(PublishScript::RateLimited) => {
                Err(PlatformError::RateLimited { retry_after: 1 })
            }
            None => Ok(format!("r{}", parent_id)),
        }
    }

    async fn quote(&self, parent_id: i64, _text: &str) -> Result<String, PlatformError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("q{}", parent_id))
    }

    async fn get_metrics(&self, post_id: &str) -> Result<EngagementMetrics, PlatformError> {
        if self
            .metrics_failures
            .lock()
            .unwrap()
            .iter()
            .any(|p| p == post_id)
        {
            return Err(PlatformError::Api {
                status: 404,
                message: "not found".into(),
            });
        }
        Ok(self
            .metrics
            .lock()
            .unwrap()
            .get(post_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn follow(&self, _user_id: &str) -> Result<bool, PlatformError> {
        self.follow_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn get_user_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<UserProfile>, PlatformError> {
        let handle = handle.trim_start_matches('@');
        Ok(self.users.lock().unwrap().get(handle).cloned())
    }

    async fn get_user_posts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<TimelineItem>, PlatformError> {
        let mut posts = self
            .user_posts
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        posts.truncate(limit);
        Ok(posts)
    }
}

/// Deterministic learner fake
#[derive(Default)]
pub struct MockLearner {
    /// Item ids accepted by classification; everything else is rejected
    pub accept: Mutex<Vec<i64>>,
    /// Item ids whose classification errors out
    pub classify_failures: Mutex<Vec<i64>>,
    /// Item ids whose generation errors out
    pub generate_failures: Mutex<Vec<i64>>,
    pub train_calls: AtomicUsize,
    pub fit_calls: AtomicUsize,
    pub trained_examples: Mutex<Vec<TrainingExample>>,
    pub fitted_corpus: Mutex<Vec<String>>,
    pub fail_training: Mutex<bool>,
}

impl MockLearner {
    pub fn accepting(ids: &[i64]) -> Self {
        let learner = Self::default();
        *learner.accept.lock().unwrap() = ids.to_vec();
        learner
    }
}

#[async_trait]
impl Learner for MockLearner {
    async fn classify(
        &self,
        item: &TimelineItem,
        _criteria: ClassifyCriteria,
    ) -> Result<bool, LearnerError> {
        if self.classify_failures.lock().unwrap().contains(&item.id) {
            return Err(LearnerError::Timeout);
        }
        Ok(self.accept.lock().unwrap().contains(&item.id))
    }

    async fn generate(
        &self,
        item: &TimelineItem,
        _persona: &Persona,
    ) -> Result<String, LearnerError> {
        if self.generate_failures.lock().unwrap().contains(&item.id) {
            return Err(LearnerError::Timeout);
        }
        Ok(format!("reply to {}", item.id))
    }

    async fn train(&self, examples: &[TrainingExample]) -> Result<CheckpointRef, LearnerError> {
        self.train_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_training.lock().unwrap() {
            return Err(LearnerError::Service {
                status: 500,
                message: "training crashed".into(),
            });
        }
        self.trained_examples
            .lock()
            .unwrap()
            .extend(examples.iter().cloned());
        Ok(CheckpointRef(format!(
            "ckpt/{:03}",
            self.train_calls.load(Ordering::SeqCst)
        )))
    }

    async fn initial_fit(&self, corpus: &[String]) -> Result<CheckpointRef, LearnerError> {
        self.fit_calls.fetch_add(1, Ordering::SeqCst);
        self.fitted_corpus
            .lock()
            .unwrap()
            .extend(corpus.iter().cloned());
        Ok(CheckpointRef("ckpt/initial".into()))
    }
}
