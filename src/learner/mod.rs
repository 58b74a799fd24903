//! Learner Capability Boundary
//!
//! Classification, generation, and model fitting live in an external
//! collaborator. The core only pairs prompts with raw engagement tuples;
//! reward shaping stays on the learner's side so it can be swapped without
//! touching the loop.

pub mod service;

pub use service::LearnerService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Persona;
use crate::platform::TimelineItem;

/// Error types for learner operations
#[derive(Debug, thiserror::Error)]
pub enum LearnerError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("learner error {status}: {message}")]
    Service { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for LearnerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LearnerError::Timeout
        } else {
            LearnerError::Network(err.to_string())
        }
    }
}

/// Criteria a timeline item is classified against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyCriteria {
    /// Touches on newsworthy topics
    Newsworthy,
    /// Introduces a substantive idea worth engaging with
    SubstantiveIdea,
}

impl ClassifyCriteria {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifyCriteria::Newsworthy => "newsworthy",
            ClassifyCriteria::SubstantiveIdea => "substantive_idea",
        }
    }
}

/// Raw engagement signal attached to a training example.
/// Deliberately a tuple of counts, never a computed scalar.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngagementSignal {
    pub likes: i64,
    pub retweets: i64,
    pub replies: i64,
}

/// One (prompt, content, engagement) training example
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    pub prompt: String,
    pub content: String,
    pub engagement: EngagementSignal,
}

/// Opaque reference to a trained checkpoint (path or identifier).
/// The checkpoint bytes are the learner's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRef(pub String);

impl std::fmt::Display for CheckpointRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Learner trait - classification, generation, and fitting
#[async_trait]
pub trait Learner: Send + Sync {
    /// Does the item satisfy the criterion?
    async fn classify(
        &self,
        item: &TimelineItem,
        criteria: ClassifyCriteria,
    ) -> Result<bool, LearnerError>;

    /// Generate a response to the item, conditioned on the persona
    async fn generate(
        &self,
        item: &TimelineItem,
        persona: &Persona,
    ) -> Result<String, LearnerError>;

    /// Fine-tune on performance-tagged examples
    async fn train(&self, examples: &[TrainingExample]) -> Result<CheckpointRef, LearnerError>;

    /// One-time initial fit on a raw text corpus
    async fn initial_fit(&self, corpus: &[String]) -> Result<CheckpointRef, LearnerError>;
}
