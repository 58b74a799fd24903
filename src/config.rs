//! Configuration management
//!
//! TOML config file for everything tunable, environment variables for
//! secrets (`X_BEARER_TOKEN`, `LEARNER_URL` override).

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Persona the generator is conditioned on
#[derive(Debug, Clone, Deserialize)]
pub struct Persona {
    pub name: String,
    pub description: String,
    pub tone: String,
    pub interests: Vec<String>,
    /// Whether the persona may be updated at runtime
    #[serde(default)]
    pub adaptive: bool,
}

impl Persona {
    /// Render the persona as prompt context for the learner
    pub fn render(&self) -> String {
        format!(
            "You are {}, {}. Your tone is: {}. Your interests include: {}.",
            self.name,
            self.description,
            self.tone,
            self.interests.join(", ")
        )
    }
}

/// Shared persona handle.
///
/// The persona is explicit state passed to each cadence, never a global.
/// Updates go through the single setter; reads take a short lock.
#[derive(Clone)]
pub struct SharedPersona {
    inner: Arc<RwLock<Persona>>,
}

impl SharedPersona {
    pub fn new(persona: Persona) -> Self {
        Self {
            inner: Arc::new(RwLock::new(persona)),
        }
    }

    pub fn get(&self) -> Persona {
        self.inner.read().clone()
    }

    /// Replace the persona. No-op unless the configured persona is adaptive.
    pub fn set(&self, persona: Persona) {
        let mut guard = self.inner.write();
        if guard.adaptive {
            *guard = persona;
        }
    }
}

/// Cadence intervals and batch limits
#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    /// Max timeline items fetched per attempt
    #[serde(default = "default_timeline_batch")]
    pub timeline_batch_size: usize,
    #[serde(default = "default_timeline_interval")]
    pub timeline_interval_secs: u64,
    #[serde(default = "default_engagement_interval")]
    pub engagement_interval_secs: u64,
    #[serde(default = "default_training_interval")]
    pub training_interval_secs: u64,
    /// A post is retired once its latest sample is older than this
    /// and at least `min_samples_before_retirement` samples exist
    #[serde(default = "default_max_tracking_age")]
    pub max_tracking_age_secs: i64,
    #[serde(default = "default_min_samples")]
    pub min_samples_before_retirement: i64,
    /// Training is skipped below this many joined examples
    #[serde(default = "default_min_examples")]
    pub min_training_examples: usize,
    /// How long shutdown waits for in-flight attempts
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
    /// When false the pipeline runs but nothing is published (dry-run)
    #[serde(default = "default_reply_enabled")]
    pub reply_enabled: bool,
}

fn default_timeline_batch() -> usize {
    50
}
fn default_timeline_interval() -> u64 {
    900
}
fn default_engagement_interval() -> u64 {
    1800
}
fn default_training_interval() -> u64 {
    86400
}
fn default_max_tracking_age() -> i64 {
    7 * 86400
}
fn default_min_samples() -> i64 {
    3
}
fn default_min_examples() -> usize {
    16
}
fn default_shutdown_grace() -> u64 {
    30
}
fn default_reply_enabled() -> bool {
    true
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            timeline_batch_size: default_timeline_batch(),
            timeline_interval_secs: default_timeline_interval(),
            engagement_interval_secs: default_engagement_interval(),
            training_interval_secs: default_training_interval(),
            max_tracking_age_secs: default_max_tracking_age(),
            min_samples_before_retirement: default_min_samples(),
            min_training_examples: default_min_examples(),
            shutdown_grace_secs: default_shutdown_grace(),
            reply_enabled: default_reply_enabled(),
        }
    }
}

/// Platform API settings
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// The bot's own account id on the platform
    pub account_id: String,
    /// Handles followed at bootstrap (corpus sources)
    #[serde(default)]
    pub accounts_to_follow: Vec<String>,
    #[serde(default = "default_api_base")]
    pub base_url: String,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Retry ceiling for transient errors within one tick
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_base() -> String {
    "https://api.x.com/2".to_string()
}
fn default_call_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

/// Learner sidecar settings
#[derive(Debug, Clone, Deserialize)]
pub struct LearnerConfig {
    #[serde(default = "default_learner_url")]
    pub base_url: String,
    /// Training calls can be slow; separate generous timeout
    #[serde(default = "default_learner_timeout")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_train_timeout")]
    pub train_timeout_secs: u64,
}

fn default_learner_url() -> String {
    "http://localhost:8600".to_string()
}
fn default_learner_timeout() -> u64 {
    60
}
fn default_train_timeout() -> u64 {
    3600
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            base_url: default_learner_url(),
            call_timeout_secs: default_learner_timeout(),
            train_timeout_secs: default_train_timeout(),
        }
    }
}

/// Bootstrap corpus pull settings
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    /// Approximate corpus size in characters (~4 chars per token)
    #[serde(default = "default_corpus_chars")]
    pub corpus_char_budget: usize,
    /// Posts fetched per community member per round
    #[serde(default = "default_posts_per_user")]
    pub posts_per_user: usize,
}

fn default_corpus_chars() -> usize {
    2_000_000
}
fn default_posts_per_user() -> usize {
    50
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            corpus_char_budget: default_corpus_chars(),
            posts_per_user: default_posts_per_user(),
        }
    }
}

/// Storage paths
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Quote/comment snapshots are written here as JSON files
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/vibebot.db")
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("data/snapshots")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub platform: PlatformConfig,
    pub persona: Persona,
    #[serde(default)]
    pub r#loop: LoopConfig,
    #[serde(default)]
    pub learner: LearnerConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Bearer token; normally injected from X_BEARER_TOKEN instead
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Config {
    /// Load from a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        if let Ok(token) = std::env::var("X_BEARER_TOKEN") {
            config.bearer_token = Some(token);
        }
        if let Ok(url) = std::env::var("LEARNER_URL") {
            config.learner.base_url = url;
        }

        Ok(config)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.platform.call_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.r#loop.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
            [platform]
            account_id = "12345"
            accounts_to_follow = ["@alice", "bob"]

            [persona]
            name = "Vibe"
            description = "a curious observer of technology"
            tone = "dry, thoughtful"
            interests = ["ai", "infrastructure"]
            adaptive = true
        "#
    }

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: Config = toml::from_str(sample_toml()).unwrap();
        assert_eq!(config.platform.account_id, "12345");
        assert_eq!(config.r#loop.timeline_batch_size, 50);
        assert_eq!(config.r#loop.min_samples_before_retirement, 3);
        assert_eq!(config.learner.base_url, "http://localhost:8600");
        assert!(config.bearer_token.is_none());
    }

    #[test]
    fn persona_render_mentions_interests() {
        let config: Config = toml::from_str(sample_toml()).unwrap();
        let rendered = config.persona.render();
        assert!(rendered.contains("Vibe"));
        assert!(rendered.contains("ai, infrastructure"));
    }

    #[test]
    fn shared_persona_setter_respects_adaptive_flag() {
        let config: Config = toml::from_str(sample_toml()).unwrap();

        let shared = SharedPersona::new(config.persona.clone());
        let mut updated = config.persona.clone();
        updated.tone = "upbeat".to_string();
        shared.set(updated);
        assert_eq!(shared.get().tone, "upbeat");

        let mut frozen = config.persona.clone();
        frozen.adaptive = false;
        let shared = SharedPersona::new(frozen);
        let mut updated = config.persona.clone();
        updated.tone = "upbeat".to_string();
        shared.set(updated);
        assert_eq!(shared.get().tone, "dry, thoughtful");
    }
}
