//! Coordinator
//!
//! Owns the three cadences: timeline processing, engagement refresh, and
//! training. Bootstrap runs to completion before any cadence starts. Each
//! cadence ticks on its own interval; a tick that fires while the previous
//! run is still in flight is skipped, never queued. Shutdown lets in-flight
//! attempts finish within a grace window, then aborts what remains.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::bootstrap::Bootstrapper;
use crate::config::{Config, SharedPersona};
use crate::dataset::{DatasetBuilder, TrainingRun};
use crate::learner::Learner;
use crate::platform::{PlatformClient, RetryPolicy};
use crate::store::Stores;
use crate::timeline::TimelineProcessor;
use crate::tracker::EngagementTracker;

/// Skip-if-busy gate around one cadence's work.
///
/// `try_lock` makes overlap impossible without ever queueing: a tick that
/// finds the gate held is dropped on the floor.
pub struct Cadence {
    name: &'static str,
    gate: tokio::sync::Mutex<()>,
}

impl Cadence {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Run `work` unless a previous run is still in flight.
    /// Returns false when the tick was skipped.
    pub async fn run<F, Fut>(&self, work: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        match self.gate.try_lock() {
            Ok(_guard) => {
                work().await;
                true
            }
            Err(_) => {
                warn!("{} tick skipped, previous run still in flight", self.name);
                false
            }
        }
    }
}

pub struct Coordinator {
    config: Config,
    persona: SharedPersona,
    platform: Arc<dyn PlatformClient>,
    learner: Arc<dyn Learner>,
    stores: Stores,
}

impl Coordinator {
    pub fn new(
        config: Config,
        platform: Arc<dyn PlatformClient>,
        learner: Arc<dyn Learner>,
    ) -> Result<Self> {
        let stores = Stores::open(&config.store.db_path).context("opening stores")?;
        let persona = SharedPersona::new(config.persona.clone());
        Ok(Self {
            config,
            persona,
            platform,
            learner,
            stores,
        })
    }

    pub fn persona(&self) -> SharedPersona {
        self.persona.clone()
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.config.platform.max_retries)
    }

    /// Run until `shutdown` flips to true. Bootstrap failure is fatal;
    /// after it succeeds the cadences run until shutdown.
    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<bool>,
        skip_bootstrap: bool,
    ) -> Result<()> {
        if skip_bootstrap {
            info!("bootstrap skipped by request");
        } else {
            let bootstrapper = Bootstrapper::new(
                self.platform.clone(),
                self.learner.clone(),
                self.stores.community.clone(),
                self.config.platform.accounts_to_follow.clone(),
                self.config.bootstrap.clone(),
                self.retry_policy(),
            );
            let report = bootstrapper.run().await.context("bootstrap")?;
            info!(
                followed = report.followed,
                corpus_posts = report.corpus_posts,
                "bootstrap complete, starting cadences"
            );
        }

        let loop_config = &self.config.r#loop;
        let mut handles = vec![
            self.spawn_timeline(shutdown.clone()),
            self.spawn_tracker(shutdown.clone()),
            self.spawn_training(shutdown.clone()),
        ];

        // run() was handed a receiver that may already be signalled
        if !*shutdown.borrow() {
            let _ = shutdown.changed().await;
        }
        info!(
            grace_secs = loop_config.shutdown_grace_secs,
            "shutdown requested, draining cadences"
        );

        let drained = tokio::time::timeout(self.config.shutdown_grace(), async {
            for handle in &mut handles {
                let _ = handle.await;
            }
        })
        .await;
        if drained.is_err() {
            warn!("shutdown grace elapsed, aborting in-flight work");
            for handle in &handles {
                handle.abort();
            }
        }
        info!("coordinator stopped");
        Ok(())
    }

    fn spawn_timeline(&self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let processor = TimelineProcessor::new(
            self.platform.clone(),
            self.learner.clone(),
            self.stores.posts.clone(),
            self.persona.clone(),
            self.config.platform.account_id.clone(),
            self.config.r#loop.timeline_batch_size,
            self.retry_policy(),
        );
        let processor = Arc::new(processor);
        let reply_enabled = self.config.r#loop.reply_enabled;
        let period = Duration::from_secs(self.config.r#loop.timeline_interval_secs);

        tokio::spawn(cadence_loop(
            Cadence::new("timeline"),
            period,
            shutdown,
            move || {
                let processor = processor.clone();
                async move {
                    if let Err(err) = processor.process(reply_enabled).await {
                        warn!("timeline attempt failed: {:#}", err);
                    }
                }
            },
        ))
    }

    fn spawn_tracker(&self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let tracker = EngagementTracker::new(
            self.platform.clone(),
            self.stores.posts.clone(),
            self.stores.engagement.clone(),
            self.stores.replies.clone(),
            self.config.store.snapshot_dir.clone(),
            self.config.r#loop.max_tracking_age_secs,
            self.config.r#loop.min_samples_before_retirement,
            self.retry_policy(),
        );
        let tracker = Arc::new(tracker);
        let period = Duration::from_secs(self.config.r#loop.engagement_interval_secs);

        tokio::spawn(cadence_loop(
            Cadence::new("engagement"),
            period,
            shutdown,
            move || {
                let tracker = tracker.clone();
                async move {
                    if let Err(err) = tracker.refresh().await {
                        warn!("engagement refresh failed: {:#}", err);
                    }
                }
            },
        ))
    }

    fn spawn_training(&self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let builder = DatasetBuilder::new(
            self.learner.clone(),
            self.stores.posts.clone(),
            self.stores.engagement.clone(),
            self.stores.replies.clone(),
            self.stores.training.clone(),
            self.config.r#loop.min_training_examples,
        );
        let builder = Arc::new(builder);
        let period = Duration::from_secs(self.config.r#loop.training_interval_secs);

        tokio::spawn(cadence_loop(
            Cadence::new("training"),
            period,
            shutdown,
            move || {
                let builder = builder.clone();
                async move {
                    match builder.build_and_train().await {
                        Ok(TrainingRun::Completed { examples_used, .. }) => {
                            info!(examples_used, "training cadence completed a run");
                        }
                        Ok(TrainingRun::Skipped { examples, .. }) => {
                            info!(examples, "training cadence skipped (dataset too small)");
                        }
                        Err(err) => warn!("training attempt failed: {:#}", err),
                    }
                }
            },
        ))
    }
}

/// One cadence: tick on `period`, run `work` behind the skip-if-busy gate,
/// exit once shutdown is signalled. In-flight work always completes; the
/// shutdown check happens between ticks.
async fn cadence_loop<F, Fut>(
    cadence: Cadence,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut work: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                cadence.run(&mut work).await;
            }
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            info!("{} cadence stopping", cadence.name);
            break;
        }
    }
}
