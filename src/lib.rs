//! vibebot - an autonomous social media agent
//!
//! The bot watches a platform timeline, decides which items deserve a
//! response, publishes replies in a configured persona, tracks how those
//! replies perform, and periodically fine-tunes its generator on the
//! performance data it has collected.
//!
//! Three cadences run concurrently under the [`coordinator::Coordinator`]:
//!
//! - **timeline**: fetch new items above a persisted watermark, classify,
//!   generate, publish ([`timeline`])
//! - **engagement**: sample metrics for posts still in their tracking
//!   window ([`tracker`])
//! - **training**: join posts with their engagement and fine-tune
//!   ([`dataset`])
//!
//! External collaborators sit behind two traits: the social platform
//! ([`platform::PlatformClient`]) and the model sidecar
//! ([`learner::Learner`]). Everything durable lives in per-entity SQLite
//! stores ([`store`]).

pub mod bootstrap;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod learner;
pub mod platform;
pub mod store;
pub mod timeline;
pub mod tracker;

#[cfg(test)]
pub mod testkit;

pub use config::Config;
pub use coordinator::Coordinator;
