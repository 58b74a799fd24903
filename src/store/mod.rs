//! Durable State
//!
//! SQLite-backed stores, one per entity, each holding its own connection
//! behind its own mutex so one cadence never blocks another on a global
//! lock. Stores hold no business logic; components read and append through
//! narrow per-entity APIs and never reference each other.

pub mod community;
pub mod engagement;
pub mod posts;
pub mod replies;
pub mod training;

pub use community::{CommunityMember, CommunityStore};
pub use engagement::{EngagementSample, EngagementStore, SampleSummary};
pub use posts::{PostRecord, PostStore};
pub use replies::{ReplyRecord, ReplyStore};
pub use training::TrainingStore;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Open a connection on the shared database file.
///
/// WAL plus a busy timeout lets the per-entity connections interleave
/// without "database is locked" failures.
pub(crate) fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(conn)
}

/// All stores, opened on one database file. Each store is shared by the
/// cadences that use it, so they are handed out as Arcs.
pub struct Stores {
    pub posts: Arc<PostStore>,
    pub engagement: Arc<EngagementStore>,
    pub community: Arc<CommunityStore>,
    pub replies: Arc<ReplyStore>,
    pub training: Arc<TrainingStore>,
}

impl Stores {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            posts: Arc::new(PostStore::open(path)?),
            engagement: Arc::new(EngagementStore::open(path)?),
            community: Arc::new(CommunityStore::open(path)?),
            replies: Arc::new(ReplyStore::open(path)?),
            training: Arc::new(TrainingStore::open(path)?),
        })
    }
}
