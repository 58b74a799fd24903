//! Engagement Store
//!
//! Append-only time series of engagement samples. The key is composite
//! (post_id, retrieved_at): one post accumulates many samples over its
//! tracking window, and samples are never mutated in place. Counts are
//! expected to be non-decreasing across samples but that is advisory only.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::open_connection;

/// One engagement sample for one post at one retrieval time
#[derive(Debug, Clone)]
pub struct EngagementSample {
    pub post_id: String,
    pub retrieved_at: i64,
    pub likes: i64,
    pub retweets: i64,
    /// Path to the quotes snapshot JSON, if any quotes existed
    pub quotes_path: Option<String>,
    /// Path to the comments snapshot JSON, if any comments existed
    pub comments_path: Option<String>,
}

/// Per-post sampling summary used for retirement decisions
#[derive(Debug, Clone, Copy)]
pub struct SampleSummary {
    pub samples: i64,
    pub latest_at: i64,
}

pub struct EngagementStore {
    conn: Mutex<Connection>,
}

impl EngagementStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS engagement_samples (
                post_id TEXT NOT NULL,
                retrieved_at INTEGER NOT NULL,
                likes INTEGER NOT NULL,
                retweets INTEGER NOT NULL,
                quotes_path TEXT,
                comments_path TEXT,
                PRIMARY KEY (post_id, retrieved_at)
            );

            CREATE INDEX IF NOT EXISTS idx_samples_post
                ON engagement_samples(post_id, retrieved_at DESC);
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("lock error: {}", e))
    }

    /// Append one sample
    pub fn add_sample(&self, sample: &EngagementSample) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO engagement_samples
                (post_id, retrieved_at, likes, retweets, quotes_path, comments_path)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                sample.post_id,
                sample.retrieved_at,
                sample.likes,
                sample.retweets,
                sample.quotes_path,
                sample.comments_path
            ],
        )?;
        Ok(())
    }

    /// Full history for one post, oldest first (audit path)
    pub fn samples_for_post(&self, post_id: &str) -> Result<Vec<EngagementSample>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT post_id, retrieved_at, likes, retweets, quotes_path, comments_path
            FROM engagement_samples
            WHERE post_id = ?1
            ORDER BY retrieved_at
            "#,
        )?;
        let rows = stmt
            .query_map(params![post_id], Self::row_to_sample)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Sample count and latest retrieval time per post
    pub fn sample_summaries(&self) -> Result<HashMap<String, SampleSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT post_id, COUNT(*), MAX(retrieved_at)
            FROM engagement_samples
            GROUP BY post_id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                SampleSummary {
                    samples: row.get(1)?,
                    latest_at: row.get(2)?,
                },
            ))
        })?;

        let mut summaries = HashMap::new();
        for row in rows {
            let (post_id, summary) = row?;
            summaries.insert(post_id, summary);
        }
        Ok(summaries)
    }

    /// The most recent sample per post (reward signal for training).
    /// Earlier samples stay in the store for audit but are not returned.
    pub fn latest_samples(&self) -> Result<Vec<EngagementSample>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.post_id, s.retrieved_at, s.likes, s.retweets, s.quotes_path, s.comments_path
            FROM engagement_samples s
            WHERE s.retrieved_at = (
                SELECT MAX(retrieved_at) FROM engagement_samples
                WHERE post_id = s.post_id
            )
            "#,
        )?;
        let rows = stmt
            .query_map([], Self::row_to_sample)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_sample(row: &rusqlite::Row<'_>) -> rusqlite::Result<EngagementSample> {
        Ok(EngagementSample {
            post_id: row.get(0)?,
            retrieved_at: row.get(1)?,
            likes: row.get(2)?,
            retweets: row.get(3)?,
            quotes_path: row.get(4)?,
            comments_path: row.get(5)?,
        })
    }
}
