//! Reply Store
//!
//! Quotes and comments other users made on the bot's posts, discovered by
//! the engagement tracker. Keyed by (origin post id, reply id) so repeated
//! discovery of the same reply is a no-op.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::open_connection;

/// One quote or comment on a tracked post
#[derive(Debug, Clone)]
pub struct ReplyRecord {
    pub post_id: String,
    pub reply_id: String,
    /// true = comment in the thread, false = quote post
    pub is_comment: bool,
    pub replied_at: i64,
}

pub struct ReplyStore {
    conn: Mutex<Connection>,
}

impl ReplyStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS replies (
                post_id TEXT NOT NULL,
                reply_id TEXT NOT NULL,
                is_comment INTEGER NOT NULL,
                replied_at INTEGER NOT NULL,
                PRIMARY KEY (post_id, reply_id)
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("lock error: {}", e))
    }

    /// Insert a reply if not already known. Returns true if it was new.
    pub fn add_reply(&self, post_id: &str, reply_id: &str, is_comment: bool) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO replies (post_id, reply_id, is_comment, replied_at)
            VALUES (?1, ?2, ?3, unixepoch())
            "#,
            params![post_id, reply_id, is_comment as i64],
        )?;
        Ok(inserted > 0)
    }

    pub fn replies_for_post(&self, post_id: &str) -> Result<Vec<ReplyRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT post_id, reply_id, is_comment, replied_at
            FROM replies WHERE post_id = ?1 ORDER BY replied_at
            "#,
        )?;
        let rows = stmt
            .query_map(params![post_id], |row| {
                Ok(ReplyRecord {
                    post_id: row.get(0)?,
                    reply_id: row.get(1)?,
                    is_comment: row.get::<_, i64>(2)? != 0,
                    replied_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Reply volume per post (quotes + comments combined)
    pub fn reply_counts(&self) -> Result<HashMap<String, i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT post_id, COUNT(*) FROM replies GROUP BY post_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (post_id, count) = row?;
            counts.insert(post_id, count);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn dedup_by_reply_identity() {
        let dir = TempDir::new().unwrap();
        let store = ReplyStore::open(&dir.path().join("test.db")).unwrap();

        assert!(store.add_reply("p1", "r1", true).unwrap());
        assert!(!store.add_reply("p1", "r1", true).unwrap());
        assert!(store.add_reply("p1", "r2", false).unwrap());
        // same reply id under a different origin post is distinct
        assert!(store.add_reply("p2", "r1", true).unwrap());

        assert_eq!(store.replies_for_post("p1").unwrap().len(), 2);
        let counts = store.reply_counts().unwrap();
        assert_eq!(counts["p1"], 2);
        assert_eq!(counts["p2"], 1);
    }
}
