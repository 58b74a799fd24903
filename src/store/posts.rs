//! Post Store
//!
//! Posts the bot has published, plus the per-account timeline watermark.
//! A Post row exists if and only if the publish call succeeded; rows are
//! immutable and never deleted by the core.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use super::open_connection;

/// One published post
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub post_id: String,
    /// Prompt the content was generated from
    pub prompt: String,
    pub content: String,
    pub is_reply: bool,
    pub posted_at: i64,
}

/// Store for published posts and the timeline watermark
pub struct PostStore {
    conn: Mutex<Connection>,
}

impl PostStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                post_id TEXT PRIMARY KEY,
                prompt TEXT NOT NULL,
                content TEXT NOT NULL,
                is_reply INTEGER NOT NULL DEFAULT 0,
                posted_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS timeline_watermark (
                account_id TEXT PRIMARY KEY,
                item_id INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
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

    /// Record a confirmed publish. Call only after the platform returned an id.
    pub fn add_post(
        &self,
        post_id: &str,
        prompt: &str,
        content: &str,
        is_reply: bool,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO posts (post_id, prompt, content, is_reply, posted_at)
            VALUES (?1, ?2, ?3, ?4, unixepoch())
            "#,
            params![post_id, prompt, content, is_reply as i64],
        )?;
        debug!("stored post {}", post_id);
        Ok(())
    }

    pub fn get_post(&self, post_id: &str) -> Result<Option<PostRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT post_id, prompt, content, is_reply, posted_at FROM posts WHERE post_id = ?1",
                params![post_id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn all_posts(&self) -> Result<Vec<PostRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT post_id, prompt, content, is_reply, posted_at FROM posts ORDER BY posted_at",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_posts(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Current watermark for an account, if one has been persisted
    pub fn watermark(&self, account_id: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT item_id FROM timeline_watermark WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Advance the watermark to `item_id` if it is higher than the stored
    /// value. The conditional update makes this an atomic compare-and-set
    /// keyed by account id; a lower candidate leaves the row untouched.
    /// Returns the effective watermark after the call.
    pub fn advance_watermark(&self, account_id: &str, item_id: i64) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO timeline_watermark (account_id, item_id, updated_at)
            VALUES (?1, ?2, unixepoch())
            ON CONFLICT(account_id) DO UPDATE SET
                item_id = excluded.item_id,
                updated_at = excluded.updated_at
            WHERE excluded.item_id > timeline_watermark.item_id
            "#,
            params![account_id, item_id],
        )?;

        let effective = conn.query_row(
            "SELECT item_id FROM timeline_watermark WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(effective)
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRecord> {
        Ok(PostRecord {
            post_id: row.get(0)?,
            prompt: row.get(1)?,
            content: row.get(2)?,
            is_reply: row.get::<_, i64>(3)? != 0,
            posted_at: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, PostStore) {
        let dir = TempDir::new().unwrap();
        let store = PostStore::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn add_and_get_post() {
        let (_dir, store) = store();
        store
            .add_post("p1", "Reply to tweet: hello", "hi there", true)
            .unwrap();

        let post = store.get_post("p1").unwrap().unwrap();
        assert_eq!(post.content, "hi there");
        assert!(post.is_reply);
        assert!(post.posted_at > 0);
        assert!(store.get_post("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_post_id_is_rejected() {
        let (_dir, store) = store();
        store.add_post("p1", "a", "b", false).unwrap();
        assert!(store.add_post("p1", "a", "b", false).is_err());
    }

    #[test]
    fn watermark_starts_empty_and_advances() {
        let (_dir, store) = store();
        assert_eq!(store.watermark("acct").unwrap(), None);

        assert_eq!(store.advance_watermark("acct", 100).unwrap(), 100);
        assert_eq!(store.watermark("acct").unwrap(), Some(100));
    }

    #[test]
    fn watermark_never_moves_backwards() {
        let (_dir, store) = store();
        store.advance_watermark("acct", 200).unwrap();

        // lower candidate is a no-op
        assert_eq!(store.advance_watermark("acct", 150).unwrap(), 200);
        assert_eq!(store.watermark("acct").unwrap(), Some(200));

        assert_eq!(store.advance_watermark("acct", 300).unwrap(), 300);
    }

    #[test]
    fn watermark_is_per_account() {
        let (_dir, store) = store();
        store.advance_watermark("a", 10).unwrap();
        store.advance_watermark("b", 20).unwrap();
        assert_eq!(store.watermark("a").unwrap(), Some(10));
        assert_eq!(store.watermark("b").unwrap(), Some(20));
    }
}
