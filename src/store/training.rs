//! Training Store
//!
//! Append-only log of checkpoint references produced by training runs.
//! Only the reference (path or identifier) is persisted; the checkpoint
//! bytes belong to the learner.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::open_connection;

pub struct TrainingStore {
    conn: Mutex<Connection>,
}

impl TrainingStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reference TEXT NOT NULL,
                examples_used INTEGER NOT NULL,
                created_at INTEGER NOT NULL
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

    pub fn record_checkpoint(&self, reference: &str, examples_used: usize) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO checkpoints (reference, examples_used, created_at)
            VALUES (?1, ?2, unixepoch())
            "#,
            params![reference, examples_used as i64],
        )?;
        Ok(())
    }

    pub fn latest_checkpoint(&self) -> Result<Option<String>> {
        let conn = self.lock()?;
        let reference = conn
            .query_row(
                "SELECT reference FROM checkpoints ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn latest_checkpoint_follows_insert_order() {
        let dir = TempDir::new().unwrap();
        let store = TrainingStore::open(&dir.path().join("test.db")).unwrap();

        assert_eq!(store.latest_checkpoint().unwrap(), None);
        store.record_checkpoint("ckpt/001", 32).unwrap();
        store.record_checkpoint("ckpt/002", 64).unwrap();
        assert_eq!(
            store.latest_checkpoint().unwrap().as_deref(),
            Some("ckpt/002")
        );
    }
}
