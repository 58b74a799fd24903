//! Community Store
//!
//! Accounts the bot follows. Upserted once at bootstrap; members may be
//! refreshed later but the loop itself never requires it.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::open_connection;

/// One followed account
#[derive(Debug, Clone)]
pub struct CommunityMember {
    pub user_id: String,
    pub handle: String,
    pub followers: i64,
    pub following: i64,
    pub bio: String,
    pub location: String,
    pub summary: String,
}

pub struct CommunityStore {
    conn: Mutex<Connection>,
}

impl CommunityStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS community_members (
                user_id TEXT PRIMARY KEY,
                handle TEXT NOT NULL,
                followers INTEGER NOT NULL,
                following INTEGER NOT NULL,
                bio TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                summary TEXT NOT NULL DEFAULT ''
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

    pub fn upsert_member(&self, member: &CommunityMember) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO community_members
                (user_id, handle, followers, following, bio, location, summary)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                handle = excluded.handle,
                followers = excluded.followers,
                following = excluded.following,
                bio = excluded.bio,
                location = excluded.location,
                summary = excluded.summary
            "#,
            params![
                member.user_id,
                member.handle,
                member.followers,
                member.following,
                member.bio,
                member.location,
                member.summary
            ],
        )?;
        Ok(())
    }

    pub fn get_member(&self, user_id: &str) -> Result<Option<CommunityMember>> {
        let conn = self.lock()?;
        let member = conn
            .query_row(
                r#"
                SELECT user_id, handle, followers, following, bio, location, summary
                FROM community_members WHERE user_id = ?1
                "#,
                params![user_id],
                Self::row_to_member,
            )
            .optional()?;
        Ok(member)
    }

    pub fn all_members(&self) -> Result<Vec<CommunityMember>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, handle, followers, following, bio, location, summary
            FROM community_members ORDER BY handle
            "#,
        )?;
        let rows = stmt
            .query_map([], Self::row_to_member)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommunityMember> {
        Ok(CommunityMember {
            user_id: row.get(0)?,
            handle: row.get(1)?,
            followers: row.get(2)?,
            following: row.get(3)?,
            bio: row.get(4)?,
            location: row.get(5)?,
            summary: row.get(6)?,
        })
    }
}
