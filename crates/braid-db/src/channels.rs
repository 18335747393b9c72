use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{ChannelRow, ThreadRow};
use crate::{Database, now};

impl Database {
    /// Create a channel together with its default "main" thread owned by the
    /// creator, in one transaction. Returns `None` when the name is taken.
    pub fn create_channel(
        &self,
        name: &str,
        creator_id: i64,
    ) -> Result<Option<(ChannelRow, ThreadRow)>> {
        self.with_conn_mut(|conn| {
            let taken: Option<i64> = conn
                .query_row("SELECT id FROM channels WHERE name = ?1", [name], |row| {
                    row.get(0)
                })
                .optional()?;
            if taken.is_some() {
                return Ok(None);
            }

            let tx = conn.transaction()?;
            let ts = now();
            tx.execute(
                "INSERT INTO channels (name, created_at) VALUES (?1, ?2)",
                params![name, ts],
            )?;
            let channel_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO threads (channel_id, title, created_by, created_at)
                 VALUES (?1, 'main', ?2, ?3)",
                params![channel_id, creator_id, ts],
            )?;
            let thread_id = tx.last_insert_rowid();
            tx.commit()?;

            let channel = query_channel(conn, channel_id)?
                .ok_or_else(|| anyhow::anyhow!("channel {} missing after insert", channel_id))?;
            let thread = query_thread(conn, thread_id)?
                .ok_or_else(|| anyhow::anyhow!("thread {} missing after insert", thread_id))?;
            Ok(Some((channel, thread)))
        })
    }

    pub fn get_channel(&self, id: i64) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| query_channel(conn, id))
    }

    pub fn list_channels(&self) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, created_at FROM channels ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ChannelRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn create_thread(
        &self,
        channel_id: i64,
        title: &str,
        creator_id: i64,
    ) -> Result<ThreadRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO threads (channel_id, title, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![channel_id, title, creator_id, now()],
            )?;
            let id = conn.last_insert_rowid();
            query_thread(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("thread {} missing after insert", id))
        })
    }

    pub fn get_thread(&self, id: i64) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| query_thread(conn, id))
    }

    pub fn list_threads(&self, channel_id: i64) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, channel_id, title, created_by, created_at
                 FROM threads WHERE channel_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([channel_id], |row| {
                    Ok(ThreadRow {
                        id: row.get(0)?,
                        channel_id: row.get(1)?,
                        title: row.get(2)?,
                        created_by: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_channel(conn: &Connection, id: i64) -> Result<Option<ChannelRow>> {
    let row = conn
        .query_row(
            "SELECT id, name, created_at FROM channels WHERE id = ?1",
            [id],
            |row| {
                Ok(ChannelRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn query_thread(conn: &Connection, id: i64) -> Result<Option<ThreadRow>> {
    let row = conn
        .query_row(
            "SELECT id, channel_id, title, created_by, created_at FROM threads WHERE id = ?1",
            [id],
            |row| {
                Ok(ThreadRow {
                    id: row.get(0)?,
                    channel_id: row.get(1)?,
                    title: row.get(2)?,
                    created_by: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}
