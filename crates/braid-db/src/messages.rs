use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{MessageRow, ReplyRow, TaskRow};
use crate::tasks::insert_task_tx;
use crate::{Database, now};

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.thread_id, t.channel_id, c.name, t.title,
           m.author_id, u.name, m.content,
           (SELECT COUNT(*) FROM replies r WHERE r.message_id = m.id),
           m.created_at
    FROM messages m
    JOIN threads t ON t.id = m.thread_id
    JOIN channels c ON c.id = t.channel_id
    JOIN users u ON u.id = m.author_id";

const REPLY_SELECT: &str = "
    SELECT r.id, r.message_id, m.thread_id, r.author_id, u.name, r.content, r.created_at
    FROM replies r
    JOIN messages m ON m.id = r.message_id
    JOIN users u ON u.id = r.author_id";

/// Title and note for a task derived while posting content. The extraction
/// decision is fully resolved before any row is written.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub note: String,
}

impl Database {
    pub fn insert_message(&self, thread_id: i64, author_id: i64, content: &str) -> Result<MessageRow> {
        let (message, _) = self.insert_message_with_task(thread_id, author_id, content, None)?;
        Ok(message)
    }

    /// Insert a message and, when a draft is given, its derived task in one
    /// transaction. The task insert is insert-or-ignore on the originating
    /// message, so a double trigger returns the existing task.
    pub fn insert_message_with_task(
        &self,
        thread_id: i64,
        author_id: i64,
        content: &str,
        task: Option<&TaskDraft>,
    ) -> Result<(MessageRow, Option<TaskRow>)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (thread_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![thread_id, author_id, content, now()],
            )?;
            let message_id = tx.last_insert_rowid();

            if let Some(draft) = task {
                let channel_id: i64 = tx.query_row(
                    "SELECT channel_id FROM threads WHERE id = ?1",
                    [thread_id],
                    |row| row.get(0),
                )?;
                insert_task_tx(&tx, message_id, channel_id, thread_id, author_id, draft)?;
            }
            tx.commit()?;

            let message = query_message(conn, message_id)?
                .ok_or_else(|| anyhow::anyhow!("message {} missing after insert", message_id))?;
            let task = if task.is_some() {
                crate::tasks::query_task_by_message(conn, message_id)?
            } else {
                None
            };
            Ok((message, task))
        })
    }

    /// Insert a reply and, when a draft is given, a task linked to the
    /// PARENT message (a task always originates from a message). If the
    /// parent already has its task the insert is ignored and no task is
    /// returned.
    pub fn insert_reply_with_task(
        &self,
        message_id: i64,
        author_id: i64,
        content: &str,
        task: Option<&TaskDraft>,
    ) -> Result<(ReplyRow, i64, Option<TaskRow>)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO replies (message_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![message_id, author_id, content, now()],
            )?;
            let reply_id = tx.last_insert_rowid();

            let mut task_created = false;
            if let Some(draft) = task {
                let (thread_id, channel_id): (i64, i64) = tx.query_row(
                    "SELECT m.thread_id, t.channel_id
                     FROM messages m JOIN threads t ON t.id = m.thread_id
                     WHERE m.id = ?1",
                    [message_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                task_created =
                    insert_task_tx(&tx, message_id, channel_id, thread_id, author_id, draft)?;
            }
            tx.commit()?;

            let reply = query_reply(conn, reply_id)?
                .ok_or_else(|| anyhow::anyhow!("reply {} missing after insert", reply_id))?;
            let count = reply_count(conn, message_id)?;
            let task = if task_created {
                crate::tasks::query_task_by_message(conn, message_id)?
            } else {
                None
            };
            Ok((reply, count, task))
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    pub fn list_messages(&self, thread_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE m.thread_id = ?1 ORDER BY m.id", MESSAGE_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([thread_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_message_content(&self, id: i64, content: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET content = ?1 WHERE id = ?2",
                params![content, id],
            )?;
            Ok(())
        })
    }

    /// Delete a message together with its replies and linked task, in one
    /// transaction.
    pub fn delete_message(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM tasks WHERE message_id = ?1", [id])?;
            tx.execute("DELETE FROM replies WHERE message_id = ?1", [id])?;
            tx.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    // -- Replies --

    /// Insert a reply and return it with the parent's new reply count.
    pub fn insert_reply(
        &self,
        message_id: i64,
        author_id: i64,
        content: &str,
    ) -> Result<(ReplyRow, i64)> {
        let (reply, count, _) = self.insert_reply_with_task(message_id, author_id, content, None)?;
        Ok((reply, count))
    }

    pub fn get_reply(&self, id: i64) -> Result<Option<ReplyRow>> {
        self.with_conn(|conn| query_reply(conn, id))
    }

    pub fn list_replies(&self, message_id: i64) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE r.message_id = ?1 ORDER BY r.id", REPLY_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([message_id], reply_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_reply_content(&self, id: i64, content: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE replies SET content = ?1 WHERE id = ?2",
                params![content, id],
            )?;
            Ok(())
        })
    }

    pub fn delete_reply(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM replies WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Read cursors --

    /// Upsert the caller's read cursor for a thread. Purely advisory; only
    /// ever consulted for client-side unread computation.
    pub fn mark_thread_read(&self, user_id: i64, thread_id: i64, last_message_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO thread_reads (user_id, thread_id, last_message_id)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, thread_id) DO UPDATE SET last_message_id = ?3",
                params![user_id, thread_id, last_message_id],
            )?;
            Ok(())
        })
    }

    pub fn get_thread_read(&self, user_id: i64, thread_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let cursor = conn
                .query_row(
                    "SELECT last_message_id FROM thread_reads
                     WHERE user_id = ?1 AND thread_id = ?2",
                    params![user_id, thread_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(cursor)
        })
    }
}

pub(crate) fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        channel_id: row.get(2)?,
        channel_name: row.get(3)?,
        thread_title: row.get(4)?,
        author_id: row.get(5)?,
        author_name: row.get(6)?,
        content: row.get(7)?,
        reply_count: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn reply_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReplyRow> {
    Ok(ReplyRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        thread_id: row.get(2)?,
        author_id: row.get(3)?,
        author_name: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub(crate) fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!("{} WHERE m.id = ?1", MESSAGE_SELECT);
    let row = conn.query_row(&sql, [id], message_from_row).optional()?;
    Ok(row)
}

pub(crate) fn query_reply(conn: &Connection, id: i64) -> Result<Option<ReplyRow>> {
    let sql = format!("{} WHERE r.id = ?1", REPLY_SELECT);
    let row = conn.query_row(&sql, [id], reply_from_row).optional()?;
    Ok(row)
}

pub(crate) fn reply_count(conn: &Connection, message_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM replies WHERE message_id = ?1",
        [message_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let uid = db
            .create_user("Ada", "ada@example.com", "hash")
            .unwrap()
            .unwrap();
        let (_, thread) = db.create_channel("general", uid).unwrap().unwrap();
        (db, uid, thread.id)
    }

    #[test]
    fn message_view_is_denormalized() {
        let (db, uid, thread_id) = seeded();
        let msg = db.insert_message(thread_id, uid, "hello").unwrap();
        assert_eq!(msg.channel_name, "general");
        assert_eq!(msg.thread_title, "main");
        assert_eq!(msg.author_name, "Ada");
        assert_eq!(msg.reply_count, 0);
    }

    #[test]
    fn reply_insert_bumps_parent_count() {
        let (db, uid, thread_id) = seeded();
        let msg = db.insert_message(thread_id, uid, "hello").unwrap();

        let (reply, count) = db.insert_reply(msg.id, uid, "hi back").unwrap();
        assert_eq!(count, 1);
        assert_eq!(reply.thread_id, thread_id);

        let (_, count) = db.insert_reply(msg.id, uid, "again").unwrap();
        assert_eq!(count, 2);
        assert_eq!(db.get_message(msg.id).unwrap().unwrap().reply_count, 2);
    }

    #[test]
    fn deleting_a_message_cascades_to_replies_and_task() {
        let (db, uid, thread_id) = seeded();
        let msg = db.insert_message(thread_id, uid, "do the thing").unwrap();
        db.insert_reply(msg.id, uid, "on it").unwrap();
        let task = db
            .insert_task(msg.id, msg.channel_id, thread_id, uid, "do the thing", "")
            .unwrap();

        db.delete_message(msg.id).unwrap();

        assert!(db.get_message(msg.id).unwrap().is_none());
        assert!(db.list_replies(msg.id).unwrap().is_empty());
        assert!(db.get_task(task.id).unwrap().is_none());
    }

    #[test]
    fn deleting_a_reply_does_not_cascade() {
        let (db, uid, thread_id) = seeded();
        let msg = db.insert_message(thread_id, uid, "hello").unwrap();
        let (reply, _) = db.insert_reply(msg.id, uid, "hi").unwrap();

        db.delete_reply(reply.id).unwrap();
        assert!(db.get_reply(reply.id).unwrap().is_none());
        assert!(db.get_message(msg.id).unwrap().is_some());
    }

    #[test]
    fn read_cursor_upserts() {
        let (db, uid, thread_id) = seeded();
        db.mark_thread_read(uid, thread_id, 5).unwrap();
        db.mark_thread_read(uid, thread_id, 9).unwrap();
        assert_eq!(db.get_thread_read(uid, thread_id).unwrap(), Some(9));
        assert_eq!(db.get_thread_read(uid, thread_id + 1).unwrap(), None);
    }
}
