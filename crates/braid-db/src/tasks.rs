use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::messages::TaskDraft;
use crate::models::{MessageRow, TaskRow};
use crate::{Database, now};

const TASK_SELECT: &str = "
    SELECT t.id, t.message_id, t.channel_id, t.thread_id, t.created_by, u.name,
           t.title, t.note, t.status, t.created_at, t.updated_at
    FROM tasks t
    JOIN users u ON u.id = t.created_by";

/// Listing filters. `status` must already be a valid status string.
#[derive(Debug, Default)]
pub struct TaskFilter<'a> {
    pub status: Option<&'a str>,
    pub channel_id: Option<i64>,
    pub thread_id: Option<i64>,
}

impl Database {
    /// Insert a task for a message, or return the task that already exists
    /// for it. A message has at most one task ever; the UNIQUE constraint on
    /// message_id plus the re-read make double triggers harmless.
    pub fn insert_task(
        &self,
        message_id: i64,
        channel_id: i64,
        thread_id: i64,
        created_by: i64,
        title: &str,
        note: &str,
    ) -> Result<TaskRow> {
        self.with_conn(|conn| {
            let draft = TaskDraft {
                title: title.to_string(),
                note: note.to_string(),
            };
            insert_task_tx(conn, message_id, channel_id, thread_id, created_by, &draft)?;
            query_task_by_message(conn, message_id)?
                .ok_or_else(|| anyhow::anyhow!("task for message {} missing after insert", message_id))
        })
    }

    /// Dashboard task creation: a synthetic origin message carrying the
    /// title (+ note), the task linked to it, and a TaskBot announcement
    /// message, all in one transaction. Keeps dashboard tasks consistent
    /// with organically-extracted ones — every task has exactly one
    /// originating message.
    pub fn create_task_from_dashboard(
        &self,
        thread_id: i64,
        created_by: i64,
        origin_content: &str,
        draft: &TaskDraft,
        bot_author_id: i64,
        bot_content: &str,
    ) -> Result<(MessageRow, TaskRow, MessageRow)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let channel_id: i64 = tx.query_row(
                "SELECT channel_id FROM threads WHERE id = ?1",
                [thread_id],
                |row| row.get(0),
            )?;

            let ts = now();
            tx.execute(
                "INSERT INTO messages (thread_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![thread_id, created_by, origin_content, ts],
            )?;
            let origin_id = tx.last_insert_rowid();
            insert_task_tx(&tx, origin_id, channel_id, thread_id, created_by, draft)?;
            tx.execute(
                "INSERT INTO messages (thread_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![thread_id, bot_author_id, bot_content, ts],
            )?;
            let bot_id = tx.last_insert_rowid();
            tx.commit()?;

            let origin = crate::messages::query_message(conn, origin_id)?
                .ok_or_else(|| anyhow::anyhow!("message {} missing after insert", origin_id))?;
            let task = query_task_by_message(conn, origin_id)?
                .ok_or_else(|| anyhow::anyhow!("task for message {} missing after insert", origin_id))?;
            let bot = crate::messages::query_message(conn, bot_id)?
                .ok_or_else(|| anyhow::anyhow!("message {} missing after insert", bot_id))?;
            Ok((origin, task, bot))
        })
    }

    pub fn get_task(&self, id: i64) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE t.id = ?1", TASK_SELECT);
            let row = conn.query_row(&sql, [id], task_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn get_task_by_message(&self, message_id: i64) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| query_task_by_message(conn, message_id))
    }

    /// List tasks newest-first, capped at 200.
    ///
    /// The retention cutoff bounds done-task visibility, not their lifetime:
    /// with no status filter, open/doing tasks always show and done tasks
    /// only while `updated_at` is inside the window; an explicit done filter
    /// applies the same window; explicit open/doing filters ignore it.
    pub fn list_tasks(&self, filter: &TaskFilter<'_>, retention_cutoff: &str) -> Result<Vec<TaskRow>> {
        self.with_conn(|conn| {
            let mut conditions: Vec<String> = Vec::new();
            let mut values: Vec<&dyn rusqlite::ToSql> = Vec::new();

            match filter.status {
                None => {
                    conditions.push("(t.status != 'done' OR t.updated_at >= ?)".into());
                    values.push(&retention_cutoff);
                }
                Some("done") => {
                    conditions.push("t.status = 'done'".into());
                    conditions.push("t.updated_at >= ?".into());
                    values.push(&retention_cutoff);
                }
                Some(ref status) => {
                    conditions.push("t.status = ?".into());
                    values.push(status);
                }
            }
            if let Some(ref channel_id) = filter.channel_id {
                conditions.push("t.channel_id = ?".into());
                values.push(channel_id);
            }
            if let Some(ref thread_id) = filter.thread_id {
                conditions.push("t.thread_id = ?".into());
                values.push(thread_id);
            }

            let sql = format!(
                "{} WHERE {} ORDER BY t.id DESC LIMIT 200",
                TASK_SELECT,
                conditions.join(" AND ")
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(values.as_slice(), task_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Update any of title/note/status. Always bumps `updated_at` — the
    /// retention clock restarts on every transition.
    pub fn update_task(
        &self,
        id: i64,
        title: Option<&str>,
        note: Option<&str>,
        status: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let mut sets: Vec<&str> = vec!["updated_at = ?"];
            let ts = now();
            let mut values: Vec<&dyn rusqlite::ToSql> = vec![&ts];

            if let Some(ref title) = title {
                sets.push("title = ?");
                values.push(title);
            }
            if let Some(ref note) = note {
                sets.push("note = ?");
                values.push(note);
            }
            if let Some(ref status) = status {
                sets.push("status = ?");
                values.push(status);
            }
            values.push(&id);

            let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
            conn.execute(&sql, values.as_slice())?;
            Ok(())
        })
    }

    /// Remove the task record only; the originating message stays.
    pub fn delete_task(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        channel_id: row.get(2)?,
        thread_id: row.get(3)?,
        created_by: row.get(4)?,
        creator_name: row.get(5)?,
        title: row.get(6)?,
        note: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert-or-ignore on the originating message. Returns whether a row was
/// actually inserted; false means the message already had its task.
pub(crate) fn insert_task_tx(
    conn: &Connection,
    message_id: i64,
    channel_id: i64,
    thread_id: i64,
    created_by: i64,
    draft: &TaskDraft,
) -> Result<bool> {
    let ts = now();
    let n = conn.execute(
        "INSERT OR IGNORE INTO tasks
             (message_id, channel_id, thread_id, created_by, title, note, status,
              created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', ?7, ?7)",
        params![message_id, channel_id, thread_id, created_by, &draft.title, &draft.note, ts],
    )?;
    Ok(n > 0)
}

pub(crate) fn query_task_by_message(conn: &Connection, message_id: i64) -> Result<Option<TaskRow>> {
    let sql = format!("{} WHERE t.message_id = ?1", TASK_SELECT);
    let row = conn.query_row(&sql, [message_id], task_from_row).optional()?;
    Ok(row)
}
