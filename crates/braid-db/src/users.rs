use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::UserRow;
use crate::{Database, now};

/// Synthetic system identity that authors automated task announcements.
pub const TASKBOT_NAME: &str = "TaskBot";
const TASKBOT_EMAIL: &str = "taskbot@braid.invalid";

/// Unusable credential marker — never parses as a password hash, so the bot
/// account cannot be logged into.
const LOCKED_PASSWORD: &str = "!";

impl Database {
    /// Insert a user unless the email is already registered.
    /// Returns `None` on a duplicate email. The existence check and insert
    /// run under one connection lock, so no duplicate can slip in between.
    pub fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let taken: Option<i64> = conn
                .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| {
                    row.get(0)
                })
                .optional()?;
            if taken.is_some() {
                return Ok(None);
            }

            conn.execute(
                "INSERT INTO users (name, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, email, password_hash, now()],
            )?;
            Ok(Some(conn.last_insert_rowid()))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &[&email]))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &[&id]))
    }

    /// Fetch the TaskBot user, creating it on first use.
    pub fn get_or_create_taskbot(&self) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (name, email, password, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![TASKBOT_NAME, TASKBOT_EMAIL, LOCKED_PASSWORD, now()],
            )?;
            query_user(conn, "email = ?1", &[&TASKBOT_EMAIL])?
                .ok_or_else(|| anyhow::anyhow!("TaskBot user missing after insert"))
        })
    }
}

fn query_user(
    conn: &Connection,
    predicate: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, name, email, password, created_at FROM users WHERE {}",
        predicate
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row(params, |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}
