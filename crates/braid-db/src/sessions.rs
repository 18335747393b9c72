use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use crate::models::UserRow;
use crate::{Database, now};

impl Database {
    pub fn create_session(&self, token: &str, user_id: i64, expires_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token, user_id, now(), expires_at],
            )?;
            Ok(())
        })
    }

    /// Validate a session token and slide its expiry forward by the full TTL
    /// window. Returns the session's user, or `None` when the token is
    /// unknown, revoked, or expired. Check and slide run under one connection
    /// lock so concurrent requests cannot interleave them.
    pub fn validate_session(&self, token: &str, new_expires_at: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT u.id, u.name, u.email, u.password, u.created_at
                     FROM sessions s
                     JOIN users u ON u.id = s.user_id
                     WHERE s.token = ?1
                       AND s.revoked_at IS NULL
                       AND s.expires_at > ?2",
                    params![token, now()],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            email: row.get(2)?,
                            password: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;

            if user.is_some() {
                conn.execute(
                    "UPDATE sessions SET expires_at = ?1 WHERE token = ?2",
                    params![new_expires_at, token],
                )?;
            }

            Ok(user)
        })
    }

    /// Revoke a session. Returns false when the token does not exist.
    pub fn revoke_session(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE sessions SET revoked_at = ?1 WHERE token = ?2 AND revoked_at IS NULL",
                params![now(), token],
            )?;
            Ok(n > 0)
        })
    }

    pub fn session_expiry(&self, token: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let exp = conn
                .query_row(
                    "SELECT expires_at FROM sessions WHERE token = ?1",
                    [token],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(exp)
        })
    }
}
