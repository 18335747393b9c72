use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token       TEXT PRIMARY KEY,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            expires_at  TEXT NOT NULL,
            revoked_at  TEXT
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS threads (
            id          INTEGER PRIMARY KEY,
            channel_id  INTEGER NOT NULL REFERENCES channels(id),
            title       TEXT NOT NULL,
            created_by  INTEGER NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_threads_channel
            ON threads(channel_id);

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY,
            thread_id   INTEGER NOT NULL REFERENCES threads(id),
            author_id   INTEGER NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_thread
            ON messages(thread_id, id);

        CREATE TABLE IF NOT EXISTS replies (
            id          INTEGER PRIMARY KEY,
            message_id  INTEGER NOT NULL REFERENCES messages(id),
            author_id   INTEGER NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_replies_message
            ON replies(message_id);

        CREATE TABLE IF NOT EXISTS thread_reads (
            user_id          INTEGER NOT NULL REFERENCES users(id),
            thread_id        INTEGER NOT NULL REFERENCES threads(id),
            last_message_id  INTEGER NOT NULL,
            UNIQUE(user_id, thread_id)
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id          INTEGER PRIMARY KEY,
            message_id  INTEGER NOT NULL UNIQUE REFERENCES messages(id),
            channel_id  INTEGER NOT NULL REFERENCES channels(id),
            thread_id   INTEGER NOT NULL REFERENCES threads(id),
            created_by  INTEGER NOT NULL REFERENCES users(id),
            title       TEXT NOT NULL,
            note        TEXT NOT NULL,
            status      TEXT NOT NULL CHECK(status IN ('open', 'doing', 'done')),
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_status
            ON tasks(status, updated_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
