//! Row-to-API conversions. Timestamps live as TEXT in the store and are
//! parsed here, falling back gently on corrupt data rather than failing the
//! whole response.

use chrono::{DateTime, Utc};
use tracing::warn;

use braid_db::models::{ChannelRow, MessageRow, ReplyRow, TaskRow, ThreadRow};
use braid_types::models::{Channel, Message, Reply, Task, TaskStatus, Thread};

pub(crate) fn parse_ts(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}': {}", raw, e);
        DateTime::default()
    })
}

pub fn channel(row: ChannelRow) -> Channel {
    Channel {
        id: row.id,
        name: row.name,
        created_at: parse_ts(&row.created_at),
    }
}

pub fn thread(row: ThreadRow) -> Thread {
    Thread {
        id: row.id,
        channel_id: row.channel_id,
        title: row.title,
        created_by: row.created_by,
        created_at: parse_ts(&row.created_at),
    }
}

pub fn message(row: MessageRow) -> Message {
    Message {
        id: row.id,
        thread_id: row.thread_id,
        channel_id: row.channel_id,
        channel_name: row.channel_name,
        thread_title: row.thread_title,
        author_id: row.author_id,
        author_name: row.author_name,
        content: row.content,
        reply_count: row.reply_count,
        created_at: parse_ts(&row.created_at),
    }
}

pub fn reply(row: ReplyRow) -> Reply {
    Reply {
        id: row.id,
        message_id: row.message_id,
        thread_id: row.thread_id,
        author_id: row.author_id,
        author_name: row.author_name,
        content: row.content,
        created_at: parse_ts(&row.created_at),
    }
}

pub fn task(row: TaskRow) -> Task {
    let status = TaskStatus::parse(&row.status).unwrap_or_else(|| {
        warn!("Corrupt status '{}' on task {}", row.status, row.id);
        TaskStatus::Open
    });
    Task {
        id: row.id,
        message_id: row.message_id,
        channel_id: row.channel_id,
        thread_id: row.thread_id,
        created_by: row.created_by,
        creator_name: row.creator_name,
        title: row.title,
        note: row.note,
        status,
        created_at: parse_ts(&row.created_at),
        updated_at: parse_ts(&row.updated_at),
    }
}
