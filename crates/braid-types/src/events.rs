use serde::{Deserialize, Serialize};

use crate::models::{Channel, Message, Reply, Task, Thread};

/// Events pushed to every connected client over the gateway.
/// Clients filter on their side; the server fans out everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Connect acknowledgment, sent once per connection before any domain event.
    Ready { user_id: i64, name: String },

    ChannelCreated { channel: Channel },

    ThreadCreated { thread: Thread },

    MessageCreated { message: Message },
    MessageUpdated { message: Message },
    MessageDeleted {
        message_id: i64,
        thread_id: i64,
        channel_id: i64,
    },

    ReplyCreated {
        reply: Reply,
        /// Parent message's reply count after this insert.
        message_reply_count: i64,
    },
    ReplyUpdated { reply: Reply },
    ReplyDeleted {
        reply_id: i64,
        message_id: i64,
        thread_id: i64,
    },

    TaskCreated { task: Task },
    TaskUpdated { task: Task },
    TaskDeleted {
        task_id: i64,
        message_id: i64,
        channel_id: i64,
        thread_id: i64,
    },
}

impl ServerEvent {
    /// Returns the thread this event is scoped to, if any. Used by clients
    /// for unread/activity bookkeeping on threads they are not viewing.
    pub fn thread_id(&self) -> Option<i64> {
        match self {
            Self::ThreadCreated { thread } => Some(thread.id),
            Self::MessageCreated { message } | Self::MessageUpdated { message } => {
                Some(message.thread_id)
            }
            Self::MessageDeleted { thread_id, .. } => Some(*thread_id),
            Self::ReplyCreated { reply, .. } | Self::ReplyUpdated { reply } => {
                Some(reply.thread_id)
            }
            Self::ReplyDeleted { thread_id, .. } => Some(*thread_id),
            Self::TaskCreated { task } | Self::TaskUpdated { task } => Some(task.thread_id),
            Self::TaskDeleted { thread_id, .. } => Some(*thread_id),
            Self::Ready { .. } | Self::ChannelCreated { .. } => None,
        }
    }

    pub fn is_task_event(&self) -> bool {
        matches!(
            self,
            Self::TaskCreated { .. } | Self::TaskUpdated { .. } | Self::TaskDeleted { .. }
        )
    }
}
