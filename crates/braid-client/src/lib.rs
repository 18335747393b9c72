//! Client-side sync engine: applies gateway events to local view state.
//!
//! The engine owns the lists a connected UI renders — channels, the focused
//! channel's threads, the focused thread's messages, the focused message's
//! replies, and the dashboard's task list — plus per-thread unread/activity
//! bookkeeping. Events patch the focused view in place; everything else only
//! touches the bookkeeping. State is reconciled against authoritative pull
//! snapshots via the `load_*`/`focus_*` methods.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use braid_types::events::ServerEvent;
use braid_types::models::{Channel, Message, Reply, Task, Thread};

/// Side effect the embedding UI must perform after applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    None,
    /// Task-list membership under the current filter scope can change in
    /// ways a single event can't encode; re-pull the whole list.
    RefetchTasks,
}

#[derive(Debug, Clone, Default)]
pub struct ThreadActivity {
    pub unread: u32,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Focus {
    pub channel_id: Option<i64>,
    pub thread_id: Option<i64>,
    pub message_id: Option<i64>,
}

#[derive(Default)]
pub struct SyncEngine {
    pub channels: Vec<Channel>,
    /// Threads of the focused channel.
    pub threads: Vec<Thread>,
    /// Messages of the focused thread.
    pub messages: Vec<Message>,
    /// Replies of the focused message.
    pub replies: Vec<Reply>,
    /// Tasks under the current dashboard filter scope.
    pub tasks: Vec<Task>,
    pub activity: HashMap<i64, ThreadActivity>,
    pub focus: Focus,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Snapshot loading (pull-based reconciliation) --

    pub fn load_channels(&mut self, channels: Vec<Channel>) {
        self.channels = channels;
    }

    pub fn focus_channel(&mut self, channel_id: i64, threads: Vec<Thread>) {
        self.focus.channel_id = Some(channel_id);
        self.threads = threads;
        self.focus.thread_id = None;
        self.messages.clear();
        self.focus.message_id = None;
        self.replies.clear();
    }

    /// Focus a thread with a freshly pulled message list. Focusing counts as
    /// reading: the unread counter clears, and the returned id — the newest
    /// loaded message — is what the caller persists as the read cursor.
    pub fn focus_thread(&mut self, thread_id: i64, messages: Vec<Message>) -> Option<i64> {
        self.focus.thread_id = Some(thread_id);
        self.messages = messages;
        self.focus.message_id = None;
        self.replies.clear();

        self.activity.entry(thread_id).or_default().unread = 0;
        self.messages.last().map(|m| m.id)
    }

    pub fn focus_message(&mut self, message_id: i64, replies: Vec<Reply>) {
        self.focus.message_id = Some(message_id);
        self.replies = replies;
    }

    pub fn load_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    // -- Event application --

    pub fn apply_event(&mut self, event: &ServerEvent) -> SyncAction {
        match event {
            ServerEvent::Ready { .. } => {}

            ServerEvent::ChannelCreated { channel } => {
                if !self.channels.iter().any(|c| c.id == channel.id) {
                    self.channels.push(channel.clone());
                }
            }

            ServerEvent::ThreadCreated { thread } => {
                if self.focus.channel_id == Some(thread.channel_id)
                    && !self.threads.iter().any(|t| t.id == thread.id)
                {
                    self.threads.push(thread.clone());
                }
            }

            ServerEvent::MessageCreated { message } => {
                if self.focus.thread_id == Some(message.thread_id) {
                    // May already be present from an optimistic or prior fetch.
                    if !self.messages.iter().any(|m| m.id == message.id) {
                        self.messages.push(message.clone());
                    }
                    self.touch(message.thread_id, message.created_at);
                } else {
                    self.bump_unread(message.thread_id, message.created_at);
                }
            }

            ServerEvent::MessageUpdated { message } => {
                if self.focus.thread_id == Some(message.thread_id) {
                    if let Some(slot) = self.messages.iter_mut().find(|m| m.id == message.id) {
                        *slot = message.clone();
                    }
                } else {
                    self.touch(message.thread_id, message.created_at);
                }
            }

            ServerEvent::MessageDeleted {
                message_id,
                thread_id,
                ..
            } => {
                if self.focus.thread_id == Some(*thread_id) {
                    self.messages.retain(|m| m.id != *message_id);
                }
                if self.focus.message_id == Some(*message_id) {
                    self.focus.message_id = None;
                    self.replies.clear();
                }
            }

            ServerEvent::ReplyCreated {
                reply,
                message_reply_count,
            } => {
                if self.focus.message_id == Some(reply.message_id)
                    && !self.replies.iter().any(|r| r.id == reply.id)
                {
                    self.replies.push(reply.clone());
                }
                if let Some(parent) = self.messages.iter_mut().find(|m| m.id == reply.message_id) {
                    parent.reply_count = *message_reply_count;
                }
                if self.focus.thread_id == Some(reply.thread_id) {
                    self.touch(reply.thread_id, reply.created_at);
                } else {
                    self.bump_unread(reply.thread_id, reply.created_at);
                }
            }

            ServerEvent::ReplyUpdated { reply } => {
                if self.focus.message_id == Some(reply.message_id) {
                    if let Some(slot) = self.replies.iter_mut().find(|r| r.id == reply.id) {
                        *slot = reply.clone();
                    }
                } else if self.focus.thread_id != Some(reply.thread_id) {
                    self.touch(reply.thread_id, reply.created_at);
                }
            }

            ServerEvent::ReplyDeleted {
                reply_id,
                message_id,
                ..
            } => {
                self.replies.retain(|r| r.id != *reply_id);
                if let Some(parent) = self.messages.iter_mut().find(|m| m.id == *message_id) {
                    parent.reply_count = (parent.reply_count - 1).max(0);
                }
            }

            ServerEvent::TaskCreated { .. }
            | ServerEvent::TaskUpdated { .. }
            | ServerEvent::TaskDeleted { .. } => {
                return SyncAction::RefetchTasks;
            }
        }

        SyncAction::None
    }

    pub fn unread(&self, thread_id: i64) -> u32 {
        self.activity.get(&thread_id).map_or(0, |a| a.unread)
    }

    fn bump_unread(&mut self, thread_id: i64, at: DateTime<Utc>) {
        let entry = self.activity.entry(thread_id).or_default();
        entry.unread += 1;
        entry.last_activity = Some(at);
    }

    fn touch(&mut self, thread_id: i64, at: DateTime<Utc>) {
        self.activity.entry(thread_id).or_default().last_activity = Some(at);
    }
}
