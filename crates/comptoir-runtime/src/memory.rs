//! In-memory transport used by the test suites.
//!
//! Behaves like a tiny messaging platform: numbered messages per channel,
//! authorship, edits, deletions, and an injectable failure. Every call yields
//! once to the scheduler so concurrent callers interleave the way they would
//! against a real network.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use comptoir_core::error::{ComptoirError, Result};
use comptoir_core::models::{ChannelId, MessageId};
use comptoir_core::render::PanelContent;

use crate::transport::{PanelTransport, RemoteMessage};

/// A message stored by [`InMemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub author_id: String,
    pub title: Option<String>,
    pub content: Option<PanelContent>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    /// Messages per channel, oldest first.
    channels: BTreeMap<ChannelId, Vec<StoredMessage>>,
    failure: Option<String>,
    creates: usize,
    edits: usize,
}

/// Platform double that keeps every message in memory.
#[derive(Debug)]
pub struct InMemoryTransport {
    bot_user_id: String,
    state: Mutex<MemoryState>,
}

impl InMemoryTransport {
    /// A platform on which this process posts as `bot_user_id`.
    pub fn new(bot_user_id: impl Into<String>) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            state: Mutex::new(MemoryState {
                next_id: 1000,
                ..MemoryState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Messages currently in `channel`, oldest first.
    pub fn messages(&self, channel: &ChannelId) -> Vec<StoredMessage> {
        self.state().channels.get(channel).cloned().unwrap_or_default()
    }

    /// Look up a single message.
    pub fn message(&self, channel: &ChannelId, id: &MessageId) -> Option<StoredMessage> {
        self.messages(channel).into_iter().find(|m| &m.id == id)
    }

    /// Remove a message, as a moderator would.
    pub fn delete_message(&self, channel: &ChannelId, id: &MessageId) -> bool {
        let mut state = self.state();
        let Some(messages) = state.channels.get_mut(channel) else {
            return false;
        };
        let before = messages.len();
        messages.retain(|m| &m.id != id);
        messages.len() != before
    }

    /// Post a message authored by `author_id` with an embed titled `title`.
    /// Used to seed history before a restart or to add unrelated chatter.
    pub fn post(&self, channel: &ChannelId, author_id: &str, title: Option<&str>) -> MessageId {
        let mut state = self.state();
        Self::insert(
            &mut state,
            channel,
            author_id.to_string(),
            title.map(str::to_string),
            None,
        )
    }

    /// Make every subsequent call fail with a transient error (`None` heals).
    pub fn set_failure(&self, failure: Option<&str>) {
        self.state().failure = failure.map(str::to_string);
    }

    /// Number of successful `create_message` calls.
    pub fn create_count(&self) -> usize {
        self.state().creates
    }

    /// Number of successful `edit_message` calls.
    pub fn edit_count(&self) -> usize {
        self.state().edits
    }

    fn insert(
        state: &mut MemoryState,
        channel: &ChannelId,
        author_id: String,
        title: Option<String>,
        content: Option<PanelContent>,
    ) -> MessageId {
        state.next_id += 1;
        let id = MessageId(state.next_id.to_string());
        state
            .channels
            .entry(channel.clone())
            .or_default()
            .push(StoredMessage {
                id: id.clone(),
                author_id,
                title,
                content,
            });
        id
    }

    fn check_failure(state: &MemoryState) -> Result<()> {
        match &state.failure {
            Some(reason) => Err(ComptoirError::Transient(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PanelTransport for InMemoryTransport {
    async fn current_user_id(&self) -> Result<String> {
        tokio::task::yield_now().await;
        Self::check_failure(&self.state())?;
        Ok(self.bot_user_id.clone())
    }

    async fn create_message(
        &self,
        channel: &ChannelId,
        content: &PanelContent,
    ) -> Result<MessageId> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        Self::check_failure(&state)?;
        state.creates += 1;
        Ok(Self::insert(
            &mut state,
            channel,
            self.bot_user_id.clone(),
            Some(content.title.clone()),
            Some(content.clone()),
        ))
    }

    async fn edit_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        content: &PanelContent,
    ) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        Self::check_failure(&state)?;

        let stored = state
            .channels
            .get_mut(channel)
            .and_then(|messages| messages.iter_mut().find(|m| &m.id == message))
            .ok_or_else(|| ComptoirError::NotFound {
                channel_id: channel.to_string(),
                message_id: message.to_string(),
            })?;
        stored.title = Some(content.title.clone());
        stored.content = Some(content.clone());
        state.edits += 1;
        Ok(())
    }

    async fn recent_messages(&self, channel: &ChannelId, limit: u8) -> Result<Vec<RemoteMessage>> {
        tokio::task::yield_now().await;
        let state = self.state();
        Self::check_failure(&state)?;

        let messages = state.channels.get(channel).map(Vec::as_slice).unwrap_or(&[]);
        Ok(messages
            .iter()
            .rev()
            .take(usize::from(limit))
            .map(|m| RemoteMessage {
                id: m.id.clone(),
                author_id: m.author_id.clone(),
                title: m.title.clone(),
            })
            .collect())
    }
}
