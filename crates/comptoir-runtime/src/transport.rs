//! Boundary to the messaging platform.
//!
//! The reconciler only needs four things from the platform: who am I, post a
//! message, edit a message (telling "gone" apart from other failures), and
//! read a channel's recent history. [`PanelTransport`] captures exactly that
//! so the engine can run against Discord ([`crate::discord::DiscordClient`])
//! or against [`crate::memory::InMemoryTransport`] in tests.

use async_trait::async_trait;
use comptoir_core::error::Result;
use comptoir_core::models::{ChannelId, MessageId};
use comptoir_core::render::PanelContent;

/// A message as seen in channel history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMessage {
    pub id: MessageId,
    pub author_id: String,
    /// Title of the first embed, if the message carries one.
    pub title: Option<String>,
}

/// Operations the reconciler performs on the platform.
///
/// Errors follow the crate taxonomy: a missing message is
/// [`ComptoirError::NotFound`](comptoir_core::ComptoirError::NotFound), every
/// other failure is [`ComptoirError::Transient`](comptoir_core::ComptoirError::Transient).
#[async_trait]
pub trait PanelTransport: Send + Sync {
    /// Id of the account this process posts as.
    async fn current_user_id(&self) -> Result<String>;

    /// Post `content` as a new message in `channel`.
    async fn create_message(&self, channel: &ChannelId, content: &PanelContent)
        -> Result<MessageId>;

    /// Replace the content of an existing message.
    async fn edit_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        content: &PanelContent,
    ) -> Result<()>;

    /// Up to `limit` most recent messages of `channel`, newest first.
    async fn recent_messages(&self, channel: &ChannelId, limit: u8) -> Result<Vec<RemoteMessage>>;
}
