//! Discord REST client implementing [`PanelTransport`].
//!
//! Panels are posted as a single embed. Only the handful of endpoints the
//! reconciler needs are wrapped:
//!
//! | operation          | endpoint                                   |
//! |--------------------|--------------------------------------------|
//! | current user       | `GET /users/@me`                           |
//! | create message     | `POST /channels/{channel}/messages`        |
//! | edit message       | `PATCH /channels/{channel}/messages/{id}`  |
//! | recent history     | `GET /channels/{channel}/messages?limit=N` |

use std::time::Duration;

use async_trait::async_trait;
use comptoir_core::error::{ComptoirError, Result};
use comptoir_core::models::{ChannelId, MessageId};
use comptoir_core::render::PanelContent;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::transport::{PanelTransport, RemoteMessage};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Discord rejects embed field values longer than this.
const FIELD_VALUE_LIMIT: usize = 1024;
/// Discord rejects embeds whose text adds up to more than this.
const EMBED_TOTAL_LIMIT: usize = 6000;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    embeds: [Embed<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    color: u32,
    fields: Vec<EmbedField<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<EmbedFooter<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedField<'a> {
    name: &'a str,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct EmbedFooter<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    id: String,
    author: ApiUser,
    #[serde(default)]
    embeds: Vec<ApiEmbed>,
}

#[derive(Debug, Deserialize)]
struct ApiEmbed {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl<'a> MessagePayload<'a> {
    fn warn_if_oversized(&self) {
        let total = self.embeds[0].char_count();
        if total > EMBED_TOTAL_LIMIT {
            tracing::warn!(
                title = self.embeds[0].title,
                total,
                limit = EMBED_TOTAL_LIMIT,
                "panel exceeds Discord's embed size; the request will be rejected"
            );
        }
    }

    fn from_content(content: &'a PanelContent) -> Self {
        let fields = content
            .fields
            .iter()
            .map(|f| EmbedField {
                name: &f.name,
                value: truncate_chars(&f.value, FIELD_VALUE_LIMIT),
                inline: f.inline,
            })
            .collect();

        Self {
            embeds: [Embed {
                title: &content.title,
                description: content.description.as_deref(),
                color: content.colour,
                fields,
                footer: content.footer.as_deref().map(|text| EmbedFooter { text }),
            }],
        }
    }
}

impl Embed<'_> {
    /// Characters Discord counts against [`EMBED_TOTAL_LIMIT`].
    fn char_count(&self) -> usize {
        let fields: usize = self
            .fields
            .iter()
            .map(|f| f.name.chars().count() + f.value.chars().count())
            .sum();
        self.title.chars().count()
            + self.description.map_or(0, |d| d.chars().count())
            + self.footer.as_ref().map_or(0, |f| f.text.chars().count())
            + fields
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => {
            let mut cut: String = s[..byte_idx].chars().take(max - 1).collect();
            cut.push('…');
            cut
        }
        None => s.to_string(),
    }
}

// ── DiscordClient ─────────────────────────────────────────────────────────────

/// Bot-authenticated client for the Discord REST API.
#[derive(Clone)]
pub struct DiscordClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DiscordClient {
    /// Create a client for `base_url` (e.g. `https://discord.com/api/v10`).
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .user_agent(concat!(
                "DiscordBot (https://github.com/comptoir, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()
            .map_err(|e| ComptoirError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorised(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        self.authorised(request)
            .send()
            .await
            .map_err(|e| ComptoirError::Transient(format!("{what} request failed: {e}")))
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| ComptoirError::Transient(format!("invalid {what} response: {e}")))
    }
}

/// Turn a non-success response into a transient error carrying Discord's
/// own message when there is one.
async fn failure(response: reqwest::Response, what: &str) -> ComptoirError {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    let detail = serde_json::from_slice::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());
    ComptoirError::Transient(format!("{what} failed: HTTP {status}: {detail}"))
}

#[async_trait]
impl PanelTransport for DiscordClient {
    async fn current_user_id(&self) -> Result<String> {
        let response = self
            .send(self.client.get(self.url("/users/@me")), "current user")
            .await?;
        if !response.status().is_success() {
            return Err(failure(response, "current user").await);
        }
        let user: ApiUser = Self::decode(response, "current user").await?;
        Ok(user.id)
    }

    async fn create_message(
        &self,
        channel: &ChannelId,
        content: &PanelContent,
    ) -> Result<MessageId> {
        let payload = MessagePayload::from_content(content);
        payload.warn_if_oversized();
        let request = self
            .client
            .post(self.url(&format!("/channels/{channel}/messages")))
            .json(&payload);
        let response = self.send(request, "create message").await?;
        if !response.status().is_success() {
            return Err(failure(response, "create message").await);
        }
        let message: ApiMessage = Self::decode(response, "create message").await?;
        Ok(MessageId(message.id))
    }

    async fn edit_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        content: &PanelContent,
    ) -> Result<()> {
        let payload = MessagePayload::from_content(content);
        payload.warn_if_oversized();
        let request = self
            .client
            .patch(self.url(&format!("/channels/{channel}/messages/{message}")))
            .json(&payload);
        let response = self.send(request, "edit message").await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ComptoirError::NotFound {
                channel_id: channel.to_string(),
                message_id: message.to_string(),
            }),
            _ => Err(failure(response, "edit message").await),
        }
    }

    async fn recent_messages(&self, channel: &ChannelId, limit: u8) -> Result<Vec<RemoteMessage>> {
        let request = self
            .client
            .get(self.url(&format!("/channels/{channel}/messages")))
            .query(&[("limit", limit.clamp(1, 100))]);
        let response = self.send(request, "channel history").await?;
        if !response.status().is_success() {
            return Err(failure(response, "channel history").await);
        }
        let messages: Vec<ApiMessage> = Self::decode(response, "channel history").await?;
        Ok(messages
            .into_iter()
            .map(|m| RemoteMessage {
                id: MessageId(m.id),
                author_id: m.author.id,
                title: m.embeds.into_iter().next().and_then(|e| e.title),
            })
            .collect())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
