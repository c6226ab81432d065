//! Discord channel: polls command channels over the REST API and posts
//! replies to one fixed destination channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::config::{Lookup, env_list, env_or, env_parse};
use crate::error::{ChannelError, ConfigError};

/// Maximum message length for Discord's create-message endpoint.
const DISCORD_MAX_MESSAGE_LENGTH: usize = 2000;

/// Messages fetched per poll and channel.
const POLL_PAGE_SIZE: &str = "50";

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

// ── Configuration ───────────────────────────────────────────────────

/// Discord channel configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    /// Where summaries are posted.
    pub destination_channel_id: String,
    /// Channels watched for the trigger phrase.
    pub command_channel_ids: Vec<String>,
    pub poll_interval: Duration,
    pub api_base: String,
}

impl DiscordConfig {
    /// Returns `Ok(None)` if `DISCORD_BOT_TOKEN` is not set (channel disabled).
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(bot_token) = lookup("DISCORD_BOT_TOKEN").filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };

        let destination_channel_id = lookup("DISCORD_CHANNEL_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "DISCORD_CHANNEL_ID".into(),
                hint: "Set it to the channel that should receive summaries.".into(),
            })?;

        let mut command_channel_ids = env_list(lookup, "DISCORD_COMMAND_CHANNEL_IDS");
        if command_channel_ids.is_empty() {
            command_channel_ids.push(destination_channel_id.clone());
        }

        let poll_secs: u64 = env_parse(lookup, "DISCORD_POLL_INTERVAL_SECS", 3)?;

        Ok(Some(Self {
            bot_token: SecretString::from(bot_token.trim().to_string()),
            destination_channel_id,
            command_channel_ids,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            api_base: env_or(lookup, "DISCORD_API_BASE", DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        }))
    }
}

// ── REST client ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct DiscordMessage {
    id: String,
    #[serde(default)]
    content: String,
    author: DiscordUser,
}

#[derive(Debug, Clone, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

/// Thin wrapper over the handful of endpoints the channel needs.
#[derive(Clone)]
struct DiscordApi {
    client: reqwest::Client,
    api_base: String,
    bot_token: SecretString,
}

impl DiscordApi {
    fn api_url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_base)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.api_url(path))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bot {}", self.bot_token.expose_secret()),
            )
            .header(
                reqwest::header::USER_AGENT,
                format!("DiscordBot (news-digest, {})", env!("CARGO_PKG_VERSION")),
            )
    }

    async fn channel_messages(
        &self,
        channel_id: &str,
        after: Option<&str>,
        limit: &str,
    ) -> Result<Vec<DiscordMessage>, ChannelError> {
        let mut query = vec![("limit", limit)];
        if let Some(after) = after {
            query.push(("after", after));
        }

        let resp = self
            .request(reqwest::Method::GET, &format!("channels/{channel_id}/messages"))
            .query(&query)
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "discord".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::StartupFailed {
                name: "discord".into(),
                reason: format!("GET messages in {channel_id} returned {status}: {body}"),
            });
        }

        resp.json().await.map_err(|e| ChannelError::StartupFailed {
            name: "discord".into(),
            reason: format!("malformed messages response: {e}"),
        })
    }

    async fn create_message(&self, channel_id: &str, content: &str) -> Result<(), ChannelError> {
        let resp = self
            .request(reqwest::Method::POST, &format!("channels/{channel_id}/messages"))
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "discord".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "discord".into(),
                reason: format!("create message returned {status}: {body}"),
            });
        }
        Ok(())
    }

    async fn trigger_typing(&self, channel_id: &str) {
        let _ = self
            .request(reqwest::Method::POST, &format!("channels/{channel_id}/typing"))
            .send()
            .await;
    }
}

// ── Channel ─────────────────────────────────────────────────────────

/// Discord channel: REST polling (inbound) + create-message (outbound).
pub struct DiscordChannel {
    config: DiscordConfig,
    api: DiscordApi,
    shutdown: Arc<AtomicBool>,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig, client: reqwest::Client) -> Self {
        let api = DiscordApi {
            client,
            api_base: config.api_base.clone(),
            bot_token: config.bot_token.clone(),
        };
        Self {
            config,
            api,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Post `text` to `channel_id`, split to fit Discord's limit.
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, DISCORD_MAX_MESSAGE_LENGTH) {
            if chunk.trim().is_empty() {
                continue;
            }
            self.api.create_message(channel_id, &chunk).await?;
        }
        tracing::info!("Discord message sent to {channel_id}");
        Ok(())
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        // Start each cursor at the newest existing message so history is not replayed.
        let mut cursors: Vec<(String, Option<String>)> = Vec::new();
        for channel_id in &self.config.command_channel_ids {
            let latest = self.api.channel_messages(channel_id, None, "1").await?;
            cursors.push((channel_id.clone(), latest.into_iter().next().map(|m| m.id)));
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let api = self.api.clone();
        let shutdown = Arc::clone(&self.shutdown);
        let poll_interval = self.config.poll_interval;

        tokio::spawn(async move {
            tracing::info!(
                "Discord channel polling {} channel(s) every {}s",
                cursors.len(),
                poll_interval.as_secs()
            );

            let mut tick = tokio::time::interval(poll_interval);

            loop {
                tick.tick().await;

                if shutdown.load(Ordering::Relaxed) {
                    tracing::info!("Discord poll loop shutting down");
                    return;
                }

                for (channel_id, cursor) in cursors.iter_mut() {
                    let after = cursor.as_deref().unwrap_or("0");
                    let batch = match api
                        .channel_messages(channel_id, Some(after), POLL_PAGE_SIZE)
                        .await
                    {
                        Ok(batch) => batch,
                        Err(e) => {
                            tracing::warn!("Discord poll error: {e}");
                            continue;
                        }
                    };

                    for message in oldest_first(batch) {
                        *cursor = Some(message.id.clone());

                        if message.author.bot {
                            continue;
                        }

                        let display_name = message
                            .author
                            .global_name
                            .clone()
                            .unwrap_or_else(|| message.author.username.clone());

                        let incoming =
                            IncomingMessage::new("discord", &message.author.id, message.content)
                                .with_metadata(serde_json::json!({
                                    "channel_id": channel_id,
                                    "message_id": message.id,
                                    "username": message.author.username,
                                }))
                                .with_user_name(display_name);

                        if tx.send(incoming).is_err() {
                            tracing::info!("Discord listener channel closed");
                            return;
                        }
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    /// Replies always go to the destination channel, wherever the command came from.
    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.send_message(&self.config.destination_channel_id, &response.content)
            .await
    }

    async fn send_status(
        &self,
        status: StatusUpdate,
        _metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        match status {
            // The summary lands in the destination, so that is where we type.
            StatusUpdate::Thinking(_) => {
                self.api
                    .trigger_typing(&self.config.destination_channel_id)
                    .await;
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .api
            .request(reqwest::Method::GET, "users/@me")
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "discord".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::HealthCheckFailed {
                name: "discord".into(),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Discord channel shutting down");
        self.shutdown.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Discord returns newest first; snowflakes sort chronologically.
fn oldest_first(mut messages: Vec<DiscordMessage>) -> Vec<DiscordMessage> {
    messages.sort_by_key(|m| m.id.parse::<u64>().unwrap_or(0));
    messages
}

/// Split a message into chunks of at most `max_chars` characters.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        let Some((limit, _)) = remaining.char_indices().nth(max_chars) else {
            chunks.push(remaining.to_string());
            break;
        };

        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
        if remaining.is_empty() {
            break;
        }
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
