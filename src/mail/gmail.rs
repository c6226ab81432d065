//! Gmail REST fetcher: newest message in one label, full Part tree.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{MailFetcher, Message};
use crate::auth::Session;
use crate::config::{Lookup, env_or};
use crate::error::MailError;

const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail client configuration.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub api_base: String,
    /// Label whose newest message is fetched.
    pub label: String,
}

impl GmailConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            api_base: env_or(lookup, "GMAIL_API_BASE", DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            label: env_or(lookup, "GMAIL_LABEL", "INBOX"),
        }
    }
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            label: "INBOX".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Gmail API client for the authenticated user (`me`).
pub struct GmailClient {
    config: GmailConfig,
    client: reqwest::Client,
}

impl GmailClient {
    pub fn new(config: GmailConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/users/me/{path}", self.config.api_base)
    }

    /// Id of the newest message in the configured label.
    pub async fn latest_message_id(&self, session: &Session) -> Result<String, MailError> {
        let list: MessageList = self
            .get_json(
                session,
                &self.api_url("messages"),
                &[("maxResults", "1"), ("labelIds", self.config.label.as_str())],
            )
            .await?;

        list.messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or(MailError::EmptyMailbox)
    }

    /// Full message structure by id.
    pub async fn message(&self, session: &Session, id: &str) -> Result<Message, MailError> {
        let path = format!("messages/{}", urlencoding::encode(id));
        self.get_json(session, &self.api_url(&path), &[("format", "full")])
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MailError> {
        tracing::debug!(url = url, "Gmail request");

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, session.bearer())
            .query(query)
            .send()
            .await
            .map_err(|e| MailError::Request {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json().await.map_err(|e| MailError::InvalidResponse {
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MailFetcher for GmailClient {
    async fn latest_message(&self, session: &Session) -> Result<Message, MailError> {
        let id = self.latest_message_id(session).await?;
        tracing::info!(message_id = %id, "Fetching latest message");
        self.message(session, &id).await
    }
}
