//! Mail side of the digest: message model, body extraction, normalization,
//! and the Gmail fetcher.

pub mod extract;
pub mod gmail;
pub mod normalize;

pub use extract::extract_body;
pub use gmail::{GmailClient, GmailConfig};
pub use normalize::{DEFAULT_WRAP_WIDTH, normalize};

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::Session;
use crate::error::MailError;

/// A full message as returned by `users.messages.get?format=full`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<String>,
    pub payload: Part,
}

/// A node in the MIME body tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Inline body of a part. `data` is base64url; attachments carry none.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

impl Part {
    /// Leaf part with inline data that is already base64url-encoded.
    pub fn leaf(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            body: Some(PartBody {
                data: Some(data.into()),
            }),
            ..Default::default()
        }
    }

    /// Container part holding `parts` in order.
    pub fn container(mime_type: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            mime_type: mime_type.into(),
            parts,
            ..Default::default()
        }
    }

    /// The inline data, if present and non-empty.
    pub fn inline_data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }

    pub fn has_children(&self) -> bool {
        !self.parts.is_empty()
    }
}

/// Retrieves the newest message for an authorized session.
#[async_trait]
pub trait MailFetcher: Send + Sync {
    async fn latest_message(&self, session: &Session) -> Result<Message, MailError>;
}
