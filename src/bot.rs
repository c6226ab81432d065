//! Command handler: answers the trigger phrase with a digest.

use std::sync::Arc;

use futures::StreamExt;

use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse, StatusUpdate};
use crate::digest::Digest;
use crate::error::ChannelError;

/// Posted when a digest run fails. Details go to the log only.
pub const ERROR_NOTICE: &str = "Sorry, I couldn't summarize the latest newsletter.";

/// The trigger must be the whole message, byte for byte.
pub fn is_trigger(content: &str, trigger: &str) -> bool {
    content == trigger
}

/// Listens on every configured channel and runs one digest per trigger.
pub struct NewsBot {
    digest: Arc<Digest>,
    channels: ChannelManager,
    trigger: String,
}

impl NewsBot {
    pub fn new(digest: Arc<Digest>, channels: ChannelManager, trigger: impl Into<String>) -> Self {
        Self {
            digest,
            channels,
            trigger: trigger.into(),
        }
    }

    /// Run until Ctrl+C or until every channel stream ends.
    pub async fn run(self) -> Result<(), ChannelError> {
        let mut messages = self.channels.start_all().await?;

        tracing::info!(
            trigger = %self.trigger,
            channels = ?self.channels.channel_names(),
            "News bot ready and listening"
        );

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = messages.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            if !is_trigger(&message.content, &self.trigger) {
                tracing::debug!(channel = %message.channel, "Ignoring non-trigger message");
                continue;
            }

            self.handle_trigger(&message).await;
        }

        self.channels.shutdown_all().await;
        Ok(())
    }

    async fn handle_trigger(&self, message: &IncomingMessage) {
        tracing::info!(
            channel = %message.channel,
            user = message.user_name.as_deref().unwrap_or(&message.user_id),
            origin = %message.metadata,
            "Digest requested"
        );

        if let Err(e) = self
            .channels
            .send_status(
                message,
                StatusUpdate::Thinking("Summarizing the latest newsletter...".into()),
            )
            .await
        {
            tracing::warn!("Failed to send status update: {}", e);
        }

        match self.digest.run().await {
            Ok(Some(summary)) => {
                if let Err(e) = self
                    .channels
                    .respond(message, OutgoingResponse::text(summary))
                    .await
                {
                    tracing::error!("Failed to post summary: {}", e);
                }
            }
            Ok(None) => {
                tracing::info!("Latest message has no body, nothing posted");
            }
            Err(e) => {
                tracing::error!("Digest failed: {}", e);
                if let Err(e) = self
                    .channels
                    .respond(message, OutgoingResponse::text(ERROR_NOTICE))
                    .await
                {
                    tracing::warn!("Failed to post error notice: {}", e);
                }
            }
        }
    }
}
