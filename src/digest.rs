//! Digest orchestration: newest email in, summary out.

use std::sync::Arc;

use tracing::info;

use crate::auth::Authorizer;
use crate::config::DigestConfig;
use crate::error::Result;
use crate::llm::Summarizer;
use crate::mail::{MailFetcher, extract_body, normalize};

/// Fetches, cleans and summarizes the latest newsletter.
///
/// Holds no state between runs; every call starts from a fresh session.
pub struct Digest {
    auth: Arc<dyn Authorizer>,
    mail: Arc<dyn MailFetcher>,
    summarizer: Arc<dyn Summarizer>,
    config: DigestConfig,
}

impl Digest {
    pub fn new(
        auth: Arc<dyn Authorizer>,
        mail: Arc<dyn MailFetcher>,
        summarizer: Arc<dyn Summarizer>,
        config: DigestConfig,
    ) -> Self {
        Self {
            auth,
            mail,
            summarizer,
            config,
        }
    }

    /// Normalized text of the newest message, or `None` if it has no body.
    pub async fn latest_text(&self) -> Result<Option<String>> {
        latest_text(self.auth.as_ref(), self.mail.as_ref(), &self.config).await
    }

    /// Summary of the newest message, or `None` if it has no body.
    pub async fn run(&self) -> Result<Option<String>> {
        let Some(text) = self.latest_text().await? else {
            return Ok(None);
        };

        info!(
            model = self.summarizer.model_name(),
            chars = text.chars().count(),
            "Summarizing newsletter"
        );
        let summary = self.summarizer.summarize(&text).await?;
        Ok(Some(summary))
    }
}

/// Authorize, fetch, extract and normalize, without summarizing.
pub async fn latest_text(
    auth: &dyn Authorizer,
    mail: &dyn MailFetcher,
    config: &DigestConfig,
) -> Result<Option<String>> {
    let session = auth.session().await?;
    let message = mail.latest_message(&session).await?;

    let text = extract_body(&message.payload)?
        .and_then(|body| normalize(&body, config.wrap_width));

    let Some(text) = text else {
        info!(
            message_id = %message.id,
            snippet = message.snippet.as_deref().unwrap_or(""),
            "No message body found"
        );
        return Ok(None);
    };

    if config.log_preview {
        let preview: String = text.chars().take(config.preview_chars).collect();
        info!(message_id = %message.id, "Email body:\n{preview}");
    }

    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;
    use crate::auth::Session;
    use crate::error::{AuthError, Error, LlmError, MailError};
    use crate::mail::{Message, Part};

    struct FakeAuth {
        fail: bool,
    }

    #[async_trait]
    impl Authorizer for FakeAuth {
        async fn session(&self) -> std::result::Result<Session, AuthError> {
            if self.fail {
                Err(AuthError::MissingRefreshToken)
            } else {
                Ok(Session::new("fake"))
            }
        }
    }

    struct FakeMail {
        payload: Part,
    }

    #[async_trait]
    impl MailFetcher for FakeMail {
        async fn latest_message(
            &self,
            session: &Session,
        ) -> std::result::Result<Message, MailError> {
            assert_eq!(session.bearer(), "Bearer fake");
            Ok(Message {
                id: "m1".into(),
                snippet: None,
                payload: self.payload.clone(),
            })
        }
    }

    /// Echoes its input behind a prefix and counts calls.
    #[derive(Default)]
    struct EchoSummarizer {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn summarize(&self, text: &str) -> std::result::Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LlmError::RequestFailed {
                    provider: "echo".into(),
                    reason: "boom".into(),
                });
            }
            Ok(format!("SUMMARY:{text}"))
        }
    }

    fn enc(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text)
    }

    fn html_wins_tree() -> Part {
        Part::container(
            "multipart/mixed",
            vec![
                Part::container("multipart/related", vec![Part::leaf("image/gif", "")]),
                Part::leaf("text/html", enc("<p>Hi</p>")),
                Part::leaf("text/plain", enc("Hi")),
            ],
        )
    }

    fn digest(payload: Part, summarizer: Arc<EchoSummarizer>, auth_fails: bool) -> Digest {
        Digest::new(
            Arc::new(FakeAuth { fail: auth_fails }),
            Arc::new(FakeMail { payload }),
            summarizer,
            DigestConfig::default(),
        )
    }

    #[tokio::test]
    async fn summarizes_first_matching_part() {
        let summarizer = Arc::new(EchoSummarizer::default());
        let result = digest(html_wins_tree(), Arc::clone(&summarizer), false)
            .run()
            .await
            .unwrap();

        assert_eq!(result.as_deref(), Some("SUMMARY:Hi"));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_body_skips_summarizer() {
        let payload = Part::container(
            "multipart/alternative",
            vec![Part::leaf("text/plain", ""), Part::leaf("text/html", "")],
        );
        let summarizer = Arc::new(EchoSummarizer::default());
        let result = digest(payload, Arc::clone(&summarizer), false)
            .run()
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn whitespace_body_skips_summarizer() {
        let payload = Part::leaf("text/plain", enc("  \n\n "));
        let summarizer = Arc::new(EchoSummarizer::default());
        let result = digest(payload, Arc::clone(&summarizer), false)
            .run()
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn latest_text_returns_normalized_body() {
        let payload = Part::leaf("text/html", enc("<h2>Weekly</h2><p>Line one<br>Line two</p>"));
        let summarizer = Arc::new(EchoSummarizer::default());
        let text = digest(payload, Arc::clone(&summarizer), false)
            .latest_text()
            .await
            .unwrap()
            .unwrap();

        assert!(text.contains("Weekly"));
        assert!(text.lines().any(|l| l.trim() == "Line one"));
        assert!(text.lines().any(|l| l.trim() == "Line two"));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_failure_propagates() {
        let summarizer = Arc::new(EchoSummarizer::default());
        let err = digest(html_wins_tree(), Arc::clone(&summarizer), true)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::MissingRefreshToken)));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn summarizer_failure_propagates() {
        let summarizer = Arc::new(EchoSummarizer {
            fail: true,
            ..Default::default()
        });
        let err = digest(html_wins_tree(), Arc::clone(&summarizer), false)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Llm(LlmError::RequestFailed { .. })));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undecodable_body_is_mail_error() {
        let payload = Part::leaf("text/plain", "%%%");
        let err = digest(payload, Arc::new(EchoSummarizer::default()), false)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Mail(MailError::BodyDecode { .. })));
    }
}
