//! LLM integration for news-digest.
//!
//! Supports:
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//!
//! Uses the rig-core crate for HTTP transport and `RigSummarizer` to bridge
//! rig's `CompletionModel` trait to our `Summarizer` trait.

mod rig_adapter;
pub mod summarizer;

pub use rig_adapter::RigSummarizer;
pub use summarizer::{SUMMARY_INSTRUCTION, Summarizer};

use std::str::FromStr;
use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{Lookup, env_or, env_parse};
use crate::error::{ConfigError, LlmError};

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

impl LlmBackend {
    pub fn name(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }

    fn api_key_var(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
        }
    }
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            other => Err(format!("unknown backend {other:?} (expected anthropic or openai)")),
        }
    }
}

/// Configuration for creating a summarizer.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    /// `None` when the backend's key variable is unset.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub max_tokens: u64,
}

impl LlmConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let backend = env_parse(lookup, "NEWS_DIGEST_LLM_BACKEND", LlmBackend::Anthropic)?;
        let api_key = lookup(backend.api_key_var())
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        Ok(Self {
            backend,
            api_key,
            model: env_or(lookup, "NEWS_DIGEST_MODEL", backend.default_model()),
            max_tokens: env_parse(lookup, "NEWS_DIGEST_MAX_TOKENS", 1024)?,
        })
    }

    /// Name of the variable that must hold the API key.
    pub fn api_key_var(&self) -> &'static str {
        self.backend.api_key_var()
    }
}

/// Create a summarizer from configuration.
pub fn create_summarizer(config: &LlmConfig) -> Result<Arc<dyn Summarizer>, LlmError> {
    let api_key = config.api_key.as_ref().ok_or_else(|| LlmError::AuthFailed {
        provider: config.backend.name().to_string(),
    })?;

    match config.backend {
        LlmBackend::Anthropic => create_anthropic_summarizer(config, api_key),
        LlmBackend::OpenAi => create_openai_summarizer(config, api_key),
    }
}

fn create_anthropic_summarizer(
    config: &LlmConfig,
    api_key: &SecretString,
) -> Result<Arc<dyn Summarizer>, LlmError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(RigSummarizer::new(
        model,
        "anthropic",
        &config.model,
        config.max_tokens,
    )))
}

fn create_openai_summarizer(
    config: &LlmConfig,
    api_key: &SecretString,
) -> Result<Arc<dyn Summarizer>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(RigSummarizer::new(
        model,
        "openai",
        &config.model,
        config.max_tokens,
    )))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<LlmConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LlmConfig::from_lookup(&|k| env.get(k).cloned())
    }

    #[test]
    fn test_create_anthropic_summarizer() {
        // rig-core clients accept any string as API key at construction time.
        // The actual auth failure happens when making a request.
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: Some(SecretString::from("test-key")),
            model: "claude-3-5-sonnet-latest".to_string(),
            max_tokens: 512,
        };
        let summarizer = create_summarizer(&config);
        assert!(summarizer.is_ok());
        assert_eq!(summarizer.unwrap().model_name(), "claude-3-5-sonnet-latest");
    }

    #[test]
    fn test_create_openai_summarizer() {
        let config = LlmConfig {
            backend: LlmBackend::OpenAi,
            api_key: Some(SecretString::from("sk-test")),
            model: "gpt-4o".to_string(),
            max_tokens: 512,
        };
        let summarizer = create_summarizer(&config);
        assert!(summarizer.is_ok());
        assert_eq!(summarizer.unwrap().model_name(), "gpt-4o");
    }

    #[test]
    fn test_create_summarizer_without_key_fails() {
        let config = config_from(&[]).unwrap();
        assert!(config.api_key.is_none());
        let err = create_summarizer(&config).err().unwrap();
        assert!(matches!(err, LlmError::AuthFailed { ref provider } if provider == "anthropic"));
    }

    #[test]
    fn config_defaults_to_anthropic() {
        let config = config_from(&[("ANTHROPIC_API_KEY", "sk-ant")]).unwrap();
        assert_eq!(config.backend, LlmBackend::Anthropic);
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert_eq!(config.max_tokens, 1024);
        assert!(config.api_key.is_some());
    }

    #[test]
    fn config_openai_reads_its_own_key() {
        let config = config_from(&[
            ("NEWS_DIGEST_LLM_BACKEND", "OpenAI"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("NEWS_DIGEST_MODEL", "gpt-4o-mini"),
        ])
        .unwrap();
        assert_eq!(config.backend, LlmBackend::OpenAi);
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.api_key.is_none());
        assert_eq!(config.api_key_var(), "OPENAI_API_KEY");
    }

    #[test]
    fn config_rejects_unknown_backend() {
        let err = config_from(&[("NEWS_DIGEST_LLM_BACKEND", "llama")]).unwrap_err();
        assert!(err.to_string().contains("NEWS_DIGEST_LLM_BACKEND"));
    }
}
