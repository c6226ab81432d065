//! Configuration types and environment helpers.

use std::str::FromStr;
use std::time::Duration;

use crate::auth::GoogleAuthConfig;
use crate::channels::discord::DiscordConfig;
use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::mail::{DEFAULT_WRAP_WIDTH, GmailConfig};

/// Environment lookup, swappable in tests.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Value of `key`, or `default` when unset or blank.
pub fn env_or(lookup: Lookup<'_>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse `key` as `T`, falling back to `default` when unset.
pub fn env_parse<T>(lookup: Lookup<'_>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

/// Boolean flag: `1`, `true`, `yes`, `on` (any case) are true.
pub fn env_flag(lookup: Lookup<'_>, key: &str) -> bool {
    lookup(key).is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Comma-separated list with blanks removed.
pub fn env_list(lookup: Lookup<'_>, key: &str) -> Vec<String> {
    lookup(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Digest run configuration.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// Wrap column for normalized text.
    pub wrap_width: usize,
    /// Log the first `preview_chars` of the normalized body.
    pub log_preview: bool,
    pub preview_chars: usize,
    /// Chat message that triggers a digest.
    pub trigger: String,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout: Duration,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            wrap_width: DEFAULT_WRAP_WIDTH,
            log_preview: false,
            preview_chars: 2000,
            trigger: "!news".to_string(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl DigestConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let wrap_width = env_parse(lookup, "NEWS_DIGEST_WRAP_WIDTH", defaults.wrap_width)?;
        if wrap_width == 0 {
            return Err(ConfigError::InvalidValue {
                key: "NEWS_DIGEST_WRAP_WIDTH".into(),
                message: "must be at least 1".into(),
            });
        }

        let timeout_secs = env_parse(
            lookup,
            "NEWS_DIGEST_HTTP_TIMEOUT_SECS",
            defaults.http_timeout.as_secs(),
        )?;

        // The trigger is matched exactly, so only an unset value falls back.
        let trigger = lookup("NEWS_DIGEST_TRIGGER")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.trigger);

        Ok(Self {
            wrap_width,
            log_preview: env_flag(lookup, "NEWS_DIGEST_LOG_PREVIEW"),
            preview_chars: defaults.preview_chars,
            trigger,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Everything the binary needs, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub digest: DigestConfig,
    pub google: GoogleAuthConfig,
    pub gmail: GmailConfig,
    pub llm: LlmConfig,
    /// `None` when `DISCORD_BOT_TOKEN` is unset.
    pub discord: Option<DiscordConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            digest: DigestConfig::from_lookup(lookup)?,
            google: GoogleAuthConfig::from_lookup(lookup),
            gmail: GmailConfig::from_lookup(lookup),
            llm: LlmConfig::from_lookup(lookup)?,
            discord: DiscordConfig::from_lookup(lookup)?,
        })
    }
}
