//! Error types for news-digest.

use std::path::PathBuf;

/// Top-level error type for a digest run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Authorization collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Cannot read credentials at {path}: {reason}")]
    CredentialsUnreadable { path: PathBuf, reason: String },

    #[error("Not authorized: no cached token at {path}. Run `news-digest authorize` first")]
    NotAuthorized { path: PathBuf },

    #[error("Token endpoint did not return a refresh token; revoke access and authorize again")]
    MissingRefreshToken,

    #[error("No consent code entered")]
    MissingConsentCode,

    #[error("Token request failed: {reason}")]
    TokenRequest { reason: String },

    #[error("Token endpoint rejected the request ({status}): {body}")]
    TokenRejected { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mail service errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Gmail request failed: {reason}")]
    Request { reason: String },

    #[error("Gmail returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from Gmail: {reason}")]
    InvalidResponse { reason: String },

    #[error("Mailbox is empty")]
    EmptyMailbox,

    #[error("Cannot decode {mime_type} body: {reason}")]
    BodyDecode { mime_type: String, reason: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel health check failed: {name}")]
    HealthCheckFailed { name: String },
}

/// Result type alias for digest operations.
pub type Result<T> = std::result::Result<T, Error>;
