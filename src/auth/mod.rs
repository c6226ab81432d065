//! Authorization collaborator: produces the session used by the mail fetcher.

pub mod credentials;
pub mod google;

pub use credentials::{AuthorizedUser, ClientSecrets};
pub use google::{CredentialSource, GoogleAuthConfig, GoogleAuthorizer};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::AuthError;

/// Gmail read-only scope requested during consent.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// A pre-authorized handle for one mailbox.
#[derive(Debug, Clone)]
pub struct Session {
    access_token: SecretString,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }
}

/// Supplies a usable session before each digest run.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn session(&self) -> Result<Session, AuthError>;
}
