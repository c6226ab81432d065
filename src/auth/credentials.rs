//! Credential files: Google client secrets and the cached authorized user.

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::AuthError;

/// OAuth client secrets as downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: SecretString,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// `credentials.json` wraps the secrets under `installed` or `web`.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let file: ClientSecretsFile = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" client".to_string())
    }

    pub async fn load(path: &Path) -> Result<Self, AuthError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AuthError::CredentialsUnreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::from_json(&raw).map_err(|reason| AuthError::CredentialsUnreadable {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Redirect URI used for the consent flow.
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or("urn:ietf:wg:oauth:2.0:oob")
    }
}

/// Long-lived credential cached in `token.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
}

impl AuthorizedUser {
    pub fn from_json(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({
            "type": "authorized_user",
            "client_id": self.client_id,
            "client_secret": self.client_secret.expose_secret(),
            "refresh_token": self.refresh_token.expose_secret(),
        })
        .to_string()
    }

    /// Load the cached user. `Ok(None)` means the file does not exist.
    pub async fn load(path: &Path) -> Result<Option<Self>, AuthError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuthError::CredentialsUnreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        Self::from_json(&raw)
            .map(Some)
            .map_err(|reason| AuthError::CredentialsUnreadable {
                path: path.to_path_buf(),
                reason,
            })
    }

    pub async fn save(&self, path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_json()).await?;
        tracing::info!("Saved authorized credentials to {}", path.display());
        Ok(())
    }
}
