//! Google OAuth2 for installed apps: consent-code bootstrap and refresh.

use std::path::PathBuf;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::credentials::{AuthorizedUser, ClientSecrets};
use super::{Authorizer, GMAIL_READONLY_SCOPE, Session};
use crate::config::{Lookup, env_or};
use crate::error::AuthError;

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Where the long-lived credential comes from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// `credentials.json` + cached `token.json`, bootstrapped interactively.
    TokenFile {
        credentials_path: PathBuf,
        token_path: PathBuf,
    },
    /// Refresh credential provisioned through the environment.
    Environment {
        client_id: String,
        client_secret: SecretString,
        refresh_token: SecretString,
    },
}

/// Google authorization configuration.
#[derive(Debug, Clone)]
pub struct GoogleAuthConfig {
    pub source: CredentialSource,
    pub token_url: String,
    pub auth_url: String,
}

impl GoogleAuthConfig {
    /// Build config from environment variables.
    ///
    /// The environment strategy is selected only when client id, client
    /// secret and refresh token are all set.
    pub fn from_env() -> Self {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let source = match (
            non_empty("GOOGLE_CLIENT_ID"),
            non_empty("GOOGLE_CLIENT_SECRET"),
            non_empty("GOOGLE_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                CredentialSource::Environment {
                    client_id,
                    client_secret: SecretString::from(client_secret),
                    refresh_token: SecretString::from(refresh_token),
                }
            }
            _ => CredentialSource::TokenFile {
                credentials_path: PathBuf::from(env_or(
                    lookup,
                    "GOOGLE_CREDENTIALS_PATH",
                    "./credentials.json",
                )),
                token_path: PathBuf::from(env_or(lookup, "GOOGLE_TOKEN_PATH", "./token.json")),
            },
        };

        Self {
            source,
            token_url: env_or(lookup, "GOOGLE_TOKEN_URL", DEFAULT_TOKEN_URL),
            auth_url: env_or(lookup, "GOOGLE_AUTH_URL", DEFAULT_AUTH_URL),
        }
    }

    /// Short description for the startup banner.
    pub fn describe(&self) -> String {
        match &self.source {
            CredentialSource::TokenFile { token_path, .. } => {
                format!("token file ({})", token_path.display())
            }
            CredentialSource::Environment { .. } => "environment refresh token".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Google OAuth authorizer backed by the token endpoint.
pub struct GoogleAuthorizer {
    config: GoogleAuthConfig,
    client: reqwest::Client,
}

impl GoogleAuthorizer {
    pub fn new(config: GoogleAuthConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Consent page URL for an offline, read-only Gmail grant.
    pub fn consent_url(&self, secrets: &ClientSecrets) -> String {
        format!(
            "{}?access_type=offline&response_type=code&client_id={}&redirect_uri={}&scope={}",
            self.config.auth_url,
            urlencoding::encode(&secrets.client_id),
            urlencoding::encode(secrets.redirect_uri()),
            urlencoding::encode(GMAIL_READONLY_SCOPE),
        )
    }

    /// Make sure a long-lived credential exists, running the consent flow
    /// against `input` when the token file is missing.
    pub async fn authorize<R>(&self, mut input: R) -> Result<(), AuthError>
    where
        R: AsyncBufRead + Unpin,
    {
        let (credentials_path, token_path) = match &self.config.source {
            CredentialSource::Environment { .. } => {
                self.session().await?;
                tracing::info!("Environment refresh token is valid");
                return Ok(());
            }
            CredentialSource::TokenFile {
                credentials_path,
                token_path,
            } => (credentials_path, token_path),
        };

        if AuthorizedUser::load(token_path).await?.is_some() {
            tracing::info!("Already authorized ({})", token_path.display());
            return Ok(());
        }

        let secrets = ClientSecrets::load(credentials_path).await?;
        eprintln!("Authorize by visiting here: {}", self.consent_url(&secrets));
        eprint!("Please enter provided code: ");

        let mut code = String::new();
        input.read_line(&mut code).await?;
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::MissingConsentCode);
        }

        let user = self.exchange_code(&secrets, code).await?;
        user.save(token_path).await
    }

    /// Exchange a consent code for a long-lived credential.
    pub async fn exchange_code(
        &self,
        secrets: &ClientSecrets,
        code: &str,
    ) -> Result<AuthorizedUser, AuthError> {
        let token = self
            .post_token(&[
                ("code", code),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.expose_secret()),
                ("redirect_uri", secrets.redirect_uri()),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        let refresh_token = token.refresh_token.ok_or(AuthError::MissingRefreshToken)?;
        Ok(AuthorizedUser {
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            refresh_token: SecretString::from(refresh_token),
        })
    }

    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &SecretString,
        refresh_token: &SecretString,
    ) -> Result<Session, AuthError> {
        let token = self
            .post_token(&[
                ("client_id", client_id),
                ("client_secret", client_secret.expose_secret()),
                ("refresh_token", refresh_token.expose_secret()),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        tracing::debug!(expires_in = ?token.expires_in, "Obtained Gmail access token");
        Ok(Session::new(token.access_token))
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let resp = self
            .client
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::TokenRequest {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::TokenRejected {
                status: status.as_u16(),
                body,
            });
        }

        resp.json().await.map_err(|e| AuthError::TokenRequest {
            reason: format!("malformed token response: {e}"),
        })
    }
}

#[async_trait]
impl Authorizer for GoogleAuthorizer {
    async fn session(&self) -> Result<Session, AuthError> {
        match &self.config.source {
            CredentialSource::Environment {
                client_id,
                client_secret,
                refresh_token,
            } => self.refresh(client_id, client_secret, refresh_token).await,
            CredentialSource::TokenFile { token_path, .. } => {
                let user = AuthorizedUser::load(token_path)
                    .await?
                    .ok_or_else(|| AuthError::NotAuthorized {
                        path: token_path.clone(),
                    })?;
                self.refresh(&user.client_id, &user.client_secret, &user.refresh_token)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_token_file() {
        let vars = lookup_from(&[]);
        let config = GoogleAuthConfig::from_lookup(&|k| vars.get(k).cloned());
        match config.source {
            CredentialSource::TokenFile {
                credentials_path,
                token_path,
            } => {
                assert_eq!(credentials_path, PathBuf::from("./credentials.json"));
                assert_eq!(token_path, PathBuf::from("./token.json"));
            }
            other => panic!("expected token file, got {other:?}"),
        }
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
    }

    #[test]
    fn environment_strategy_needs_all_three() {
        let partial = lookup_from(&[("GOOGLE_CLIENT_ID", "id"), ("GOOGLE_REFRESH_TOKEN", "rt")]);
        let config = GoogleAuthConfig::from_lookup(&|k| partial.get(k).cloned());
        assert!(matches!(config.source, CredentialSource::TokenFile { .. }));

        let full = lookup_from(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_REFRESH_TOKEN", "rt"),
        ]);
        let config = GoogleAuthConfig::from_lookup(&|k| full.get(k).cloned());
        assert!(matches!(config.source, CredentialSource::Environment { .. }));
        assert_eq!(config.describe(), "environment refresh token");
    }

    #[test]
    fn consent_url_requests_offline_readonly_access() {
        let vars = lookup_from(&[]);
        let authorizer = GoogleAuthorizer::new(
            GoogleAuthConfig::from_lookup(&|k| vars.get(k).cloned()),
            reqwest::Client::new(),
        );
        let secrets = ClientSecrets::from_json(
            r#"{"installed":{"client_id":"abc.apps","client_secret":"s","redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();

        let url = authorizer.consent_url(&secrets);
        assert!(url.starts_with(DEFAULT_AUTH_URL));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("client_id=abc.apps"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost"));
        assert!(url.contains("gmail.readonly"));
    }

    #[tokio::test]
    async fn session_without_token_file_is_not_authorized() {
        let dir = tempfile::tempdir().unwrap();
        let config = GoogleAuthConfig {
            source: CredentialSource::TokenFile {
                credentials_path: dir.path().join("credentials.json"),
                token_path: dir.path().join("token.json"),
            },
            token_url: "http://127.0.0.1:9/token".into(),
            auth_url: DEFAULT_AUTH_URL.into(),
        };
        let authorizer = GoogleAuthorizer::new(config, reqwest::Client::new());

        let err = authorizer.session().await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthorized { .. }));
    }

    #[tokio::test]
    async fn authorize_without_credentials_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = GoogleAuthConfig {
            source: CredentialSource::TokenFile {
                credentials_path: dir.path().join("missing.json"),
                token_path: dir.path().join("token.json"),
            },
            token_url: "http://127.0.0.1:9/token".into(),
            auth_url: DEFAULT_AUTH_URL.into(),
        };
        let authorizer = GoogleAuthorizer::new(config, reqwest::Client::new());

        let err = authorizer.authorize(&b"code\n"[..]).await.unwrap_err();
        assert!(matches!(err, AuthError::CredentialsUnreadable { .. }));
    }
}
