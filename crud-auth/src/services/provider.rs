//! External identity provider (OAuth2 client side).

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::{OAuthProfile, ProviderTokens};

#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider says the code is invalid, expired or already redeemed.
    #[error("invalid_grant")]
    InvalidGrant,

    #[error("provider returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Network-level failure; nothing is known about the code's fate.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start the flow.
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError>;

    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<OAuthProfile, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

pub struct GoogleProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
    endpoints: GoogleEndpoints,
}

impl GoogleProvider {
    pub fn new(
        client_id: String,
        client_secret: Secret<String>,
        redirect_uri: String,
        endpoints: GoogleEndpoints,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            client_id,
            client_secret,
            redirect_uri,
            endpoints,
        })
    }

    fn classify_failure(status: u16, body: String) -> ProviderError {
        let is_invalid_grant = serde_json::from_str::<GoogleErrorResponse>(&body)
            .map(|e| e.error == "invalid_grant")
            .unwrap_or_else(|_| body.contains("invalid_grant"));

        if is_invalid_grant {
            ProviderError::InvalidGrant
        } else {
            ProviderError::Rejected { status, body }
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile&access_type=offline&state={}",
            self.endpoints.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        let res = self
            .client
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret().as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Google token exchange error");
            return Err(Self::classify_failure(status.as_u16(), body));
        }

        let token: GoogleTokenResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("token response: {}", e)))?;

        Ok(ProviderTokens {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }

    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<OAuthProfile, ProviderError> {
        let res = self
            .client
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Google userinfo error");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let info: GoogleUserInfo = res
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("userinfo response: {}", e)))?;

        let email = info
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ProviderError::Decode("userinfo has no email".to_string()))?;

        Ok(OAuthProfile {
            email,
            first_name: info.given_name,
            last_name: info.family_name,
            picture: info.picture,
        })
    }
}
