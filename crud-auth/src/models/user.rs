//! User identity as held by the credential store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{OAuthProfile, ProviderTokens};

/// Access tier. New identities get the lowest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Employee => "Employee",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Admin" => Ok(Role::Admin),
            "Manager" => Ok(Role::Manager),
            "Employee" => Ok(Role::Employee),
            _ => Err(UnknownRole(value)),
        }
    }
}

/// Canonical form of the natural key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone, FromRow)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub email: String,
    /// Argon2 PHC string. `None` for identities created through OAuth.
    pub password_hash: Option<String>,
    /// Base32 TOTP secret when a second factor is enrolled.
    pub totp_secret: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub picture: Option<String>,
    pub provider_access_token: Option<String>,
    pub provider_refresh_token: Option<String>,
    pub provider_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserIdentity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("totp_enrolled", &self.totp_secret.is_some())
            .finish_non_exhaustive()
    }
}

impl UserIdentity {
    /// Identity created by direct sign-up.
    pub fn with_password(email: &str, password_hash: String, totp_secret: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash: Some(password_hash),
            totp_secret,
            role: Role::default(),
            first_name: None,
            last_name: None,
            picture: None,
            provider_access_token: None,
            provider_refresh_token: None,
            provider_token_expiry: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Identity created on first successful OAuth login.
    pub fn from_provider(profile: &OAuthProfile, tokens: &ProviderTokens) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            email: normalize_email(&profile.email),
            password_hash: None,
            totp_secret: None,
            role: Role::default(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            picture: profile.picture.clone(),
            provider_access_token: Some(tokens.access_token.clone()),
            provider_refresh_token: tokens.refresh_token.clone(),
            provider_token_expiry: tokens.expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the stored provider tokens (last write wins).
    pub fn apply_provider_tokens(&mut self, tokens: &ProviderTokens) {
        self.provider_access_token = Some(tokens.access_token.clone());
        self.provider_refresh_token = tokens.refresh_token.clone();
        self.provider_token_expiry = tokens.expires_at;
        self.updated_at = Utc::now();
    }

    pub fn totp_enrolled(&self) -> bool {
        self.totp_secret.is_some()
    }

    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self)
    }
}

/// User as returned over HTTP: no hashes, secrets or provider tokens.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    #[serde(rename = "firstname")]
    pub first_name: Option<String>,
    #[serde(rename = "lastname")]
    pub last_name: Option<String>,
    pub picture: Option<String>,
    pub role: Role,
    pub totp_enrolled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&UserIdentity> for UserResponse {
    fn from(u: &UserIdentity) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            picture: u.picture.clone(),
            role: u.role,
            totp_enrolled: u.totp_enrolled(),
            created_at: u.created_at,
        }
    }
}
