use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::UserResponse;
use crate::services::SessionTokens;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignUpRequest {
    #[serde(rename = "Email", alias = "email")]
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[serde(rename = "Password", alias = "password")]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "correct-horse", min_length = 8)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignUpResponse {
    #[schema(example = "User created successfully")]
    pub message: String,
    /// `otpauth://` URI to render as a QR code; absent when TOTP enrollment is off.
    #[serde(rename = "totpURL", skip_serializing_if = "Option::is_none")]
    #[schema(example = "otpauth://totp/crud-auth:alice%40example.com?secret=JBSWY3DPEHPK3PXP&issuer=crud-auth")]
    pub totp_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[serde(rename = "Email", alias = "email")]
    #[validate(length(min = 1, message = "Email is required"))]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[serde(rename = "Password", alias = "password")]
    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "correct-horse")]
    pub password: String,

    #[serde(rename = "TOTP", alias = "totp", default)]
    #[schema(example = "123456")]
    pub totp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 60)]
    pub expires_in: i64,
}

impl From<SessionTokens> for TokenResponse {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 60)]
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogoutQuery {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OAuthLoginResponse {
    #[schema(example = "User logged in successfully")]
    pub message: String,
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 60)]
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// Access token expiry (unix seconds)
    pub expires_at: i64,
}
