use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authorization code not provided")]
    MissingCode,

    #[error("Authorization code has already been presented")]
    ReplayedCode,

    #[error("Identity provider rejected the grant as invalid or expired")]
    InvalidGrant,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid TOTP code")]
    InvalidTotp,

    #[error("User already exists")]
    AlreadyExists,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Storage(err.into())
    }
}

impl AuthError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCode => "missing_code",
            AuthError::ReplayedCode => "replayed_code",
            AuthError::InvalidGrant => "invalid_grant",
            AuthError::Provider(_) => "provider_error",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidTotp => "invalid_totp",
            AuthError::AlreadyExists => "already_exists",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::Storage(_) => "storage_error",
            AuthError::Unauthorized => "unauthorized",
            AuthError::Internal(_) => "internal_error",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCode => AppError::BadRequest(anyhow::anyhow!("Code not provided")),
            AuthError::ReplayedCode => {
                AppError::BadRequest(anyhow::anyhow!("Authorization code has already been used"))
            }
            AuthError::InvalidGrant => AppError::BadRequest(anyhow::anyhow!(
                "Invalid or expired authorization code. Please try logging in again."
            )),
            AuthError::Provider(e) => {
                AppError::Upstream("Failed to exchange token", anyhow::anyhow!(e))
            }
            AuthError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            AuthError::InvalidTotp => AppError::Unauthorized(anyhow::anyhow!("Invalid TOTP code")),
            AuthError::AlreadyExists => AppError::Conflict(anyhow::anyhow!("User already exists")),
            AuthError::InvalidRefreshToken => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid refresh token"))
            }
            AuthError::Storage(e) => AppError::DatabaseError(e),
            AuthError::Unauthorized => AppError::Unauthorized(anyhow::anyhow!("Unauthorized")),
            AuthError::Internal(e) => AppError::InternalError(e),
        }
    }
}
