use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{SignUpRequest, SignUpResponse},
    utils::{Password, ValidatedJson},
    AppState,
};

/// Create a password account, enrolling TOTP when enabled
#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignUpRequest,
    responses(
        (status = 200, description = "User created", body = SignUpResponse),
        (status = 400, description = "Malformed body or validation error", body = ErrorResponse),
        (status = 409, description = "User already exists", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .authenticator
        .sign_up(&req.email, Password::new(req.password))
        .await?;

    Ok((
        StatusCode::OK,
        Json(SignUpResponse {
            message: "User created successfully".to_string(),
            totp_url: outcome.totp.map(|t| t.provisioning_uri),
        }),
    ))
}
