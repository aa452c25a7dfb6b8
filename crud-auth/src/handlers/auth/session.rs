use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use service_core::{error::AppError, middleware::rate_limit::client_ip};
use std::net::SocketAddr;

use crate::{
    dtos::{
        auth::{LoginRequest, LogoutQuery, RefreshRequest, RefreshResponse, SessionResponse, TokenResponse},
        MessageResponse,
    },
    middleware::AuthUser,
    services::LoginAttempt,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Login with email, password and (when enrolled) a TOTP code
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Invalid credentials or TOTP code", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let attempt = LoginAttempt {
        email: req.email,
        password: Password::new(req.password),
        totp: req.totp,
        ip: client_ip(&headers, peer).map(|ip| ip.to_string()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let session = state.authenticator.login(attempt).await?;
    Ok((StatusCode::OK, Json(TokenResponse::from(session.tokens))))
}

/// Mint a new access token from a refresh token (form field `refresh_token`)
#[utoipa::path(
    post,
    path = "/refresh",
    request_body(content = RefreshRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid refresh token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    form: Option<Form<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let refresh_token = form
        .map(|Form(req)| req.refresh_token)
        .unwrap_or_default();

    let access_token = state.issuer.refresh(&refresh_token)?;

    Ok((
        StatusCode::OK,
        Json(RefreshResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.issuer.access_ttl_seconds(),
        }),
    ))
}

/// Revoke an access token and forget a refresh token
#[utoipa::path(
    post,
    path = "/logout",
    params(LogoutQuery),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    ),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    Query(query): Query<LogoutQuery>,
) -> impl IntoResponse {
    state
        .issuer
        .logout(query.access_token.as_deref(), query.refresh_token.as_deref());

    (
        StatusCode::OK,
        Json(MessageResponse::new("Successfully logged out")),
    )
}

/// Identity behind the presented access token
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Authenticated", body = SessionResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn current_session(AuthUser(claims): AuthUser) -> impl IntoResponse {
    Json(SessionResponse {
        email: claims.sub,
        expires_at: claims.exp,
    })
}
