//! Request gate for protected routes.
//!
//! Unauthenticated -> token extracted -> not revoked -> signature/expiry valid
//! -> Authenticated. Any failed step rejects with 401.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::services::{AuthError, SessionClaims, SessionTokenIssuer, TokenKind, TokenRejection};
use crate::AppState;

/// Cookie consulted when no Authorization header is present.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    MissingToken,
    Revoked,
    Invalid(TokenRejection),
}

impl GateRejection {
    fn reason(&self) -> &'static str {
        match self {
            GateRejection::MissingToken => "missing",
            GateRejection::Revoked => "revoked",
            GateRejection::Invalid(inner) => inner.as_str(),
        }
    }
}

/// Bearer token (scheme matched case-insensitively), else the access cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let scheme = value.get(..7)?;
            let token = value.get(7..)?;
            scheme.eq_ignore_ascii_case("bearer ").then(|| token.trim())
        })
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(ACCESS_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

pub fn authenticate(
    issuer: &SessionTokenIssuer,
    headers: &HeaderMap,
) -> Result<SessionClaims, GateRejection> {
    let token = extract_token(headers).ok_or(GateRejection::MissingToken)?;

    if issuer.revocations().is_revoked(&token) {
        return Err(GateRejection::Revoked);
    }

    issuer
        .verify(&token, TokenKind::Access)
        .map_err(GateRejection::Invalid)
}

/// Middleware to require a valid, unrevoked access token
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match authenticate(&state.issuer, req.headers()) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(rejection) => {
            metrics::counter!("auth_gate_rejections_total", "reason" => rejection.reason())
                .increment(1);
            tracing::debug!(reason = rejection.reason(), "Request rejected by auth gate");
            Err(AuthError::Unauthorized.into())
        }
    }
}

/// Extractor for the claims attached by [`auth_middleware`]
pub struct AuthUser(pub SessionClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionClaims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Auth claims missing from request extensions"
                ))
            })
    }
}
