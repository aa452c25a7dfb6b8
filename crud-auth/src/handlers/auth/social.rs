use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::RngCore;
use service_core::error::AppError;

use crate::{
    config::Environment,
    dtos::auth::{OAuthCallbackQuery, OAuthLoginResponse},
    middleware::auth::ACCESS_TOKEN_COOKIE,
    AppState,
};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

fn random_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Redirect the browser to the identity provider
#[utoipa::path(
    get,
    path = "/auth",
    responses(
        (status = 307, description = "Redirect to the identity provider")
    ),
    tag = "OAuth"
)]
pub async fn oauth_redirect(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Response) {
    let state_val = random_state();
    let url = state.oauth.provider().authorization_url(&state_val);

    let jar = jar.add(
        Cookie::build((OAUTH_STATE_COOKIE, state_val))
            .path("/")
            .http_only(true)
            .secure(state.config.environment == Environment::Prod)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::minutes(5))
            .build(),
    );

    (jar, Redirect::temporary(&url).into_response())
}

/// Complete the authorization-code flow
#[utoipa::path(
    get,
    path = "/callback",
    params(OAuthCallbackQuery),
    responses(
        (status = 200, description = "User logged in", body = OAuthLoginResponse),
        (status = 400, description = "Missing, replayed or invalid code", body = ErrorResponse),
        (status = 500, description = "Provider or storage failure", body = ErrorResponse)
    ),
    tag = "OAuth"
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<(CookieJar, Json<OAuthLoginResponse>), AppError> {
    if let Some(expected) = jar.get(OAUTH_STATE_COOKIE) {
        if query.state.as_deref() != Some(expected.value()) {
            tracing::warn!("OAuth state mismatch");
            return Err(AppError::BadRequest(anyhow::anyhow!("Invalid OAuth state")));
        }
    }

    let session = state.oauth.handle_callback(query.code.as_deref()).await?;

    let jar = jar
        .remove(Cookie::build(OAUTH_STATE_COOKIE).path("/"))
        .add(
            Cookie::build((ACCESS_TOKEN_COOKIE, session.tokens.access_token.clone()))
                .path("/")
                .http_only(true)
                .secure(state.config.environment == Environment::Prod)
                .same_site(SameSite::Lax)
                .max_age(time::Duration::seconds(session.tokens.expires_in))
                .build(),
        );

    Ok((
        jar,
        Json(OAuthLoginResponse {
            message: "User logged in successfully".to_string(),
            user: session.user.sanitized(),
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
            token_type: session.tokens.token_type,
            expires_in: session.tokens.expires_in,
        }),
    ))
}
