pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use metrics_exporter_prometheus::PrometheusHandle;
use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    tracing::{make_request_span, request_id_middleware},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::{Modify, OpenApi};

use crate::config::AuthConfig;
use crate::services::{
    Clock, CodeUsageLedger, CredentialAuthenticator, CredentialStore, IdentityProvider,
    OAuthExchangeCoordinator, SessionTokenIssuer, TokenRevocationStore, TotpService,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::registration::signup,
        handlers::auth::session::login,
        handlers::auth::session::refresh,
        handlers::auth::session::logout,
        handlers::auth::session::current_session,
        handlers::auth::social::oauth_redirect,
        handlers::auth::social::oauth_callback,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::SignUpRequest,
            dtos::auth::SignUpResponse,
            dtos::auth::LoginRequest,
            dtos::auth::TokenResponse,
            dtos::auth::RefreshRequest,
            dtos::auth::RefreshResponse,
            dtos::auth::OAuthLoginResponse,
            dtos::auth::SessionResponse,
            models::UserResponse,
            models::Role,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Password + TOTP login and session tokens"),
        (name = "OAuth", description = "Authorization-code login through the identity provider"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub store: Arc<dyn CredentialStore>,
    pub issuer: Arc<SessionTokenIssuer>,
    pub authenticator: Arc<CredentialAuthenticator>,
    pub oauth: Arc<OAuthExchangeCoordinator>,
    pub login_rate_limiter: IpRateLimiter,
    pub signup_rate_limiter: IpRateLimiter,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the auth components around the given stores, provider and clock.
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        ledger: Arc<dyn CodeUsageLedger>,
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let revocations = Arc::new(TokenRevocationStore::new(clock.clone()));
        let issuer = Arc::new(SessionTokenIssuer::new(
            &config.jwt.secret,
            config.jwt.access_token_ttl_seconds,
            config.jwt.refresh_token_ttl_seconds,
            clock.clone(),
            revocations,
        ));
        let authenticator = Arc::new(CredentialAuthenticator::new(
            store.clone(),
            TotpService::new(config.totp.issuer.clone(), clock),
            issuer.clone(),
            config.totp.enroll_on_signup,
        ));
        let oauth = Arc::new(OAuthExchangeCoordinator::new(
            ledger,
            store.clone(),
            provider,
            issuer.clone(),
        ));

        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        let signup_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.signup_attempts,
            config.rate_limit.signup_window_seconds,
        );

        Self {
            config,
            store,
            issuer,
            authenticator,
            oauth,
            login_rate_limiter,
            signup_rate_limiter,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn revocations(&self) -> &Arc<TokenRevocationStore> {
        self.issuer.revocations()
    }
}

pub fn build_router(state: AppState) -> Router {
    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let signup_route = Router::new()
        .route("/signup", post(handlers::auth::signup))
        .layer(from_fn_with_state(
            state.signup_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let protected = Router::new()
        .route("/session", get(handlers::auth::current_session))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/auth", get(handlers::auth::oauth_redirect))
        .route("/callback", get(handlers::auth::oauth_callback))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/logout", post(handlers::auth::logout))
        .merge(login_route)
        .merge(signup_route)
        .merge(protected)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<service_core::axum::body::Body>))
        .layer(from_fn(request_id_middleware))
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Credential store unreachable", body = ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Credential store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "environment": format!("{:?}", state.config.environment),
    })))
}
