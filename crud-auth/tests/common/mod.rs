//! Shared setup for crud-auth integration tests.
//!
//! Everything runs in-process on the memory stores, a scripted identity
//! provider and a manual clock, so no database or network is needed.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{TimeZone, Utc};
use crud_auth::{
    build_router,
    config::{
        AuthConfig, DatabaseConfig, Environment, GoogleOAuthConfig, JwtConfig, RateLimitConfig,
        TotpConfig,
    },
    models::{OAuthProfile, ProviderTokens},
    services::{
        IdentityProvider, ManualClock, MemoryCodeLedger, MemoryCredentialStore, ProviderError,
        TotpService,
    },
    AppState,
};
use secrecy::Secret;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> AuthConfig {
    AuthConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "crud-auth".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: None,
            max_connections: 5,
        },
        jwt: JwtConfig {
            secret: Secret::new("integration-test-signing-secret-0123456789".to_string()),
            access_token_ttl_seconds: 60,
            refresh_token_ttl_seconds: 86_400,
            revocation_sweep_interval_seconds: 60,
        },
        google: GoogleOAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: Secret::new("test-client-secret".to_string()),
            redirect_uri: "http://localhost:8086/callback".to_string(),
            auth_url: "https://idp.test/auth".to_string(),
            token_url: "https://idp.test/token".to_string(),
            userinfo_url: "https://idp.test/userinfo".to_string(),
            http_timeout_seconds: 5,
        },
        totp: TotpConfig {
            issuer: "crud-auth".to_string(),
            enroll_on_signup: true,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 1_000,
            login_window_seconds: 60,
            signup_attempts: 1_000,
            signup_window_seconds: 60,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeBehavior {
    Succeed,
    InvalidGrant,
    Reject,
}

/// Identity provider that answers every code the same way and counts calls.
pub struct FakeProvider {
    pub email: String,
    pub behavior: ExchangeBehavior,
    pub delay: Duration,
    exchanges: AtomicUsize,
    profile_fetches: AtomicUsize,
}

impl FakeProvider {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            behavior: ExchangeBehavior::Succeed,
            delay: Duration::ZERO,
            exchanges: AtomicUsize::new(0),
            profile_fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_behavior(mut self, behavior: ExchangeBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn profile_fetches(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://idp.test/auth?client_id=test-client&state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behavior {
            ExchangeBehavior::Succeed => Ok(ProviderTokens {
                access_token: format!("provider-access-{}", code),
                refresh_token: Some(format!("provider-refresh-{}", code)),
                expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            }),
            ExchangeBehavior::InvalidGrant => Err(ProviderError::InvalidGrant),
            ExchangeBehavior::Reject => Err(ProviderError::Rejected {
                status: 500,
                body: "backend error".to_string(),
            }),
        }
    }

    async fn fetch_profile(&self, _tokens: &ProviderTokens) -> Result<OAuthProfile, ProviderError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(OAuthProfile {
            email: self.email.clone(),
            first_name: Some("Alice".to_string()),
            last_name: Some("Liddell".to_string()),
            picture: None,
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryCredentialStore>,
    pub ledger: Arc<MemoryCodeLedger>,
    pub provider: Arc<FakeProvider>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(test_config(), FakeProvider::new("alice@example.com"))
    }

    pub fn with_provider(provider: FakeProvider) -> Self {
        Self::build(test_config(), provider)
    }

    pub fn with_config(config: AuthConfig) -> Self {
        Self::build(config, FakeProvider::new("alice@example.com"))
    }

    fn build(config: AuthConfig, provider: FakeProvider) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryCredentialStore::new());
        let ledger = Arc::new(MemoryCodeLedger::new());
        let provider = Arc::new(provider);

        let state = AppState::new(
            config,
            store.clone(),
            ledger.clone(),
            provider.clone(),
            clock.clone(),
        );
        let router = build_router(state.clone());

        Self {
            router,
            state,
            clock,
            store,
            ledger,
            provider,
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.clock.advance(chrono::Duration::seconds(seconds));
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        into_json(self.send(request).await).await
    }

    pub async fn post_form(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        into_json(self.send(request).await).await
    }

    pub async fn post(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        into_json(self.send(request).await).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        into_json(self.send(request).await).await
    }

    pub async fn get_with_bearer(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        into_json(self.send(request).await).await
    }

    pub async fn signup(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post_json(
            "/signup",
            serde_json::json!({ "Email": email, "Password": password }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str, totp: Option<&str>) -> (StatusCode, Value) {
        let mut body = serde_json::json!({ "Email": email, "Password": password });
        if let Some(code) = totp {
            body["TOTP"] = Value::String(code.to_string());
        }
        self.post_json("/login", body).await
    }

    /// Current code for the secret embedded in a sign-up `totpURL`.
    pub fn totp_code(&self, totp_url: &str, email: &str) -> String {
        let secret = totp_secret(totp_url);
        TotpService::new("crud-auth", self.clock.clone())
            .current_code(&secret, email)
            .expect("valid TOTP secret")
    }

    /// Sign up and log in, returning the issued token pair.
    pub async fn signed_in(&self, email: &str) -> (String, String) {
        let (status, body) = self.signup(email, TEST_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "signup failed: {}", body);

        let code = self.totp_code(body["totpURL"].as_str().unwrap(), email);
        let (status, body) = self.login(email, TEST_PASSWORD, Some(&code)).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);

        (
            body["access_token"].as_str().unwrap().to_string(),
            body["refresh_token"].as_str().unwrap().to_string(),
        )
    }
}

pub fn totp_secret(totp_url: &str) -> String {
    totp_url
        .split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("secret="))
        .expect("totpURL carries a secret")
        .to_string()
}

pub async fn into_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
