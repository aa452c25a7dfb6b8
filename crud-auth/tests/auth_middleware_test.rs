mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{into_json, TestApp};
use serde_json::json;

async fn session_with(app: &TestApp, name: header::HeaderName, value: String) -> StatusCode {
    let request = Request::builder()
        .uri("/session")
        .header(name, value)
        .body(Body::empty())
        .unwrap();
    app.send(request).await.status()
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.get("/session").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized" }));
}

#[tokio::test]
async fn test_access_token_expires_after_ttl() {
    let app = TestApp::new();
    let (access, _) = app.signed_in("alice@example.com").await;

    app.advance(59);
    let (status, _) = app.get_with_bearer("/session", &access).await;
    assert_eq!(status, StatusCode::OK);

    app.advance(2);
    let (status, body) = app.get_with_bearer("/session", &access).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_revoked_token_is_rejected() {
    let app = TestApp::new();
    let (access, _) = app.signed_in("bob@example.com").await;

    let (status, _) = app.post(&format!("/logout?accessToken={}", access)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.state.revocations().is_revoked(&access));

    let (status, _) = app.get_with_bearer("/session", &access).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cookie_token_is_accepted() {
    let app = TestApp::new();
    let (access, _) = app.signed_in("carol@example.com").await;

    let status = session_with(&app, header::COOKIE, format!("access_token={}", access)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_bearer_scheme_is_case_insensitive() {
    let app = TestApp::new();
    let (access, _) = app.signed_in("dave@example.com").await;

    let status = session_with(&app, header::AUTHORIZATION, format!("bearer {}", access)).await;
    assert_eq!(status, StatusCode::OK);

    let status = session_with(&app, header::AUTHORIZATION, format!("Basic {}", access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_cannot_be_used_as_access_token() {
    let app = TestApp::new();
    let (_, refresh) = app.signed_in("erin@example.com").await;

    let (status, _) = app.get_with_bearer("/session", &refresh).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tampered_and_foreign_tokens_are_rejected() {
    let app = TestApp::new();
    let (access, _) = app.signed_in("frank@example.com").await;

    let signature_start = access.rfind('.').unwrap() + 1;
    let replacement = if access[signature_start..].starts_with('A') { "B" } else { "A" };
    let mut tampered = access.clone();
    tampered.replace_range(signature_start..signature_start + 1, replacement);
    let (status, _) = app.get_with_bearer("/session", &tampered).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get_with_bearer("/session", "not.a.jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Same token presented to a deployment with a different signing secret
    let mut config = common::test_config();
    config.jwt.secret = secrecy::Secret::new("another-secret-entirely-0123456789abcdef".to_string());
    let rotated = TestApp::with_config(config);
    let (status, _) = rotated.get_with_bearer("/session", &access).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gate_rejections_carry_request_id() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/session")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-123")
    );
    let (status, _) = into_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
