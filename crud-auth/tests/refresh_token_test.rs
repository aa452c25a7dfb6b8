mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn test_refresh_token_flow() {
    let app = TestApp::new();
    let (_, refresh) = app.signed_in("alice@example.com").await;

    app.advance(120);

    let (status, body) = app
        .post_form("/refresh", &format!("refresh_token={}", refresh))
        .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 60);

    let access = body["access_token"].as_str().unwrap();
    let (status, session) = app.get_with_bearer("/session", access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["email"], "alice@example.com");

    // Not rotated: the same refresh token keeps working
    app.advance(1);
    let (status, _) = app
        .post_form("/refresh", &format!("refresh_token={}", refresh))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_refresh_token_is_rejected() {
    let app = TestApp::new();

    let (status, body) = app.post_form("/refresh", "refresh_token=unknown").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid refresh token");

    let (status, body) = app.post("/refresh").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid refresh token");
}

#[tokio::test]
async fn test_access_token_is_not_a_refresh_token() {
    let app = TestApp::new();
    let (access, _) = app.signed_in("bob@example.com").await;

    let (status, _) = app
        .post_form("/refresh", &format!("refresh_token={}", access))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_after_logout_is_rejected() {
    let app = TestApp::new();
    let (access, refresh) = app.signed_in("carol@example.com").await;

    let (status, _) = app
        .post(&format!(
            "/logout?accessToken={}&refreshToken={}",
            access, refresh
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.revocations().refresh_count(), 0);

    let (status, _) = app
        .post_form("/refresh", &format!("refresh_token={}", refresh))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_refresh_token_is_rejected() {
    let app = TestApp::new();
    let (_, refresh) = app.signed_in("dave@example.com").await;

    app.advance(86_400);
    let (status, _) = app
        .post_form("/refresh", &format!("refresh_token={}", refresh))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_with_unknown_tokens_still_succeeds() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/logout?accessToken=garbage&refreshToken=garbage")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully logged out");

    let (status, _) = app.post("/logout").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.revocations().revoked_count(), 0);
}
