mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{into_json, test_config, TestApp, TEST_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "crud-auth");
}

#[tokio::test]
async fn test_openapi_document_lists_auth_routes() {
    let app = TestApp::new();

    let (status, body) = app.get("/.well-known/openapi.json").await;
    assert_eq!(status, StatusCode::OK);

    let paths = body["paths"].as_object().expect("paths object");
    for route in ["/signup", "/login", "/refresh", "/logout", "/session", "/auth", "/callback"] {
        assert!(paths.contains_key(route), "missing {}", route);
    }
    assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn test_metrics_endpoint_without_recorder_is_empty() {
    let app = TestApp::new();

    let response = app
        .send(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_rate_limit_per_ip() {
    let mut config = test_config();
    config.rate_limit.login_attempts = 2;
    let app = TestApp::with_config(config);

    let login_from = |ip: &'static str| {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(
                json!({ "Email": "nobody@example.com", "Password": TEST_PASSWORD }).to_string(),
            ))
            .unwrap()
    };

    for _ in 0..2 {
        let (status, _) = into_json(app.send(login_from("198.51.100.1")).await).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let response = app.send(login_from("198.51.100.1")).await;
    assert!(response.headers().contains_key("retry-after"));
    let (status, _) = into_json(response).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = into_json(app.send(login_from("198.51.100.2")).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
