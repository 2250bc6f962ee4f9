//! Authentication integration tests.
//!
//! Tests verify:
//! - Registration and duplicate usernames
//! - Basic credentials and issued bearer tokens
//! - Expired, tampered and orphaned tokens are rejected
//! - Auth-disabled mode exposes every route

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use serde_json::json;

use facematch::TokenSigner;

use super::test_utils::{
    basic_auth, bearer_auth, form_request, get, json_request, TestApp, TEST_SECRET,
};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_user() {
    let app = TestApp::new().await;

    let response = app
        .send(json_request(
            "POST",
            "/api/register_user",
            json!({ "username": "bob", "password": "hunter2" }),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json, json!({ "username": "bob" }));

    let stored = app.db.password_hash("bob").await.unwrap().unwrap();
    assert_ne!(stored, "hunter2");
    assert!(stored.starts_with("$argon2"));
}

#[tokio::test]
async fn test_register_user_form_body() {
    let app = TestApp::new().await;

    let response = app
        .send(form_request(
            "/api/register_user",
            "username=carol&password=secret",
            None,
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(app.db.user_exists("carol").await.unwrap());
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let app = TestApp::new().await;
    app.register("bob", "first").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/register_user",
            json!({ "username": "bob", "password": "second" }),
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["error"], "user_exists");

    // The original password still works
    let response = app
        .send(get("/api/original_images", Some(&basic_auth("bob", "first"))))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_requires_both_fields() {
    let app = TestApp::new().await;

    let response = app
        .send(json_request(
            "POST",
            "/api/register_user",
            json!({ "username": "bob" }),
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["error"], "invalid_request");
    assert!(!app.db.user_exists("bob").await.unwrap());
}

// =============================================================================
// Basic Credentials
// =============================================================================

#[tokio::test]
async fn test_missing_credentials_challenged() {
    let app = TestApp::new().await;

    let response = app.send(get("/api/original_images", None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json["error"], "missing_credentials");
    assert!(response
        .headers
        .get("www-authenticate")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("Basic"));
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let app = TestApp::new().await;
    app.register("alice", "wonderland").await;

    let response = app
        .send(get(
            "/api/original_images",
            Some(&basic_auth("alice", "looking-glass")),
        ))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json["error"], "invalid_credentials");
}

#[tokio::test]
async fn test_unknown_user_rejected() {
    let app = TestApp::new().await;

    let response = app
        .send(get("/api/original_images", Some(&basic_auth("nobody", "x"))))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Bearer Tokens
// =============================================================================

#[tokio::test]
async fn test_token_round_trip() {
    let app = TestApp::new().await;
    let auth = app.alice().await;

    let response = app.send(get("/api/token", Some(&auth))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["duration"], 600);
    let token = response.json["token"].as_str().unwrap().to_string();

    let response = app
        .send(get("/api/original_images", Some(&bearer_auth(&token))))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json, json!({ "imgs": [] }));
}

#[tokio::test]
async fn test_token_endpoint_requires_basic() {
    let app = TestApp::new().await;
    app.register("alice", "wonderland").await;

    let token = TokenSigner::new(TEST_SECRET, Duration::from_secs(600))
        .issue("alice")
        .0;
    let response = app.send(get("/api/token", Some(&bearer_auth(&token)))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json["error"], "basic_auth_required");
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = TestApp::new().await;
    app.register("alice", "wonderland").await;

    let signer = TokenSigner::new(TEST_SECRET, Duration::from_secs(600));
    let token = signer.issue_with_expiry("alice", now_secs() - 100);

    let response = app
        .send(get("/api/original_images", Some(&bearer_auth(&token))))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json["error"], "token_expired");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let app = TestApp::new().await;
    app.register("alice", "wonderland").await;

    let token = TokenSigner::new("some-other-secret", Duration::from_secs(600))
        .issue("alice")
        .0;
    let response = app
        .send(get("/api/original_images", Some(&bearer_auth(&token))))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json["error"], "invalid_token");
}

#[tokio::test]
async fn test_malformed_token_rejected() {
    let app = TestApp::new().await;

    let response = app
        .send(get("/api/original_images", Some(&bearer_auth("not-a-token"))))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json["error"], "malformed_token");
}

#[tokio::test]
async fn test_token_for_missing_user_rejected() {
    let app = TestApp::new().await;

    // Validly signed, but the account does not exist
    let token = TokenSigner::new(TEST_SECRET, Duration::from_secs(600))
        .issue("ghost")
        .0;
    let response = app
        .send(get("/api/original_images", Some(&bearer_auth(&token))))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Public Routes and Disabled Auth
// =============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;

    let response = app.send(get("/health", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["status"], "healthy");
    assert_eq!(response.json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_auth_disabled_opens_api() {
    let app = TestApp::builder().without_auth().build().await;

    let response = app.send(get("/api/original_images", None)).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.send(get("/api/token", None)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route_not_found() {
    let app = TestApp::new().await;

    let response = app.send(get("/api/does_not_exist", None)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
