// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use axum::extract::Form;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use super::*;
use crate::account::refresh::RefreshOutcome;
use crate::test_support::serve_stub;

async fn token(Form(form): Form<HashMap<String, String>>) -> axum::response::Response {
    match form.get("grant_type").map(String::as_str) {
        Some("password") if form.get("Password").map(String::as_str) == Some("123456") => {
            assert_eq!(form.get("scope").map(String::as_str), Some(TOKEN_SCOPE));
            Json(json!({
                "access_token": "at-1",
                "refresh_token": "rt-1",
                "id_token": "id-1",
                "expires_in": 3600,
                "token_type": "Bearer",
                "scope": TOKEN_SCOPE
            }))
            .into_response()
        }
        Some("refresh_token") => match form.get("refresh_token").map(String::as_str) {
            Some("good") => Json(json!({"access_token": "at-2", "refresh_token": "rt-2", "expires_in": 1800}))
                .into_response(),
            Some("busy") => (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response(),
            _ => (StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#).into_response(),
        },
        _ => (StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#).into_response(),
    }
}

async fn register(Form(form): Form<HashMap<String, String>>) -> axum::response::Response {
    match form.get("Email").map(String::as_str) {
        Some("new@test.com") => StatusCode::OK.into_response(),
        Some("old@test.com") => (StatusCode::BAD_REQUEST, r#"[{"code":"DuplicateEmail"}]"#).into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
    }
}

async fn verification(Form(form): Form<HashMap<String, String>>) -> axum::response::Response {
    match form.get("UserName").map(String::as_str) {
        Some("known@test.com") => StatusCode::OK.into_response(),
        Some("ghost@test.com") => (StatusCode::BAD_REQUEST, r#"{"error":"user_not_found"}"#).into_response(),
        _ => (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response(),
    }
}

async fn client() -> anyhow::Result<AuthClient> {
    let router = Router::new()
        .route("/connect/token", post(token))
        .route("/api/NativeAccount/RegisterUserAsync", post(register))
        .route("/api/NativeAccount/RequestVerificationCodeAsync", post(verification));
    let base = serve_stub(router).await?;
    Ok(AuthClient::new(&base, "android"))
}

#[tokio::test]
async fn password_grant_returns_token_set() -> anyhow::Result<()> {
    let auth = client().await?;
    let tokens = auth.request_access_token("new@test.com", "123456").await?;
    assert_eq!(tokens.access_token, "at-1");
    assert_eq!(tokens.refresh_token, "rt-1");
    assert_eq!(tokens.expires_in, 3600);

    let err = auth.request_access_token("new@test.com", "000000").await.err();
    assert_eq!(err.and_then(|e| e.status), Some(400));
    Ok(())
}

#[tokio::test]
async fn refresh_failures_carry_status() -> anyhow::Result<()> {
    let auth = client().await?;

    let ok = RefreshOutcome::from(auth.refresh("good").await);
    assert!(matches!(ok, RefreshOutcome::Refreshed(ref t) if t.access_token == "at-2"));

    let rejected = auth.refresh("revoked").await;
    assert!(matches!(&rejected, Err(e) if e.is_rejection()));
    assert!(matches!(RefreshOutcome::from(rejected), RefreshOutcome::Rejected(_)));

    let transient = RefreshOutcome::from(auth.refresh("busy").await);
    assert!(matches!(transient, RefreshOutcome::Retry(_)));
    Ok(())
}

#[tokio::test]
async fn network_failure_is_retryable() {
    crate::test_support::ensure_crypto();
    let auth = AuthClient::new("http://127.0.0.1:9", "android");
    let result = auth.refresh("anything").await;
    assert!(matches!(result, Err(ref e) if e.status.is_none() && !e.is_rejection()));
}

#[tokio::test]
async fn duplicate_registration_counts_as_success() -> anyhow::Result<()> {
    let auth = client().await?;
    auth.register_user("new@test.com", &Profile::default()).await?;
    auth.register_user("old@test.com", &Profile::default()).await?;

    let err = auth.register_user("bad@test.com", &Profile::default()).await.err();
    assert_eq!(err.and_then(|e| e.status), Some(500));
    Ok(())
}

#[tokio::test]
async fn verification_code_detects_unknown_user() -> anyhow::Result<()> {
    let auth = client().await?;
    assert_eq!(auth.request_verification_code("known@test.com").await?, CodeRequest::Sent);
    assert_eq!(auth.request_verification_code("ghost@test.com").await?, CodeRequest::UserNotFound);

    let err = auth.request_verification_code("other@test.com").await.err();
    assert_eq!(err.and_then(|e| e.status), Some(429));
    Ok(())
}
