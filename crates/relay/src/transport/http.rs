// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the relay.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::account::refresh::{RefreshReport, RefreshScope};
use crate::account::{with_store, Account, AccountStatusInfo};
use crate::auth::{CodeRequest, Profile};
use crate::error::{RelayError, UpstreamError};
use crate::state::{epoch_ms, RelayState};
use crate::upstream::poi::POI_TYPE_NAMES;

// -- Response types -----------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub session_count: usize,
    pub checked_out: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsResponse {
    pub total: usize,
    pub alive: usize,
    pub dead: usize,
    pub checked_out: usize,
    pub accounts: Vec<AccountStatusInfo>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub report: RefreshReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    pub username: Option<String>,
    pub app_installation_id: Option<String>,
    pub token_age_min: Option<u64>,
    pub token_expires_in: Option<u64>,
    pub active_sessions: usize,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub user_not_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// -- Request types ------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OtpRequest {
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        session_count: s.manager.session_count().await,
        checked_out: s.manager.pool().active_count(),
    })
}

/// `GET /api/accounts`: every known account with liveness and checkout state.
pub async fn accounts(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    let pool = s.manager.pool();
    let accounts = match with_store(pool.store(), |store| store.list()).await {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(err = %e, "account store unreadable");
            return RelayError::Internal.to_http_response(format!("{e:#}")).into_response();
        }
    };

    let now = epoch_ms();
    let dead = accounts.iter().filter(|a| a.dead).count();
    Json(AccountsResponse {
        total: accounts.len(),
        alive: accounts.len() - dead,
        dead,
        checked_out: pool.active_count(),
        accounts: accounts
            .iter()
            .map(|a| AccountStatusInfo::new(a, now, pool.is_checked_out(&a.username)))
            .collect(),
    })
    .into_response()
}

/// `POST /api/accounts/refresh`: refresh every alive account now.
pub async fn refresh_accounts(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    match s.refresh.run(RefreshScope::All).await {
        Ok(report) => {
            tracing::info!(refreshed = report.refreshed, died = report.died, "manual refresh done");
            Json(RefreshResponse { ok: true, report }).into_response()
        }
        Err(e) => {
            tracing::warn!(err = %e, "manual refresh failed");
            RelayError::Internal.to_http_response(format!("{e:#}")).into_response()
        }
    }
}

/// `GET /api/poi-types`: POI type codes (hex) to display names.
pub async fn poi_types() -> impl IntoResponse {
    let types: BTreeMap<String, &'static str> =
        POI_TYPE_NAMES.iter().map(|(code, name)| (format!("0x{code:06x}"), *name)).collect();
    Json(types)
}

// -- Operator auth ------------------------------------------------------------

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, Response> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RelayError::BadRequest.to_http_response(format!("{what} required")).into_response()),
    }
}

fn upstream_failure(what: &str, e: UpstreamError) -> Response {
    tracing::warn!(err = %e, "{what} failed");
    RelayError::UpstreamError.to_http_response(e.to_string()).into_response()
}

fn internal(e: anyhow::Error) -> Response {
    tracing::warn!(err = %e, "account store error");
    RelayError::Internal.to_http_response(format!("{e:#}")).into_response()
}

async fn operator_account(s: &RelayState) -> anyhow::Result<Option<Account>> {
    let Some(username) = s.operator.read().await.clone() else {
        return Ok(None);
    };
    with_store(s.manager.pool().store(), move |store| {
        Ok(store.list()?.into_iter().find(|a| a.username == username))
    })
    .await
}

/// `GET /api/auth/status`: the operator login and the live session count.
pub async fn auth_status(State(s): State<Arc<RelayState>>) -> Response {
    let account = match operator_account(&s).await {
        Ok(a) => a,
        Err(e) => return internal(e),
    };
    let now = epoch_ms();
    Json(AuthStatusResponse {
        authenticated: account.as_ref().is_some_and(Account::is_alive),
        username: account.as_ref().map(|a| a.username.clone()),
        app_installation_id: account.as_ref().map(|a| a.app_installation_id.clone()),
        token_age_min: account.as_ref().map(|a| AccountStatusInfo::new(a, now, false).age_min),
        token_expires_in: account.as_ref().map(|a| a.tokens.expires_in),
        active_sessions: s.manager.session_count().await,
    })
    .into_response()
}

/// `POST /api/auth/request-otp`: have the provider mail a one-time code.
pub async fn request_otp(
    State(s): State<Arc<RelayState>>,
    Json(req): Json<OtpRequest>,
) -> Response {
    let username = match required(&req.username, "username") {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match s.auth.request_verification_code(username).await {
        Ok(CodeRequest::Sent) => Json(AuthResponse { ok: true, ..Default::default() }).into_response(),
        Ok(CodeRequest::UserNotFound) => Json(AuthResponse {
            ok: false,
            user_not_found: true,
            message: Some("Account not found. Register first.".to_owned()),
            ..Default::default()
        })
        .into_response(),
        Err(e) => upstream_failure("code request", e),
    }
}

/// `POST /api/auth/register`: register an email with the provider.
pub async fn register(
    State(s): State<Arc<RelayState>>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    let email = match required(&req.email, "email") {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let mut profile = Profile::default();
    for (field, value) in [
        (&mut profile.first_name, req.first_name),
        (&mut profile.last_name, req.last_name),
        (&mut profile.country, req.country),
        (&mut profile.language, req.language),
    ] {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            *field = v;
        }
    }
    match s.auth.register_user(email, &profile).await {
        Ok(()) => {
            tracing::info!(email, "operator registered an account");
            Json(AuthResponse { ok: true, ..Default::default() }).into_response()
        }
        Err(e) => upstream_failure("registration", e),
    }
}

/// Outcome of folding a new token set into the store.
enum Upsert {
    Updated,
    Added,
    Dead,
}

/// `POST /api/auth/login`: password (or mailed code) grant. The account is
/// added to the store, or its tokens replaced when it is already known.
pub async fn login(State(s): State<Arc<RelayState>>, Json(req): Json<LoginRequest>) -> Response {
    const MISSING: &str = "username and password";
    let (username, password) = match (required(&req.username, MISSING), required(&req.password, MISSING)) {
        (Ok(u), Ok(p)) => (u.to_owned(), p),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    let tokens = match s.auth.request_access_token(&username, password).await {
        Ok(t) => t,
        Err(e) => return upstream_failure("login", e),
    };
    let expires_in = tokens.expires_in;

    let name = username.clone();
    let upserted = with_store(s.manager.pool().store(), move |store| {
        let now = epoch_ms();
        let mut outcome = Upsert::Added;
        store.update(&mut |accounts| {
            if let Some(existing) = accounts.iter_mut().find(|a| a.username == name) {
                if existing.dead {
                    outcome = Upsert::Dead;
                } else {
                    existing.refreshed(tokens.clone(), now);
                    outcome = Upsert::Updated;
                }
                return;
            }
            accounts.push(Account {
                username: name.clone(),
                app_installation_id: uuid::Uuid::new_v4().to_string(),
                tokens: tokens.clone(),
                obtained_at: now,
                dead: false,
                dead_reason: None,
                dead_at: None,
            });
            outcome = Upsert::Added;
        })?;
        Ok(outcome)
    })
    .await;

    match upserted {
        Ok(Upsert::Dead) => {
            return RelayError::BadRequest
                .to_http_response(format!("account {username} is dead"))
                .into_response();
        }
        Ok(Upsert::Added) => tracing::info!(account = %username, "operator login added account"),
        Ok(Upsert::Updated) => tracing::info!(account = %username, "operator login replaced tokens"),
        Err(e) => return internal(e),
    }

    *s.operator.write().await = Some(username);
    Json(AuthResponse { ok: true, expires_in: Some(expires_in), ..Default::default() }).into_response()
}

/// `POST /api/auth/refresh`: refresh the operator account's tokens now.
pub async fn refresh_operator(State(s): State<Arc<RelayState>>) -> Response {
    let account = match operator_account(&s).await {
        Ok(Some(a)) if a.is_alive() => a,
        Ok(_) => return RelayError::BadRequest.to_http_response("no operator login").into_response(),
        Err(e) => return internal(e),
    };

    let tokens = match s.auth.refresh_access_token(&account.tokens.refresh_token).await {
        Ok(t) => t,
        Err(e) => return upstream_failure("operator refresh", e),
    };
    let expires_in = tokens.expires_in;

    let name = account.username;
    let written = with_store(s.manager.pool().store(), move |store| {
        let now = epoch_ms();
        store.update(&mut |accounts| {
            if let Some(existing) = accounts.iter_mut().find(|a| a.username == name && a.is_alive()) {
                existing.refreshed(tokens.clone(), now);
            }
        })
    })
    .await;
    if let Err(e) = written {
        return internal(e);
    }
    Json(AuthResponse { ok: true, expires_in: Some(expires_in), ..Default::default() }).into_response()
}

/// `POST /api/auth/logout`: forget the operator login. The account stays in
/// the pool.
pub async fn logout(State(s): State<Arc<RelayState>>) -> Response {
    if let Some(username) = s.operator.write().await.take() {
        tracing::info!(account = %username, "operator logged out");
    }
    Json(AuthResponse { ok: true, ..Default::default() }).into_response()
}
