// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity provider client: token grants, user registration, and
//! verification-code requests.
//!
//! Every non-2xx answer becomes an [`UpstreamError`] carrying its status, so
//! callers classify failures by status code rather than by message text.

pub mod mail;
pub mod register;

use std::time::Duration;

use reqwest::Client;

use crate::account::refresh::TokenRefresher;
use crate::account::TokenSet;
use crate::error::UpstreamError;

/// Scope requested on every password grant.
pub const TOKEN_SCOPE: &str =
    "openid profile email app_gateway app_features activation_codes offline_access";

/// Profile fields sent with a registration.
#[derive(Debug, Clone)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub country: String,
    pub language: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            first_name: "Alex".to_owned(),
            last_name: "Driver".to_owned(),
            country: "SE".to_owned(),
            language: "en".to_owned(),
        }
    }
}

/// Result of asking the provider to mail a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRequest {
    Sent,
    UserNotFound,
}

pub struct AuthClient {
    base_url: String,
    client_id: String,
    http: Client,
}

impl AuthClient {
    pub fn new(base_url: &str, client_id: &str) -> Self {
        let http = Client::builder().timeout(Duration::from_secs(30)).build().unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_owned(), client_id: client_id.to_owned(), http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn token_grant(&self, form: &[(&str, &str)], what: &str) -> Result<TokenSet, UpstreamError> {
        let resp = self.http.post(self.url("/connect/token")).form(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::new(Some(status.as_u16()), format!("{what} failed ({status}): {text}")));
        }
        Ok(resp.json().await?)
    }

    /// Password grant. Registration flows pass the mailed one-time code as
    /// the password.
    pub async fn request_access_token(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenSet, UpstreamError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("scope", TOKEN_SCOPE),
            ("UserName", username),
            ("Password", password),
            ("grant_type", "password"),
        ];
        self.token_grant(&form, "token request").await
    }

    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet, UpstreamError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.token_grant(&form, "token refresh").await
    }

    /// Register a user. An already-registered email counts as success.
    pub async fn register_user(&self, email: &str, profile: &Profile) -> Result<(), UpstreamError> {
        let form = [
            ("Email", email),
            ("FirstName", profile.first_name.as_str()),
            ("LastName", profile.last_name.as_str()),
            ("EmailMarketingOptOut", "true"),
            ("Country", profile.country.as_str()),
            ("Language", profile.language.as_str()),
            ("client_id", self.client_id.as_str()),
        ];
        let resp = self
            .http
            .post(self.url("/api/NativeAccount/RegisterUserAsync"))
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        if text.contains("DuplicateEmail") || text.contains("duplicate") {
            tracing::debug!(email, "email already registered");
            return Ok(());
        }
        Err(UpstreamError::new(Some(status.as_u16()), format!("registration failed ({status}): {}", truncate(&text))))
    }

    /// Ask the provider to mail a one-time code to `username`.
    pub async fn request_verification_code(&self, username: &str) -> Result<CodeRequest, UpstreamError> {
        let form = [("UserName", username), ("client_id", self.client_id.as_str())];
        let resp = self
            .http
            .post(self.url("/api/NativeAccount/RequestVerificationCodeAsync"))
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(CodeRequest::Sent);
        }
        let text = resp.text().await.unwrap_or_default();
        if text.contains("user_not_found") {
            return Ok(CodeRequest::UserNotFound);
        }
        Err(UpstreamError::new(
            Some(status.as_u16()),
            format!("verification code request failed ({status}): {}", truncate(&text)),
        ))
    }
}

#[async_trait::async_trait]
impl TokenRefresher for AuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, UpstreamError> {
        self.refresh_access_token(refresh_token).await
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
