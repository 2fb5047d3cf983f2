// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream identities: the persisted account record, the store it lives in,
//! the checkout pool over it, and the refresh cycle that keeps it usable.
//!
//! Accounts are never deleted. A failed refresh with a definitive rejection
//! marks the account dead, and dead is terminal.

pub mod pool;
pub mod refresh;
pub mod store;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Token set issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub id_token: String,
    /// Declared lifetime in seconds, counted from `Account::obtained_at`.
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

/// One upstream identity plus its liveness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub username: String,
    pub app_installation_id: String,
    pub tokens: TokenSet,
    /// Epoch millis at which `tokens` were issued.
    pub obtained_at: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dead: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_at: Option<u64>,
}

impl Account {
    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Epoch millis at which the access token stops being valid.
    pub fn expires_at_ms(&self) -> u64 {
        self.obtained_at.saturating_add(self.tokens.expires_in.saturating_mul(1000))
    }

    /// Install a freshly issued token set.
    pub fn refreshed(&mut self, tokens: TokenSet, now_ms: u64) {
        self.tokens = tokens;
        self.obtained_at = now_ms;
    }

    /// Terminal transition. A dead account keeps its first recorded reason.
    pub fn mark_dead(&mut self, reason: impl Into<String>, now_ms: u64) {
        if self.dead {
            return;
        }
        self.dead = true;
        self.dead_reason = Some(reason.into());
        self.dead_at = Some(now_ms);
    }
}

/// Per-account row in the accounts listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatusInfo {
    pub username: String,
    pub app_installation_id: String,
    pub obtained_at: u64,
    pub age_min: u64,
    pub dead: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_at: Option<u64>,
    pub in_use: bool,
}

impl AccountStatusInfo {
    pub fn new(account: &Account, now_ms: u64, in_use: bool) -> Self {
        let age_ms = now_ms.saturating_sub(account.obtained_at);
        Self {
            username: account.username.clone(),
            app_installation_id: account.app_installation_id.clone(),
            obtained_at: account.obtained_at,
            age_min: (age_ms + 30_000) / 60_000,
            dead: account.dead,
            dead_reason: account.dead_reason.clone(),
            dead_at: account.dead_at,
            in_use,
        }
    }
}

/// Durable record of known accounts.
///
/// Readers always see either the state before or after a rewrite, never a
/// partial write. Calls are synchronous and may touch the filesystem, so
/// async callers go through the blocking pool (see [`with_store`] and
/// [`AccountPool::checkout_blocking`](pool::AccountPool::checkout_blocking)).
pub trait AccountStore: Send + Sync + 'static {
    /// All known accounts, dead ones included, in insertion order.
    fn list(&self) -> anyhow::Result<Vec<Account>>;

    /// Add one account at the end of the store.
    fn append(&self, account: &Account) -> anyhow::Result<()>;

    /// Atomically replace the whole store.
    fn replace_all(&self, accounts: &[Account]) -> anyhow::Result<()>;

    /// Read, modify and rewrite the store as one step. No `append` or other
    /// `update` can land between the read and the rewrite.
    fn update(&self, apply: &mut dyn FnMut(&mut Vec<Account>)) -> anyhow::Result<()>;
}

/// Run a store call on the blocking pool.
pub async fn with_store<T, F>(store: &Arc<dyn AccountStore>, call: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn AccountStore) -> anyhow::Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || call(store.as_ref())).await?
}
