// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential refresh: Fresh → NearExpiry → (Fresh | Dead).
//!
//! A refresh rejected with a client-class status kills the account for good.
//! Server errors and transport failures leave it untouched for the next cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::account::{with_store, Account, AccountStore, TokenSet};
use crate::error::UpstreamError;
use crate::state::epoch_ms;

/// How long before expiry an account counts as near-expiry.
pub const NEAR_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where an account sits in its credential lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Fresh,
    NearExpiry,
    Dead,
}

/// Classify an account at `now_ms`.
pub fn credential_state(account: &Account, now_ms: u64) -> CredentialState {
    if account.dead {
        return CredentialState::Dead;
    }
    let margin = NEAR_EXPIRY_MARGIN.as_millis() as u64;
    if now_ms.saturating_add(margin) >= account.expires_at_ms() {
        CredentialState::NearExpiry
    } else {
        CredentialState::Fresh
    }
}

/// Exchanges a refresh token for a new token set.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync + 'static {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, UpstreamError>;
}

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(TokenSet),
    /// Definitive rejection; the account must be marked dead.
    Rejected(String),
    /// Transient failure; try again next cycle.
    Retry(String),
}

impl From<Result<TokenSet, UpstreamError>> for RefreshOutcome {
    fn from(result: Result<TokenSet, UpstreamError>) -> Self {
        match result {
            Ok(tokens) => Self::Refreshed(tokens),
            Err(e) if e.is_rejection() => Self::Rejected(e.to_string()),
            Err(e) => Self::Retry(e.to_string()),
        }
    }
}

/// Aggregate result of a refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub refreshed: u32,
    pub died: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
}

/// Which accounts a cycle should attempt.
#[derive(Debug, Clone, Copy)]
pub enum RefreshScope {
    /// Every alive account.
    All,
    /// Alive accounts that reach near-expiry within the given horizon.
    DueWithin(Duration),
}

/// Runs refresh cycles against a store. Cycles never overlap.
pub struct RefreshCycle {
    store: Arc<dyn AccountStore>,
    refresher: Arc<dyn TokenRefresher>,
    running: Mutex<()>,
}

impl RefreshCycle {
    pub fn new(store: Arc<dyn AccountStore>, refresher: Arc<dyn TokenRefresher>) -> Arc<Self> {
        Arc::new(Self { store, refresher, running: Mutex::new(()) })
    }

    /// Refresh the accounts in `scope` and write the results back in one
    /// store update.
    ///
    /// Failures are contained per account and reported in the aggregate.
    /// Only records this cycle changed are written; accounts appended while
    /// it ran are left as they are.
    pub async fn run(&self, scope: RefreshScope) -> anyhow::Result<RefreshReport> {
        let _cycle = self.running.lock().await;
        let accounts = with_store(&self.store, |store| store.list()).await?;
        let mut report = RefreshReport::default();
        let mut changed: HashMap<String, Account> = HashMap::new();

        for mut account in accounts {
            if account.dead || !is_due(&account, scope, epoch_ms()) {
                report.skipped += 1;
                continue;
            }

            let result = self.refresher.refresh(&account.tokens.refresh_token).await;
            match RefreshOutcome::from(result) {
                RefreshOutcome::Refreshed(tokens) => {
                    account.refreshed(tokens, epoch_ms());
                    report.refreshed += 1;
                    tracing::info!(account = %account.username, "credentials refreshed");
                }
                RefreshOutcome::Rejected(reason) => {
                    tracing::info!(account = %account.username, err = %reason, "refresh rejected, marking account dead");
                    account.mark_dead(reason, epoch_ms());
                    report.died += 1;
                }
                RefreshOutcome::Retry(reason) => {
                    tracing::warn!(account = %account.username, err = %reason, "refresh failed, will retry next cycle");
                    report.errors.push(format!("{}: {reason}", account.username));
                    report.skipped += 1;
                    continue;
                }
            }
            changed.insert(account.username.clone(), account);
        }

        if !changed.is_empty() {
            with_store(&self.store, move |store| {
                store.update(&mut |current| {
                    for record in current.iter_mut() {
                        if let Some(updated) = changed.get(&record.username) {
                            *record = updated.clone();
                        }
                    }
                })
            })
            .await?;
        }
        Ok(report)
    }

    /// Spawn the periodic refresh task. The first cycle runs immediately.
    pub fn spawn_loop(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let cycle = Arc::clone(self);
        tracing::info!(interval_secs = interval.as_secs(), "credential refresh loop started");
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = timer.tick() => {}
                }

                let alive = match with_store(&cycle.store, |store| store.list()).await {
                    Ok(accounts) => accounts.iter().filter(|a| a.is_alive()).count(),
                    Err(e) => {
                        tracing::warn!(err = %e, "account store unreadable, skipping refresh cycle");
                        continue;
                    }
                };
                if alive == 0 {
                    continue;
                }

                tracing::debug!(alive, "running credential refresh cycle");
                match cycle.run(RefreshScope::DueWithin(interval)).await {
                    Ok(report) => tracing::info!(
                        refreshed = report.refreshed,
                        died = report.died,
                        skipped = report.skipped,
                        "credential refresh cycle done"
                    ),
                    Err(e) => tracing::warn!(err = %e, "credential refresh cycle failed"),
                }
            }
        })
    }
}

fn is_due(account: &Account, scope: RefreshScope, now_ms: u64) -> bool {
    match scope {
        RefreshScope::All => true,
        RefreshScope::DueWithin(horizon) => {
            let at = now_ms.saturating_add(horizon.as_millis() as u64);
            credential_state(account, at) == CredentialState::NearExpiry
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
