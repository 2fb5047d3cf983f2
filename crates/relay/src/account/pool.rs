// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account pool: exclusive checkout of accounts read fresh from the store.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::account::{Account, AccountStore};
use crate::error::PoolError;

/// Mints a brand-new account when the pool runs dry.
///
/// The returned account is not yet persisted; the pool claims it and then
/// appends it to the store, so no other checkout can see it unclaimed.
#[async_trait::async_trait]
pub trait Registrar: Send + Sync + 'static {
    async fn register(&self) -> anyhow::Result<Account>;
}

/// Checkout registry over the accounts in an [`AccountStore`].
///
/// The pool keeps no copy of account data. Every checkout re-reads the
/// store so a dead flag written by a concurrent refresh is honored at once.
/// The checked-out set is the only shared mutable state between sessions.
pub struct AccountPool {
    store: Arc<dyn AccountStore>,
    registrar: Option<Arc<dyn Registrar>>,
    checked_out: Mutex<HashSet<String>>,
}

impl AccountPool {
    pub fn new(store: Arc<dyn AccountStore>, registrar: Option<Arc<dyn Registrar>>) -> Self {
        Self { store, registrar, checked_out: Mutex::new(HashSet::new()) }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub fn can_register(&self) -> bool {
        self.registrar.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set holds plain strings; a panic mid-insert cannot leave it torn.
        self.checked_out.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the first alive account nobody holds.
    ///
    /// The store scan and the mark happen under one lock, so two concurrent
    /// callers can never both win the same account.
    pub fn checkout(&self) -> Option<Account> {
        let mut checked_out = self.lock();
        let accounts = match self.store.list() {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(err = %e, "account store unreadable, treating pool as empty");
                return None;
            }
        };
        let account = accounts
            .into_iter()
            .find(|a| a.is_alive() && !checked_out.contains(&a.username))?;
        checked_out.insert(account.username.clone());
        tracing::debug!(account = %account.username, active = checked_out.len(), "account checked out");
        Some(account)
    }

    /// [`checkout`](Self::checkout) on the blocking pool, keeping store IO off
    /// async worker threads.
    pub async fn checkout_blocking(self: &Arc<Self>) -> Option<Account> {
        let pool = Arc::clone(self);
        match tokio::task::spawn_blocking(move || pool.checkout()).await {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!(err = %e, "checkout task failed");
                None
            }
        }
    }

    /// Like [`checkout`](Self::checkout), falling back to registration.
    pub async fn checkout_or_register(self: &Arc<Self>) -> Result<Account, PoolError> {
        if let Some(account) = self.checkout_blocking().await {
            return Ok(account);
        }

        let Some(ref registrar) = self.registrar else {
            return Err(PoolError::NoAccountsAvailable);
        };

        tracing::info!("no accounts available, registering a new one");
        let account = registrar.register().await.map_err(PoolError::Registration)?;

        let pool = Arc::clone(self);
        match tokio::task::spawn_blocking(move || pool.admit(account)).await {
            Ok(admitted) => admitted.map_err(PoolError::Registration),
            Err(e) => Err(PoolError::Registration(anyhow::anyhow!("admission task failed: {e}"))),
        }
    }

    /// Claim a freshly minted account and persist it.
    ///
    /// Both steps happen under the checkout lock, so by the time the account
    /// is visible in the store it is already held.
    fn admit(&self, account: Account) -> anyhow::Result<Account> {
        let mut checked_out = self.lock();
        if !checked_out.insert(account.username.clone()) {
            anyhow::bail!("registered account {} is already checked out", account.username);
        }
        if let Err(e) = self.store.append(&account) {
            checked_out.remove(&account.username);
            return Err(e.context("persisting registered account"));
        }
        tracing::info!(account = %account.username, active = checked_out.len(), "registered account checked out");
        Ok(account)
    }

    /// Return an account to the pool. Releasing an idle account is a no-op.
    pub fn release(&self, username: &str) {
        if self.lock().remove(username) {
            tracing::debug!(account = %username, "account released");
        }
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_checked_out(&self, username: &str) -> bool {
        self.lock().contains(username)
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
