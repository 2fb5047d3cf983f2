// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: maps client connections to sessions and guarantees the
//! bound account is released on teardown.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::account::pool::AccountPool;
use crate::error::PoolError;
use crate::session::{Session, SessionTiming};
use crate::transport::message::ServerMessage;
use crate::upstream::TripClientFactory;

pub struct SessionManager {
    pool: Arc<AccountPool>,
    factory: Arc<dyn TripClientFactory>,
    timing: SessionTiming,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(
        pool: Arc<AccountPool>,
        factory: Arc<dyn TripClientFactory>,
        timing: SessionTiming,
    ) -> Self {
        Self { pool, factory, timing, sessions: RwLock::new(HashMap::new()) }
    }

    pub fn pool(&self) -> &Arc<AccountPool> {
        &self.pool
    }

    /// Bind a new session to `outbound`.
    ///
    /// `Ok(None)` means no capacity right now. A failed registration attempt
    /// is returned as an error so the caller can report it.
    pub async fn create(
        &self,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Result<Option<Arc<Session>>, PoolError> {
        let account = if self.pool.can_register() {
            match self.pool.checkout_or_register().await {
                Ok(account) => Some(account),
                Err(PoolError::NoAccountsAvailable) => None,
                Err(e) => return Err(e),
            }
        } else {
            self.pool.checkout_blocking().await
        };
        let Some(account) = account else {
            tracing::info!("no account available for new session");
            return Ok(None);
        };

        let upstream =
            self.factory.connect(&account.tokens.access_token, &account.app_installation_id);
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(session_id = %id, account = %account.username, "session created");

        let session = Session::start(id.clone(), account, upstream, outbound, self.timing);
        self.sessions.write().await.insert(id, Arc::clone(&session));
        Ok(Some(session))
    }

    /// Tear a session down and release its account. Unknown ids are a no-op.
    ///
    /// The entry is claimed out of the table first so concurrent destroys of
    /// the same id cannot release an account twice. Upstream cleanup finishes
    /// before the account becomes available to other sessions.
    pub async fn destroy(&self, session_id: &str) -> bool {
        let Some(session) = self.sessions.write().await.remove(session_id) else {
            return false;
        };
        session.cleanup().await;
        self.pool.release(&session.account().username);
        tracing::info!(session_id = %session_id, account = %session.account().username, "session destroyed");
        true
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Destroy every live session.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        for id in ids {
            self.destroy(&id).await;
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
