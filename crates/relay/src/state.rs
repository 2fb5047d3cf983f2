// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::account::refresh::RefreshCycle;
use crate::auth::AuthClient;
use crate::session::manager::SessionManager;

/// Shared relay state handed to every handler.
pub struct RelayState {
    pub manager: Arc<SessionManager>,
    pub refresh: Arc<RefreshCycle>,
    pub auth: Arc<AuthClient>,
    /// Username of the account last signed in through `/api/auth/login`.
    /// The account itself lives in the store like any other.
    pub operator: RwLock<Option<String>>,
    /// Period of the health ping on each session's error channel.
    pub health_ping: Duration,
    pub shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(
        manager: Arc<SessionManager>,
        refresh: Arc<RefreshCycle>,
        auth: Arc<AuthClient>,
        health_ping: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self { manager, refresh, auth, operator: RwLock::new(None), health_ping, shutdown }
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
