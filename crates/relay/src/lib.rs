// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Poirelay: per-client POI trip relay over a shared pool of upstream accounts.

pub mod account;
pub mod auth;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod transport;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::account::pool::{AccountPool, Registrar};
use crate::account::refresh::{RefreshCycle, TokenRefresher};
use crate::account::store::JsonlStore;
use crate::account::AccountStore;
use crate::auth::mail::MailClient;
use crate::auth::register::AutoRegistrar;
use crate::auth::AuthClient;
use crate::config::RelayConfig;
use crate::session::manager::SessionManager;
use crate::state::RelayState;
use crate::transport::build_router;
use crate::upstream::gateway::GatewayFactory;
use crate::upstream::TripClientFactory;

/// Install the process-wide rustls crypto provider. Idempotent.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Run the relay server until shutdown.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    install_crypto_provider();

    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let accounts_path = config.accounts_path();
    let store: Arc<dyn AccountStore> = Arc::new(JsonlStore::new(&accounts_path));
    let auth = Arc::new(AuthClient::new(&config.auth_url, &config.client_id));

    let registrar: Option<Arc<dyn Registrar>> = if config.no_auto_register {
        None
    } else {
        let mail = MailClient::new(&config.mail_api_url)?;
        Some(Arc::new(AutoRegistrar::new(Arc::clone(&auth), mail, config.otp_timeout())))
    };

    let pool = Arc::new(AccountPool::new(Arc::clone(&store), registrar));
    let factory: Arc<dyn TripClientFactory> =
        Arc::new(GatewayFactory::new(&config.gateway_url, config.gateway_timeout())?);
    let manager = Arc::new(SessionManager::new(pool, factory, config.session_timing()));

    let refresh = RefreshCycle::new(Arc::clone(&store), Arc::clone(&auth) as Arc<dyn TokenRefresher>);
    let refresh_task = refresh.spawn_loop(config.refresh_interval(), shutdown.child_token());

    match store.list() {
        Ok(accounts) => {
            let dead = accounts.iter().filter(|a| a.dead).count();
            tracing::info!(
                path = %accounts_path.display(),
                alive = accounts.len() - dead,
                dead,
                auto_register = !config.no_auto_register,
                "account store loaded"
            );
        }
        Err(e) => tracing::warn!(path = %accounts_path.display(), err = %e, "account store unreadable"),
    }

    let state = Arc::new(RelayState::new(
        Arc::clone(&manager),
        refresh,
        auth,
        config.health_ping_interval(),
        shutdown.clone(),
    ));
    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("poirelay listening on {addr} (ws: /ws/pois)");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            signal_token.cancel();
        }
    });

    axum::serve(listener, router).with_graceful_shutdown(shutdown.clone().cancelled_owned()).await?;

    shutdown.cancel();
    manager.shutdown().await;
    let _ = refresh_task.await;
    Ok(())
}
