// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the relay.

pub mod http;
pub mod message;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::health))
        // Account pool
        .route("/api/accounts", get(http::accounts))
        .route("/api/accounts/refresh", post(http::refresh_accounts))
        // Operator auth
        .route("/api/auth/status", get(http::auth_status))
        .route("/api/auth/request-otp", post(http::request_otp))
        .route("/api/auth/register", post(http::register))
        .route("/api/auth/login", post(http::login))
        .route("/api/auth/refresh", post(http::refresh_operator))
        .route("/api/auth/logout", post(http::logout))
        // Reference data
        .route("/api/poi-types", get(http::poi_types))
        // Per-session trip relay
        .route("/ws/pois", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
