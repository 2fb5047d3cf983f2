// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON messages exchanged on the per-session WebSocket.

use serde::{Deserialize, Serialize};

use crate::upstream::poi::{PoiUpdate, StaticPoi};

/// Pushed from the relay to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "session:ready", rename_all = "camelCase")]
    SessionReady { session_id: String },
    #[serde(rename = "session:error")]
    SessionError { message: String },
    #[serde(rename = "trip:started", rename_all = "camelCase")]
    TripStarted { trip_uuid: String },
    #[serde(rename = "trip:stopped")]
    TripStopped,
    #[serde(rename = "poi_update")]
    PoiUpdate { poi: PoiUpdate, timestamp: u64 },
    #[serde(rename = "poi_batch")]
    PoiBatch { pois: Vec<StaticPoi>, timestamp: u64 },
    #[serde(rename = "backend_error")]
    BackendError { source: String, message: String, timestamp: u64 },
}

impl ServerMessage {
    pub fn backend_error(source: &str, message: impl Into<String>) -> Self {
        Self::BackendError {
            source: source.to_owned(),
            message: message.into(),
            timestamp: crate::state::epoch_ms(),
        }
    }
}

/// Sent by a client to drive its session's trip.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "trip:start")]
    TripStart(TripPosition),
    #[serde(rename = "trip:move")]
    TripMove(TripPosition),
    #[serde(rename = "trip:stop")]
    TripStop,
    #[serde(other)]
    Unknown,
}

/// Position fields shared by `trip:start` and `trip:move`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPosition {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub heading: Option<f64>,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
