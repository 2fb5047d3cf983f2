// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream trip service: the client seam sessions drive, and the events it
//! pushes back.
//!
//! Each session gets its own [`UpstreamHandle`] with a private event channel,
//! so events from one account's stream can never reach another session.

pub mod gateway;
pub mod poi;
pub mod proto;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::UpstreamError;
use crate::upstream::poi::{PoiUpdate, TileContents};

/// Capacity of a handle's event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Location sample in the upstream's native units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters per second.
    pub speed_ms: f64,
    pub heading_deg: f64,
}

/// Asynchronous events pushed by an upstream trip stream.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    PoiUpdate(PoiUpdate),
    TileVersionChanged { id: String, version: u64 },
    Error(String),
}

/// Operations on one account's upstream trip stream and tile service.
#[async_trait::async_trait]
pub trait TripClient: Send + Sync + 'static {
    /// Open the bidirectional trip stream and send the first location.
    async fn start_trip(&self, trip_id: &str, fix: LocationFix) -> Result<(), UpstreamError>;

    /// Send one location sample on the open trip stream.
    async fn send_location_update(
        &self,
        trip_id: &str,
        fix: LocationFix,
    ) -> Result<(), UpstreamError>;

    /// Half-close the trip stream. No-op when none is open.
    async fn stop_trip(&self);

    /// Fetch the contents of one map tile.
    async fn fetch_tile(&self, tile_id: &str) -> Result<TileContents, UpstreamError>;

    /// Release every upstream resource held by this client.
    async fn close(&self);
}

/// A client plus the receiving end of its event channel.
pub struct UpstreamHandle {
    pub client: Arc<dyn TripClient>,
    pub events: mpsc::Receiver<UpstreamEvent>,
}

/// Builds one upstream handle per session from an account's credentials.
pub trait TripClientFactory: Send + Sync + 'static {
    fn connect(&self, access_token: &str, app_installation_id: &str) -> UpstreamHandle;
}
