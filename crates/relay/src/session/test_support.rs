// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording fakes for the upstream seam.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::UpstreamError;
use crate::upstream::poi::TileContents;
use crate::upstream::{
    LocationFix, TripClient, TripClientFactory, UpstreamEvent, UpstreamHandle,
    EVENT_CHANNEL_CAPACITY,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    StartTrip { trip_id: String, fix: LocationFix },
    LocationUpdate { trip_id: String, fix: LocationFix },
    StopTrip,
    FetchTile(String),
    Close,
}

/// Trip client that records every call and answers tiles from a table.
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<(Call, Instant)>>,
    tiles: HashMap<String, TileContents>,
    failing_tiles: HashSet<String>,
}

impl RecordingClient {
    pub fn with_tiles(tiles: Vec<(&str, TileContents)>, failing: &[&str]) -> Self {
        Self {
            calls: Mutex::new(vec![]),
            tiles: tiles.into_iter().map(|(id, t)| (id.to_owned(), t)).collect(),
            failing_tiles: failing.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((call, Instant::now()));
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.iter().map(|(call, _)| call.clone()).collect()).unwrap_or_default()
    }

    pub fn timed_calls(&self) -> Vec<(Call, Instant)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn location_updates(&self) -> usize {
        self.count(|c| matches!(c, Call::LocationUpdate { .. }))
    }

    pub fn stop_trips(&self) -> usize {
        self.count(|c| matches!(c, Call::StopTrip))
    }
}

#[async_trait::async_trait]
impl TripClient for RecordingClient {
    async fn start_trip(&self, trip_id: &str, fix: LocationFix) -> Result<(), UpstreamError> {
        self.record(Call::StartTrip { trip_id: trip_id.to_owned(), fix });
        Ok(())
    }

    async fn send_location_update(
        &self,
        trip_id: &str,
        fix: LocationFix,
    ) -> Result<(), UpstreamError> {
        self.record(Call::LocationUpdate { trip_id: trip_id.to_owned(), fix });
        Ok(())
    }

    async fn stop_trip(&self) {
        self.record(Call::StopTrip);
    }

    async fn fetch_tile(&self, tile_id: &str) -> Result<TileContents, UpstreamError> {
        self.record(Call::FetchTile(tile_id.to_owned()));
        if self.failing_tiles.contains(tile_id) {
            return Err(UpstreamError::new(Some(503), format!("tile {tile_id} unavailable")));
        }
        Ok(self.tiles.get(tile_id).cloned().unwrap_or_default())
    }

    async fn close(&self) {
        self.record(Call::Close);
    }
}

/// A recording client plus the sender feeding its event channel.
pub fn recording_handle(client: RecordingClient) -> (Arc<RecordingClient>, mpsc::Sender<UpstreamEvent>, UpstreamHandle) {
    let client = Arc::new(client);
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let handle = UpstreamHandle { client: Arc::clone(&client) as Arc<dyn TripClient>, events: rx };
    (client, tx, handle)
}

/// Factory handing out a fresh [`RecordingClient`] per connection.
#[derive(Default)]
pub struct RecordingFactory {
    connected: Mutex<Vec<(String, Arc<RecordingClient>, mpsc::Sender<UpstreamEvent>)>>,
}

impl RecordingFactory {
    /// `(access_token, client)` per connection, in connection order.
    pub fn clients(&self) -> Vec<(String, Arc<RecordingClient>)> {
        self.connected
            .lock()
            .map(|c| c.iter().map(|(t, client, _)| (t.clone(), Arc::clone(client))).collect())
            .unwrap_or_default()
    }

    pub fn event_sender(&self, index: usize) -> Option<mpsc::Sender<UpstreamEvent>> {
        self.connected.lock().ok()?.get(index).map(|(_, _, tx)| tx.clone())
    }
}

impl TripClientFactory for RecordingFactory {
    fn connect(&self, access_token: &str, _app_installation_id: &str) -> UpstreamHandle {
        let (client, tx, handle) = recording_handle(RecordingClient::default());
        if let Ok(mut connected) = self.connected.lock() {
            connected.push((access_token.to_owned(), client, tx));
        }
        handle
    }
}
