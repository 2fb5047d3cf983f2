// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One client's live binding to one account's upstream trip stream.
//!
//! A session owns its upstream handle outright. Upstream events arrive on the
//! handle's private channel and are pumped into this session's outbound queue
//! only, so nothing one account's stream emits can reach another client.

pub mod manager;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::account::Account;
use crate::error::UpstreamError;
use crate::state::epoch_ms;
use crate::transport::message::{ClientMessage, ServerMessage, TripPosition};
use crate::upstream::{LocationFix, TripClient, UpstreamEvent, UpstreamHandle};

/// Timers governing a session's upstream traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Period of the keep-alive location re-send while a trip is active.
    pub location_interval: Duration,
    /// Delay between consecutive tile fetches.
    pub tile_pacing: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self { location_interval: Duration::from_secs(60), tile_pacing: Duration::from_millis(200) }
    }
}

fn kmh_to_ms(kmh: f64) -> f64 {
    kmh / 3.6
}

/// Trip bookkeeping. `active` is `Some` exactly while a ticker is scheduled.
struct TripState {
    fix: LocationFix,
    active: Option<ActiveTrip>,
}

struct ActiveTrip {
    trip_id: String,
    fix_tx: watch::Sender<LocationFix>,
    cancel: CancellationToken,
    ticker: JoinHandle<()>,
}

#[derive(Default)]
struct TileQueue {
    pending: VecDeque<String>,
    busy: bool,
}

pub struct Session {
    id: String,
    account: Account,
    client: Arc<dyn TripClient>,
    outbound: mpsc::Sender<ServerMessage>,
    timing: SessionTiming,
    trip: Mutex<TripState>,
    tiles: StdMutex<TileQueue>,
    cancel: CancellationToken,
    cleaned_up: AtomicBool,
}

impl Session {
    /// Bind `account` and its upstream handle to an outbound queue, and start
    /// pumping upstream events into it.
    pub fn start(
        id: String,
        account: Account,
        upstream: UpstreamHandle,
        outbound: mpsc::Sender<ServerMessage>,
        timing: SessionTiming,
    ) -> Arc<Self> {
        let UpstreamHandle { client, events } = upstream;
        let session = Arc::new(Self {
            id,
            account,
            client,
            outbound,
            timing,
            trip: Mutex::new(TripState {
                fix: LocationFix { latitude: 0.0, longitude: 0.0, speed_ms: 0.0, heading_deg: 0.0 },
                active: None,
            }),
            tiles: StdMutex::new(TileQueue::default()),
            cancel: CancellationToken::new(),
            cleaned_up: AtomicBool::new(false),
        });
        tokio::spawn(Arc::clone(&session).pump_events(events));
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up.load(Ordering::Acquire)
    }

    pub async fn trip_id(&self) -> Option<String> {
        self.trip.lock().await.active.as_ref().map(|t| t.trip_id.clone())
    }

    /// Best-effort outbound delivery. Dropped when the peer is gone or slow.
    pub fn send_message(&self, msg: ServerMessage) {
        if let Err(e) = self.outbound.try_send(msg) {
            tracing::debug!(session_id = %self.id, err = %e, "outbound message dropped");
        }
    }

    /// Start (or restart) a trip at the given position and return its id.
    pub async fn start_trip(
        &self,
        lat: f64,
        lng: f64,
        speed_kmh: f64,
        heading_deg: f64,
    ) -> Result<String, UpstreamError> {
        let mut trip = self.trip.lock().await;
        self.stop_active(&mut trip).await;
        if self.cancel.is_cancelled() {
            return Err(UpstreamError::transport("session closed"));
        }

        let fix = LocationFix {
            latitude: lat,
            longitude: lng,
            speed_ms: kmh_to_ms(speed_kmh),
            heading_deg,
        };
        trip.fix = fix;
        let trip_id = uuid::Uuid::new_v4().to_string();

        tokio::select! {
            _ = self.cancel.cancelled() => return Err(UpstreamError::transport("session closed")),
            res = self.client.start_trip(&trip_id, fix) => res?,
        }

        let (fix_tx, fix_rx) = watch::channel(fix);
        let cancel = self.cancel.child_token();
        let ticker = tokio::spawn(location_ticker(
            Arc::clone(&self.client),
            self.outbound.clone(),
            trip_id.clone(),
            fix_rx,
            self.timing.location_interval,
            cancel.clone(),
        ));
        trip.active = Some(ActiveTrip { trip_id: trip_id.clone(), fix_tx, cancel, ticker });
        tracing::info!(session_id = %self.id, trip_id = %trip_id, "trip started");
        Ok(trip_id)
    }

    /// Move the active trip and push one location update right away.
    ///
    /// No-op without an active trip. Omitted speed or heading keep their
    /// previous values.
    pub async fn move_trip(
        &self,
        lat: f64,
        lng: f64,
        speed_kmh: Option<f64>,
        heading_deg: Option<f64>,
    ) -> Result<(), UpstreamError> {
        let mut trip = self.trip.lock().await;
        if trip.active.is_none() || self.cancel.is_cancelled() {
            return Ok(());
        }

        trip.fix.latitude = lat;
        trip.fix.longitude = lng;
        if let Some(kmh) = speed_kmh {
            trip.fix.speed_ms = kmh_to_ms(kmh);
        }
        if let Some(heading) = heading_deg {
            trip.fix.heading_deg = heading;
        }

        let fix = trip.fix;
        let Some(ref active) = trip.active else {
            return Ok(());
        };
        active.fix_tx.send_replace(fix);
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(()),
            res = self.client.send_location_update(&active.trip_id, fix) => res,
        }
    }

    /// Stop the active trip. Returns whether one was running.
    pub async fn stop_trip(&self) -> bool {
        let mut trip = self.trip.lock().await;
        self.stop_active(&mut trip).await
    }

    async fn stop_active(&self, trip: &mut TripState) -> bool {
        let Some(active) = trip.active.take() else {
            return false;
        };
        active.cancel.cancel();
        if let Err(e) = active.ticker.await {
            tracing::debug!(session_id = %self.id, err = %e, "location ticker ended abnormally");
        }
        self.client.stop_trip().await;
        tracing::info!(session_id = %self.id, trip_id = %active.trip_id, "trip stopped");
        true
    }

    /// Tear down the trip and the upstream handle. Runs at most once.
    pub async fn cleanup(&self) {
        if self.cleaned_up.swap(true, Ordering::AcqRel) {
            return;
        }
        // Cancelling first silences the ticker and any tile pacing at once.
        self.cancel.cancel();
        self.stop_trip().await;
        self.client.close().await;
        tracing::debug!(session_id = %self.id, "session cleaned up");
    }

    /// Dispatch one inbound command and emit its reply, if any.
    pub async fn handle_command(&self, msg: ClientMessage) {
        match msg {
            ClientMessage::TripStart(pos) => {
                let TripPosition { lat: Some(lat), lng: Some(lng), speed_kmh, heading } = pos else {
                    self.send_message(ServerMessage::backend_error("trip", "lat and lng are required"));
                    return;
                };
                let started =
                    self.start_trip(lat, lng, speed_kmh.unwrap_or(0.0), heading.unwrap_or(0.0)).await;
                match started {
                    Ok(trip_uuid) => self.send_message(ServerMessage::TripStarted { trip_uuid }),
                    Err(e) => {
                        tracing::warn!(session_id = %self.id, err = %e, "trip start failed");
                        self.send_message(ServerMessage::backend_error("trip", e.to_string()));
                    }
                }
            }
            ClientMessage::TripMove(pos) => {
                let (Some(lat), Some(lng)) = (pos.lat, pos.lng) else {
                    tracing::debug!(session_id = %self.id, "trip:move without coordinates ignored");
                    return;
                };
                if let Err(e) = self.move_trip(lat, lng, pos.speed_kmh, pos.heading).await {
                    tracing::warn!(session_id = %self.id, err = %e, "location update failed");
                    self.send_message(ServerMessage::backend_error("trip", e.to_string()));
                }
            }
            ClientMessage::TripStop => {
                self.stop_trip().await;
                self.send_message(ServerMessage::TripStopped);
            }
            ClientMessage::Unknown => {
                tracing::debug!(session_id = %self.id, "unknown message type ignored");
            }
        }
    }

    /// React to one upstream event.
    pub fn on_upstream_event(self: &Arc<Self>, event: UpstreamEvent) {
        match event {
            UpstreamEvent::PoiUpdate(poi) => {
                tracing::debug!(session_id = %self.id, poi = %poi.id, state = %poi.state, "poi update");
                self.send_message(ServerMessage::PoiUpdate { poi, timestamp: epoch_ms() });
            }
            UpstreamEvent::TileVersionChanged { id, .. } => self.enqueue_tile(id),
            UpstreamEvent::Error(message) => {
                tracing::warn!(session_id = %self.id, err = %message, "upstream stream error");
                self.send_message(ServerMessage::backend_error("upstream", message));
            }
        }
    }

    async fn pump_events(self: Arc<Self>, mut events: mpsc::Receiver<UpstreamEvent>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.on_upstream_event(event),
                    None => break,
                }
            }
        }
    }

    fn lock_tiles(&self) -> MutexGuard<'_, TileQueue> {
        self.tiles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a tile for fetching unless it is already pending, and start the
    /// drain if none is running.
    pub fn enqueue_tile(self: &Arc<Self>, tile_id: String) {
        if self.cancel.is_cancelled() {
            return;
        }
        let spawn_drain = {
            let mut queue = self.lock_tiles();
            if !queue.pending.contains(&tile_id) {
                queue.pending.push_back(tile_id);
            }
            !std::mem::replace(&mut queue.busy, true)
        };
        if spawn_drain {
            tokio::spawn(Arc::clone(self).drain_tiles());
        }
    }

    /// Sole consumer of the tile queue. Fetches one tile at a time in FIFO
    /// order with a pacing delay after each fetch.
    async fn drain_tiles(self: Arc<Self>) {
        loop {
            let next = {
                let mut queue = self.lock_tiles();
                let next = queue.pending.pop_front();
                if next.is_none() {
                    queue.busy = false;
                }
                next
            };
            let Some(tile_id) = next else {
                return;
            };

            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => break,
                res = self.client.fetch_tile(&tile_id) => res,
            };
            match fetched {
                Ok(tile) if !tile.static_pois.is_empty() => {
                    tracing::debug!(session_id = %self.id, tile = %tile_id, pois = tile.static_pois.len(), "tile fetched");
                    self.send_message(ServerMessage::PoiBatch { pois: tile.static_pois, timestamp: epoch_ms() });
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(session_id = %self.id, tile = %tile_id, err = %e, "tile fetch failed");
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.timing.tile_pacing) => {}
            }
        }

        // Cancelled mid-drain: leave nothing behind.
        let mut queue = self.lock_tiles();
        queue.pending.clear();
        queue.busy = false;
    }

    #[cfg(test)]
    fn tile_queue_state(&self) -> (Vec<String>, bool) {
        let queue = self.lock_tiles();
        (queue.pending.iter().cloned().collect(), queue.busy)
    }
}

/// Re-send the last known fix every `every` until cancelled.
async fn location_ticker(
    client: Arc<dyn TripClient>,
    outbound: mpsc::Sender<ServerMessage>,
    trip_id: String,
    fix_rx: watch::Receiver<LocationFix>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {}
        }
        let fix = *fix_rx.borrow();
        let sent = tokio::select! {
            _ = cancel.cancelled() => break,
            res = client.send_location_update(&trip_id, fix) => res,
        };
        if let Err(e) = sent {
            tracing::warn!(trip_id = %trip_id, err = %e, "periodic location update failed");
            let _ = outbound.try_send(ServerMessage::backend_error("trip", e.to_string()));
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
