// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway-backed trip client over gRPC.
//!
//! `TripService/Update` is a bidirectional stream: location samples go out,
//! POI pushes and tile-version notices come back. `TripService/GetTile` is
//! server-streamed, one message per tile element. All sessions share one
//! channel; credentials travel as per-call metadata.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic_prost::ProstCodec;

use crate::error::UpstreamError;
use crate::upstream::poi::{parse_poi_update, parse_tile, TileContents};
use crate::upstream::proto::{self, trip_update_response};
use crate::upstream::{
    LocationFix, TripClient, TripClientFactory, UpstreamEvent, UpstreamHandle,
    EVENT_CHANNEL_CAPACITY,
};

pub const APP_VERSION: &str = "6.2.1";
pub const CLIENT_PLATFORM: &str = "Android";
const OS_VERSION: &str = "14";
const DRIVE_TYPE_UNKNOWN: i32 = 2;
const LOCATION_ACCURACY_M: f64 = 10.0;

/// Location samples that may queue on a trip stream before writes wait.
const OUTBOUND_CAPACITY: usize = 16;

/// Builds a [`GatewayClient`] per session over one shared channel.
pub struct GatewayFactory {
    channel: Channel,
    timeout: Duration,
}

impl GatewayFactory {
    /// Prepare a lazily connected channel to `base_url`. `https` URLs use TLS
    /// with the webpki roots. `timeout` bounds connecting, opening a trip
    /// stream and each tile fetch.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut endpoint = Endpoint::from_shared(base_url.trim_end_matches('/').to_owned())?
            .connect_timeout(timeout);
        if base_url.starts_with("https://") {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
        }
        Ok(Self { channel: endpoint.connect_lazy(), timeout })
    }
}

impl TripClientFactory for GatewayFactory {
    fn connect(&self, access_token: &str, app_installation_id: &str) -> UpstreamHandle {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let client = GatewayClient {
            channel: self.channel.clone(),
            timeout: self.timeout,
            access_token: access_token.to_owned(),
            app_installation_id: app_installation_id.to_owned(),
            events: tx,
            stream: Mutex::new(None),
            cancel: CancellationToken::new(),
        };
        UpstreamHandle { client: Arc::new(client), events: rx }
    }
}

/// An open trip stream: the request queue plus the token stopping its reader.
///
/// Dropping it half-closes the request stream and stops the reader.
struct TripStream {
    requests: mpsc::Sender<proto::TripUpdateRequest>,
    cancel: CancellationToken,
}

impl Drop for TripStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Trip client bound to one account's credentials.
pub struct GatewayClient {
    channel: Channel,
    timeout: Duration,
    access_token: String,
    app_installation_id: String,
    events: mpsc::Sender<UpstreamEvent>,
    stream: Mutex<Option<TripStream>>,
    cancel: CancellationToken,
}

impl GatewayClient {
    fn metadata(&self) -> [(&'static str, String); 8] {
        [
            ("authorization", format!("Bearer {}", self.access_token)),
            ("appinstallationid", self.app_installation_id.clone()),
            ("appversion", APP_VERSION.to_owned()),
            ("clientplatform", CLIENT_PLATFORM.to_owned()),
            ("osversion", OS_VERSION.to_owned()),
            ("traceid", uuid::Uuid::new_v4().to_string()),
            ("deviceserialnumber", String::new()),
            ("devicemodelnumber", String::new()),
        ]
    }

    fn request<T>(&self, message: T) -> Result<tonic::Request<T>, UpstreamError> {
        let mut request = tonic::Request::new(message);
        for (key, value) in self.metadata() {
            let value = MetadataValue::try_from(value.as_str())
                .map_err(|e| UpstreamError::transport(format!("invalid metadata {key}: {e}")))?;
            request.metadata_mut().insert(key, value);
        }
        Ok(request)
    }

    async fn ready(&self) -> Result<tonic::client::Grpc<Channel>, UpstreamError> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready().await.map_err(|e| UpstreamError::transport(format!("gateway unavailable: {e}")))?;
        Ok(grpc)
    }

    /// Open the `Update` stream with `first` already queued, and start the
    /// reader that turns responses into events.
    async fn open(&self, first: proto::TripUpdateRequest) -> Result<TripStream, UpstreamError> {
        let (requests, outbound) = mpsc::channel(OUTBOUND_CAPACITY);
        requests
            .try_send(first)
            .map_err(|_| UpstreamError::transport("trip stream queue unavailable"))?;
        let request = self.request(ReceiverStream::new(outbound))?;

        let opened = tokio::time::timeout(self.timeout, async {
            let mut grpc = self.ready().await?;
            let path = PathAndQuery::from_static(proto::TRIP_UPDATE_PATH);
            let codec = ProstCodec::<proto::TripUpdateRequest, proto::TripUpdateResponse>::default();
            let response = grpc.streaming(request, path, codec).await?;
            Ok::<_, UpstreamError>(response.into_inner())
        })
        .await
        .map_err(|_| UpstreamError::transport("trip stream open timed out"))??;

        let stream = TripStream { requests, cancel: self.cancel.child_token() };
        tokio::spawn(read_trip_stream(opened, self.events.clone(), stream.cancel.clone()));
        Ok(stream)
    }
}

#[async_trait::async_trait]
impl TripClient for GatewayClient {
    async fn start_trip(&self, trip_id: &str, fix: LocationFix) -> Result<(), UpstreamError> {
        let mut guard = self.stream.lock().await;
        // Dropping the old stream ends it.
        drop(guard.take());
        let stream = self.open(location_request(trip_id, fix, epoch_secs())).await?;
        *guard = Some(stream);
        Ok(())
    }

    async fn send_location_update(
        &self,
        trip_id: &str,
        fix: LocationFix,
    ) -> Result<(), UpstreamError> {
        let guard = self.stream.lock().await;
        let Some(stream) = guard.as_ref() else {
            return Err(UpstreamError::transport("trip stream not started"));
        };
        let request = location_request(trip_id, fix, epoch_secs());
        match tokio::time::timeout(self.timeout, stream.requests.send(request)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(UpstreamError::transport("trip stream closed")),
            Err(_) => Err(UpstreamError::transport("trip stream write timed out")),
        }
    }

    async fn stop_trip(&self) {
        if self.stream.lock().await.take().is_some() {
            tracing::debug!("trip stream half-closed");
        }
    }

    async fn fetch_tile(&self, tile_id: &str) -> Result<TileContents, UpstreamError> {
        let request = self.request(proto::GetTileRequest { tile_id: tile_id.to_owned() })?;
        let fetched = tokio::time::timeout(self.timeout, async {
            let mut grpc = self.ready().await?;
            let path = PathAndQuery::from_static(proto::GET_TILE_PATH);
            let codec = ProstCodec::<proto::GetTileRequest, proto::GetTileResponse>::default();
            let mut stream = grpc.server_streaming(request, path, codec).await?.into_inner();
            let mut responses: Vec<proto::GetTileResponse> = Vec::new();
            while let Some(response) = stream.message().await? {
                responses.push(response);
            }
            Ok::<_, UpstreamError>(parse_tile(responses))
        })
        .await;
        match fetched {
            Ok(tile) => tile,
            Err(_) => Err(UpstreamError::transport(format!("tile {tile_id} timed out"))),
        }
    }

    async fn close(&self) {
        self.stop_trip().await;
        self.cancel.cancel();
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn read_trip_stream(
    mut inbound: tonic::Streaming<proto::TripUpdateResponse>,
    events: mpsc::Sender<UpstreamEvent>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = inbound.message() => message,
        };
        match message {
            Ok(Some(response)) => {
                if let Some(event) = decode_response(response) {
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
            }
            Ok(None) => {
                tracing::debug!("trip stream ended");
                break;
            }
            Err(status) => {
                let _ = events.send(UpstreamEvent::Error(UpstreamError::from(status).to_string())).await;
                break;
            }
        }
    }
}

/// Outbound `Update` request for one sample.
pub fn location_request(trip_id: &str, fix: LocationFix, now_secs: i64) -> proto::TripUpdateRequest {
    proto::TripUpdateRequest {
        location_info: Some(proto::LocationInfo {
            location: Some(proto::Location { latitude: fix.latitude, longitude: fix.longitude }),
            timestamp: Some(proto::Timestamp { seconds: now_secs, nanos: 0 }),
            speed: Some(proto::DoubleValue { value: fix.speed_ms }),
            heading: Some(proto::DoubleValue { value: fix.heading_deg }),
            location_accuracy: Some(proto::DoubleValue { value: LOCATION_ACCURACY_M }),
        }),
        trip_uuid: trip_id.to_owned(),
        devices: Vec::new(),
        road_segment_id: String::new(),
        drive_type: DRIVE_TYPE_UNKNOWN,
    }
}

/// Map one trip stream response to an event. Checksums and trip
/// configuration yield `None`.
pub fn decode_response(response: proto::TripUpdateResponse) -> Option<UpstreamEvent> {
    match response.response? {
        trip_update_response::Response::PoiUpdate(raw) => Some(UpstreamEvent::PoiUpdate(parse_poi_update(raw))),
        trip_update_response::Response::RelevantTileVersion(tile) => {
            Some(UpstreamEvent::TileVersionChanged { id: tile.id, version: tile.version })
        }
        trip_update_response::Response::PoiUpdateChecksum(_) => None,
        trip_update_response::Response::TripConfigurationDto(_) => {
            tracing::debug!("trip configuration received");
            None
        }
    }
}

fn epoch_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
