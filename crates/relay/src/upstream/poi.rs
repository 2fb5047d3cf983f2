// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Points of interest as forwarded to clients, and their decoding from
//! gateway messages.

use serde::{Deserialize, Serialize};

use crate::upstream::proto;
use crate::upstream::proto::get_tile_response::Response as TileResponse;
use crate::upstream::proto::poi_geometry::Value as Geometry;
use crate::upstream::proto::tile_element::Value as TileValue;

/// POI type codes and their display names.
pub const POI_TYPE_NAMES: &[(u32, &str)] = &[
    (0x000000, "Unknown"),
    (0x010000, "Law Enforcement"),
    (0x010100, "Camera"),
    (0x010101, "Mobile Speed Camera"),
    (0x010102, "Fixed Speed Camera"),
    (0x010103, "Average Speed Camera"),
    (0x010104, "Red Light Camera"),
    (0x010105, "Speed & Red Light Camera"),
    (0x010106, "Helicopter Speed Camera"),
    (0x010107, "Distance Control Camera"),
    (0x010200, "Spot Check"),
    (0x020000, "Danger"),
    (0x020100, "Car On Shoulder"),
    (0x020200, "Accident"),
    (0x020300, "Animal Nearby"),
    (0x020400, "School Road"),
    (0x020500, "Emergency Vehicle"),
    (0x030000, "Delay"),
    (0x030101, "Congestion"),
    (0x030202, "Roadworks"),
];

const CLIENT_STATE_NAMES: &[&str] = &["Unknown", "Pending", "Active", "Deleted", "OutOfRange"];

pub fn poi_type_name(code: u32) -> String {
    POI_TYPE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| (*name).to_owned())
        .unwrap_or_else(|| format!("Unknown (0x{code:x})"))
}

pub fn client_state_name(state: u32) -> String {
    CLIENT_STATE_NAMES
        .get(state as usize)
        .map(|s| (*s).to_owned())
        .unwrap_or_else(|| format!("Unknown({state})"))
}

/// A live POI change pushed on the trip stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoiUpdate {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub type_code: u32,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_limit_kmh: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    pub is_test: bool,
    pub version: u64,
    pub hash: u64,
}

/// A POI baked into a map tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticPoi {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub type_code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub is_test: bool,
}

/// Decoded tile: its static POIs plus the road ways it carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileContents {
    pub static_pois: Vec<StaticPoi>,
    pub way_ids: Vec<i64>,
}

/// Representative coordinate of a POI geometry.
///
/// Points and circles use their center, polygons their centroid, line
/// strings their first vertex. Encoded polylines yield nothing.
pub fn extract_location(geometry: &proto::PoiGeometry) -> Option<(f64, f64)> {
    let point = match geometry.value.as_ref()? {
        Geometry::PointPoiGeometry(g) => g.location,
        Geometry::CircularPoiGeometry(g) => g.center,
        Geometry::LineStringPoiGeometry(g) => g.line_string.first().copied(),
        Geometry::PolygonalPoiGeometry(g) => g.centroid,
        Geometry::EncodedPolylinePoiGeometry(_) => None,
    }?;
    Some((point.latitude, point.longitude))
}

fn wrapped_str(value: Option<proto::StringValue>) -> Option<String> {
    value.map(|v| v.value)
}

/// Decode a `poiUpdate` pushed on the trip stream.
pub fn parse_poi_update(raw: proto::PoiUpdate) -> PoiUpdate {
    let type_code = raw.r#type.map(|t| t.value).unwrap_or(0);
    let state = raw.client_state.map(|s| s.value).unwrap_or(0);
    let location = raw.geometry.as_ref().and_then(extract_location);
    let speed_limit_ms = raw
        .speed_limit
        .and_then(|limit| limit.value)
        .map(|v| v.value)
        .filter(|v| *v > 0.0);

    let id = if raw.new_id.is_empty() { raw.id.to_string() } else { raw.new_id };

    PoiUpdate {
        id,
        kind: poi_type_name(type_code),
        type_code,
        state: client_state_name(state),
        latitude: location.map(|(lat, _)| lat),
        longitude: location.map(|(_, lng)| lng),
        speed_limit_kmh: speed_limit_ms.map(|ms| (ms * 3.6).round() as u32),
        road_name: wrapped_str(raw.road_name),
        city: wrapped_str(raw.city),
        country_code: wrapped_str(raw.country_code),
        is_test: raw.is_test,
        version: raw.version,
        hash: raw.hash,
    }
}

/// Decode a `staticPoi` tile element.
pub fn parse_static_poi(raw: proto::StaticPoi) -> StaticPoi {
    let location = raw.geometry.as_ref().and_then(extract_location);
    StaticPoi {
        id: raw.id,
        kind: poi_type_name(raw.poi_type),
        type_code: raw.poi_type,
        latitude: location.map(|(lat, _)| lat),
        longitude: location.map(|(_, lng)| lng),
        is_test: raw.is_test,
    }
}

/// Collect the elements streamed for one tile. Metadata and empty
/// responses are skipped.
pub fn parse_tile(responses: impl IntoIterator<Item = proto::GetTileResponse>) -> TileContents {
    let mut tile = TileContents::default();
    for response in responses {
        let Some(TileResponse::TileElement(element)) = response.response else {
            continue;
        };
        match element.value {
            Some(TileValue::StaticPoi(poi)) => tile.static_pois.push(parse_static_poi(poi)),
            Some(TileValue::Way(way)) => tile.way_ids.push(way.id),
            None => {}
        }
    }
    tile
}

#[cfg(test)]
#[path = "poi_tests.rs"]
mod tests;
