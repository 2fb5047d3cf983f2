// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protobuf messages of the gateway's `saphe.protobuf.TripService`.
//!
//! Declared by hand with `prost` derives; only the fields the relay reads or
//! writes are listed, and unknown fields are skipped on decode.

/// Full method path of the bidirectional trip stream.
pub const TRIP_UPDATE_PATH: &str = "/saphe.protobuf.TripService/Update";
/// Full method path of the server-streamed tile fetch.
pub const GET_TILE_PATH: &str = "/saphe.protobuf.TripService/GetTile";

// -- Scalars and wrappers ------------------------------------------------------

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Location {
    #[prost(double, tag = "1")]
    pub latitude: f64,
    #[prost(double, tag = "2")]
    pub longitude: f64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct DoubleValue {
    #[prost(double, tag = "1")]
    pub value: f64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct UInt32Value {
    #[prost(uint32, tag = "1")]
    pub value: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringValue {
    #[prost(string, tag = "1")]
    pub value: String,
}

// -- Trip stream requests ------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LocationInfo {
    #[prost(message, optional, tag = "1")]
    pub location: Option<Location>,
    #[prost(message, optional, tag = "2")]
    pub timestamp: Option<Timestamp>,
    /// Meters per second.
    #[prost(message, optional, tag = "3")]
    pub speed: Option<DoubleValue>,
    #[prost(message, optional, tag = "4")]
    pub heading: Option<DoubleValue>,
    #[prost(message, optional, tag = "5")]
    pub location_accuracy: Option<DoubleValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Device {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TripUpdateRequest {
    #[prost(message, optional, tag = "1")]
    pub location_info: Option<LocationInfo>,
    #[prost(string, tag = "2")]
    pub trip_uuid: String,
    #[prost(message, repeated, tag = "3")]
    pub devices: Vec<Device>,
    #[prost(string, tag = "4")]
    pub road_segment_id: String,
    #[prost(int32, tag = "5")]
    pub drive_type: i32,
}

// -- Trip stream responses -----------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TripUpdateResponse {
    #[prost(oneof = "trip_update_response::Response", tags = "1, 2, 3, 4")]
    pub response: Option<trip_update_response::Response>,
}

pub mod trip_update_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "1")]
        PoiUpdate(super::PoiUpdate),
        #[prost(message, tag = "2")]
        RelevantTileVersion(super::TileVersion),
        #[prost(message, tag = "3")]
        PoiUpdateChecksum(super::PoiUpdateChecksum),
        #[prost(message, tag = "4")]
        TripConfigurationDto(super::TripConfiguration),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpeedLimit {
    /// Meters per second.
    #[prost(message, optional, tag = "1")]
    pub value: Option<DoubleValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PoiUpdate {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub new_id: String,
    #[prost(message, optional, tag = "3")]
    pub r#type: Option<UInt32Value>,
    #[prost(message, optional, tag = "4")]
    pub client_state: Option<UInt32Value>,
    #[prost(message, optional, tag = "5")]
    pub geometry: Option<PoiGeometry>,
    #[prost(message, optional, tag = "6")]
    pub speed_limit: Option<SpeedLimit>,
    #[prost(message, optional, tag = "7")]
    pub road_name: Option<StringValue>,
    #[prost(message, optional, tag = "8")]
    pub city: Option<StringValue>,
    #[prost(message, optional, tag = "9")]
    pub country_code: Option<StringValue>,
    #[prost(bool, tag = "10")]
    pub is_test: bool,
    #[prost(uint64, tag = "11")]
    pub version: u64,
    #[prost(uint64, tag = "12")]
    pub hash: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TileVersion {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(uint64, tag = "2")]
    pub version: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PoiUpdateChecksum {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TripConfiguration {}

// -- Geometry ------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PoiGeometry {
    #[prost(oneof = "poi_geometry::Value", tags = "1, 2, 3, 4, 5")]
    pub value: Option<poi_geometry::Value>,
}

pub mod poi_geometry {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(message, tag = "1")]
        PointPoiGeometry(super::PointGeometry),
        #[prost(message, tag = "2")]
        CircularPoiGeometry(super::CircularGeometry),
        #[prost(message, tag = "3")]
        LineStringPoiGeometry(super::LineStringGeometry),
        #[prost(message, tag = "4")]
        PolygonalPoiGeometry(super::PolygonalGeometry),
        #[prost(message, tag = "5")]
        EncodedPolylinePoiGeometry(super::EncodedPolylineGeometry),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PointGeometry {
    #[prost(message, optional, tag = "1")]
    pub location: Option<Location>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CircularGeometry {
    #[prost(message, optional, tag = "1")]
    pub center: Option<Location>,
    #[prost(double, tag = "2")]
    pub radius: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LineStringGeometry {
    #[prost(message, repeated, tag = "1")]
    pub line_string: Vec<Location>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PolygonalGeometry {
    #[prost(message, optional, tag = "1")]
    pub centroid: Option<Location>,
    #[prost(message, repeated, tag = "2")]
    pub points: Vec<Location>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EncodedPolylineGeometry {
    #[prost(string, tag = "1")]
    pub encoded_polyline: String,
}

// -- Tiles ---------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTileRequest {
    #[prost(string, tag = "1")]
    pub tile_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTileResponse {
    #[prost(oneof = "get_tile_response::Response", tags = "1, 2")]
    pub response: Option<get_tile_response::Response>,
}

pub mod get_tile_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "1")]
        TileMetaData(super::TileVersion),
        #[prost(message, tag = "2")]
        TileElement(super::TileElement),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TileElement {
    #[prost(oneof = "tile_element::Value", tags = "1, 2")]
    pub value: Option<tile_element::Value>,
}

pub mod tile_element {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(message, tag = "1")]
        Way(super::Way),
        #[prost(message, tag = "2")]
        StaticPoi(super::StaticPoi),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Way {
    #[prost(int64, tag = "1")]
    pub id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StaticPoi {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(uint32, tag = "2")]
    pub poi_type: u32,
    #[prost(message, optional, tag = "3")]
    pub geometry: Option<PoiGeometry>,
    #[prost(bool, tag = "4")]
    pub is_test: bool,
}
