//! Backend payload model: traces, layout and optional region bounds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A longitude/latitude point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Rectangular lon/lat envelope of the selected region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Bounds {
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// Returns the bounds with min/max swapped where they arrived inverted.
    pub fn normalized(&self) -> Self {
        Self {
            min_lon: self.min_lon.min(self.max_lon),
            max_lon: self.min_lon.max(self.max_lon),
            min_lat: self.min_lat.min(self.max_lat),
            max_lat: self.min_lat.max(self.max_lat),
        }
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Midpoint of the box.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    pub fn is_finite(&self) -> bool {
        [self.min_lon, self.max_lon, self.min_lat, self.max_lat]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// The `bounds` member of the backend payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsEnvelope {
    pub bounds: Bounds,

    /// Polygon centroid computed by the backend; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<GeoPoint>,
}

/// One data-carrying visual layer.
///
/// Only the keys the trace processor rewrites or must preserve are typed;
/// everything else (`geojson`, `featureidkey`, `customdata`, ...) rides in
/// `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Region identifiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Value>,

    /// Magnitudes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hovertext: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hovertemplate: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hoverinfo: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub showscale: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorbar: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coloraxis: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<Value>,

    /// Geo subplot this trace is drawn on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A validated backend response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChoroplethPayload {
    pub data: Vec<Trace>,
    pub layout: Map<String, Value>,
    pub bounds: Option<BoundsEnvelope>,
}
