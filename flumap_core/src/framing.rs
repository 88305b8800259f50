//! Framing Engine - projection center, scale and axis ranges.
//!
//! Pure and deterministic in `(bounds, county flag, state, viewport)`.
//!
//! Without bounds the frame is the fixed lower-48 view. With bounds the
//! frame is centred on the box, padded by a fixed number of degrees and
//! zoomed inversely to the box size, clipped to a floor:
//!
//! ```text
//! scale = max(floor, K / max(lon_span, lat_span))
//!
//!            floor   K    padding
//! county      2.0   6.0    6.5°
//! state       1.0   4.0    1.2°
//! ```
//!
//! Alaska and Hawaii get empirical corrections because the albers-usa
//! projection insets them at a different size than they really are.
//! All tuned values below are visual constants, not derived quantities.

use crate::config::ViewportClass;
use crate::error::FramingError;
use crate::payload::{Bounds, GeoPoint};
use serde::Serialize;
use tracing::debug;

pub const PROJECTION_TYPE: &str = "albers usa";

// Nation view
pub const NATION_LON_RANGE: [f64; 2] = [-125.0, -65.0];
pub const NATION_LAT_RANGE: [f64; 2] = [23.0, 48.0];
pub const NATION_SCALE: f64 = 0.93;
pub const NATION_CENTER_LON_DESKTOP: f64 = -95.0;
pub const NATION_CENTER_LON_COMPACT: f64 = -100.0;
pub const NATION_CENTER_LAT: f64 = 37.5;

// Padding in degrees added on each side of each axis
pub const COUNTY_PADDING_DEG: f64 = 6.5;
pub const STATE_PADDING_DEG: f64 = 1.2;

// Dynamic scale: max(floor, K / extent)
pub const COUNTY_SCALE_FLOOR: f64 = 2.0;
pub const COUNTY_SCALE_K: f64 = 6.0;
pub const STATE_SCALE_FLOOR: f64 = 1.0;
pub const STATE_SCALE_K: f64 = 4.0;

// Non-contiguous territory corrections
pub const ALASKA_COUNTY_CORRECTION: f64 = 0.8;
pub const HAWAII_STATE_CORRECTION: f64 = 0.7;

/// Smallest span (degrees) used in divisions.
pub const SPAN_EPSILON: f64 = 1e-6;

/// Aspect hint for the geo subplot. Never inverted: both components >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AspectRatio {
    pub x: f64,
    pub y: f64,
}

impl AspectRatio {
    pub fn from_aspect(aspect: f64) -> Self {
        if aspect > 1.0 {
            Self { x: aspect, y: 1.0 }
        } else {
            Self {
                x: 1.0,
                y: 1.0 / aspect,
            }
        }
    }
}

/// Computed frame for the geo subplot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    pub center: GeoPoint,
    pub lon_range: [f64; 2],
    pub lat_range: [f64; 2],
    pub scale: f64,

    /// Only present for bounded (state/county) frames
    pub aspect_ratio: Option<AspectRatio>,
}

impl Framing {
    /// Fixed lower-48 frame.
    pub fn nation(viewport: ViewportClass) -> Self {
        let center_lon = match viewport {
            ViewportClass::Desktop => NATION_CENTER_LON_DESKTOP,
            ViewportClass::Compact => NATION_CENTER_LON_COMPACT,
        };
        Self {
            center: GeoPoint::new(center_lon, NATION_CENTER_LAT),
            lon_range: NATION_LON_RANGE,
            lat_range: NATION_LAT_RANGE,
            scale: NATION_SCALE,
            aspect_ratio: None,
        }
    }
}

/// States whose albers-usa inset needs a scale correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inset {
    Alaska,
    Hawaii,
}

impl Inset {
    /// Accepts postal codes and full names, case-insensitively.
    fn from_state(state: &str) -> Option<Self> {
        match state.trim().to_ascii_uppercase().as_str() {
            "AK" | "ALASKA" => Some(Self::Alaska),
            "HI" | "HAWAII" => Some(Self::Hawaii),
            _ => None,
        }
    }
}

/// Checks a bounding box for zero (or inverted-to-zero) spans.
pub fn check_bounds(bounds: &Bounds) -> Result<(), FramingError> {
    let b = bounds.normalized();
    if b.lon_span() < SPAN_EPSILON || b.lat_span() < SPAN_EPSILON {
        return Err(FramingError::DegenerateBounds {
            lon_span: b.lon_span(),
            lat_span: b.lat_span(),
        });
    }
    Ok(())
}

/// Zoom inversely proportional to the larger box side, clipped to a floor.
pub fn dynamic_scale(county: bool, area_width: f64, area_height: f64) -> f64 {
    let (floor, k) = if county {
        (COUNTY_SCALE_FLOOR, COUNTY_SCALE_K)
    } else {
        (STATE_SCALE_FLOOR, STATE_SCALE_K)
    };
    let extent = area_width.max(area_height).max(SPAN_EPSILON);
    (k / extent).max(floor)
}

/// Computes the frame for a selection.
pub fn compute_framing(
    bounds: Option<&Bounds>,
    county: bool,
    state: Option<&str>,
    viewport: ViewportClass,
) -> Framing {
    let Some(bounds) = bounds else {
        return Framing::nation(viewport);
    };

    let degenerate = match check_bounds(bounds) {
        Ok(()) => false,
        Err(err) => {
            debug!("{}; clamping spans to {}", err, SPAN_EPSILON);
            true
        }
    };

    let b = bounds.normalized();
    let lon_span = b.lon_span().max(SPAN_EPSILON);
    let lat_span = b.lat_span().max(SPAN_EPSILON);
    let aspect = lon_span / lat_span;

    let padding = if county {
        COUNTY_PADDING_DEG
    } else {
        STATE_PADDING_DEG
    };

    let mut scale = dynamic_scale(county, lon_span, lat_span);
    match (state.and_then(Inset::from_state), county) {
        (Some(Inset::Alaska), true) => scale *= ALASKA_COUNTY_CORRECTION,
        (Some(Inset::Hawaii), false) => scale *= HAWAII_STATE_CORRECTION,
        _ => {}
    }

    Framing {
        center: b.center(),
        lon_range: [b.min_lon - padding, b.max_lon + padding],
        lat_range: [b.min_lat - padding, b.max_lat + padding],
        scale,
        // A clamped span would turn into an absurd ratio; let the renderer pick.
        aspect_ratio: (!degenerate).then(|| AspectRatio::from_aspect(aspect)),
    }
}
