//! Render Spec Assembler - one immutable frame for a geo renderer.
//!
//! Output shape is the `{data, layout, config}` triple a plotly-style
//! renderer consumes. Serialization is deterministic: struct fields in
//! declaration order and pass-through maps in key order, so identical
//! inputs always serialize to identical bytes.

use crate::config::ViewportClass;
use crate::framing::{compute_framing, AspectRatio, Framing, PROJECTION_TYPE};
use crate::payload::{ChoroplethPayload, GeoPoint, Trace};
use crate::selection::Selection;
use crate::traces::{process_traces, ColorScale, ProcessedTraces, ShadingMode, MAGNITUDE_SCALE};
use serde::Serialize;
use serde_json::{Map, Value};

const BACKGROUND: &str = "#1e1e1e";
const LAND: &str = "#2d2d2d";
const BORDER: &str = "#666666";
const FOREGROUND: &str = "#ffffff";
const ACCENT: &str = "#3a7bbf";
const PANEL: &str = "rgba(30, 30, 30, 0.8)";

pub const MAP_TITLE: &str = "Bird Flu Outbreaks";
pub const COLORBAR_TITLE: &str = "Flock Size";

/// Top-level layout keys the assembler owns; backend values for these are dropped.
const OWNED_LAYOUT_KEYS: &[&str] = &[
    "geo",
    "dragmode",
    "selectioncolor",
    "selectdirection",
    "modebar",
    "margin",
    "autosize",
    "width",
    "height",
    "showlegend",
    "paper_bgcolor",
    "plot_bgcolor",
    "legend",
    "transition",
    "title",
    "coloraxis",
    "showscale",
];

/// Geo keys the assembler owns.
const OWNED_GEO_KEYS: &[&str] = &[
    "scope",
    "showland",
    "landcolor",
    "countrycolor",
    "showlakes",
    "lakecolor",
    "subunitcolor",
    "bgcolor",
    "showframe",
    "projection",
    "domain",
    "center",
    "lonaxis",
    "lataxis",
    "aspectmode",
    "aspectratio",
];

/// Complete description of one map frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSpec {
    pub data: Vec<Trace>,
    pub layout: Layout,
    pub config: PlotConfig,
}

impl RenderSpec {
    /// Serializes to the renderer's JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DragMode {
    Pan,
    Zoom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub geo: GeoLayout,
    pub selectioncolor: &'static str,
    pub dragmode: DragMode,
    pub selectdirection: &'static str,
    pub modebar: ModeBar,
    pub margin: Margin,
    pub autosize: bool,
    pub showlegend: bool,
    pub paper_bgcolor: &'static str,
    pub plot_bgcolor: &'static str,
    pub legend: Legend,
    pub transition: Transition,
    /// `null` on compact viewports clears any inherited title
    pub title: Option<Title>,
    pub coloraxis: ColorAxis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showscale: Option<bool>,
    /// Backend layout keys not owned above
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoLayout {
    pub scope: &'static str,
    pub showland: bool,
    pub landcolor: &'static str,
    pub countrycolor: &'static str,
    pub showlakes: bool,
    pub lakecolor: &'static str,
    pub subunitcolor: &'static str,
    pub bgcolor: &'static str,
    pub showframe: bool,
    pub projection: Projection,
    pub domain: Domain,
    pub center: GeoPoint,
    pub lonaxis: AxisRange,
    pub lataxis: AxisRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspectmode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspectratio: Option<AspectRatio>,
    /// Backend geo keys not owned above
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Domain {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl Default for Domain {
    fn default() -> Self {
        Self {
            x: [0.0, 1.0],
            y: [0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    pub range: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModeBar {
    pub bgcolor: &'static str,
    pub color: &'static str,
    pub activecolor: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margin {
    pub l: f64,
    pub r: f64,
    pub t: f64,
    pub b: f64,
    pub pad: f64,
}

impl Margin {
    pub fn zero() -> Self {
        Self {
            l: 0.0,
            r: 0.0,
            t: 0.0,
            b: 0.0,
            pad: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Font {
    pub color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

impl Font {
    fn color(color: &'static str) -> Self {
        Self { color, size: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Legend {
    pub x: f64,
    pub y: f64,
    pub bgcolor: &'static str,
    pub bordercolor: &'static str,
    pub borderwidth: f64,
    pub font: Font,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transition {
    pub duration: u32,
    pub easing: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Title {
    pub text: &'static str,
    pub x: f64,
    pub y: f64,
    pub xanchor: &'static str,
    pub yanchor: &'static str,
    pub font: Font,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorBarTitle {
    pub text: &'static str,
    pub font: Font,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorBar {
    pub x: f64,
    pub len: f64,
    pub thickness: f64,
    pub yanchor: &'static str,
    pub y: f64,
    pub title: ColorBarTitle,
    pub tickfont: Font,
    pub bgcolor: &'static str,
}

/// Shared colour axis: a visible magnitude bar, or hidden for the county view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColorAxis {
    Magnitude {
        colorbar: ColorBar,
        cmin: f64,
        zmin: f64,
        colorscale: ColorScale,
    },
    Hidden {
        showscale: bool,
    },
}

/// Interaction toggles.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotConfig {
    pub display_mode_bar: bool,
    pub scroll_zoom: bool,
    pub responsive: bool,
    pub mode_bar_buttons_to_remove: Vec<&'static str>,
    #[serde(rename = "displaylogo")]
    pub display_logo: bool,
}

impl PlotConfig {
    pub fn for_viewport(viewport: ViewportClass) -> Self {
        Self {
            display_mode_bar: !viewport.is_compact(),
            scroll_zoom: !viewport.is_compact(),
            responsive: true,
            mode_bar_buttons_to_remove: vec!["toImage", "sendDataToCloud"],
            display_logo: false,
        }
    }
}

/// Merges processed traces and framing into a RenderSpec.
pub fn assemble(
    processed: ProcessedTraces,
    framing: &Framing,
    backend_layout: &Map<String, Value>,
    viewport: ViewportClass,
) -> RenderSpec {
    let county = processed.mode == ShadingMode::Flat;

    let backend_geo = match backend_layout.get("geo") {
        Some(Value::Object(geo)) => without_keys(geo, OWNED_GEO_KEYS),
        _ => Map::new(),
    };

    let geo = GeoLayout {
        scope: "usa",
        showland: true,
        landcolor: LAND,
        countrycolor: BORDER,
        showlakes: true,
        lakecolor: BACKGROUND,
        subunitcolor: BORDER,
        bgcolor: BACKGROUND,
        showframe: false,
        projection: Projection {
            kind: PROJECTION_TYPE,
            scale: framing.scale,
        },
        domain: Domain::default(),
        center: framing.center,
        lonaxis: AxisRange {
            range: framing.lon_range,
        },
        lataxis: AxisRange {
            range: framing.lat_range,
        },
        aspectmode: framing.aspect_ratio.map(|_| "data"),
        aspectratio: framing.aspect_ratio,
        passthrough: backend_geo,
    };

    let title = (!viewport.is_compact()).then(|| Title {
        text: MAP_TITLE,
        x: 0.5,
        y: 0.97,
        xanchor: "center",
        yanchor: "top",
        font: Font {
            color: "#f5f5f5",
            size: Some(16),
        },
    });

    let coloraxis = if processed.mode.shows_scale() {
        ColorAxis::Magnitude {
            colorbar: ColorBar {
                x: -0.07,
                len: 0.9,
                thickness: 15.0,
                yanchor: "middle",
                y: 0.5,
                title: ColorBarTitle {
                    text: COLORBAR_TITLE,
                    font: Font::color(FOREGROUND),
                },
                tickfont: Font::color(FOREGROUND),
                bgcolor: PANEL,
            },
            cmin: 0.0,
            zmin: 0.0,
            colorscale: MAGNITUDE_SCALE,
        }
    } else {
        ColorAxis::Hidden { showscale: false }
    };

    let layout = Layout {
        geo,
        selectioncolor: ACCENT,
        dragmode: if county { DragMode::Pan } else { DragMode::Zoom },
        selectdirection: "any",
        modebar: ModeBar {
            bgcolor: "transparent",
            color: FOREGROUND,
            activecolor: ACCENT,
        },
        margin: Margin::zero(),
        autosize: true,
        showlegend: true,
        paper_bgcolor: BACKGROUND,
        plot_bgcolor: BACKGROUND,
        legend: Legend {
            x: 0.0,
            y: 1.0,
            bgcolor: PANEL,
            bordercolor: BORDER,
            borderwidth: 1.0,
            font: Font::color(FOREGROUND),
        },
        transition: Transition {
            duration: 1000,
            easing: "cubic-in-out",
        },
        title,
        coloraxis,
        showscale: county.then_some(false),
        passthrough: without_keys(backend_layout, OWNED_LAYOUT_KEYS),
    };

    RenderSpec {
        data: processed.traces,
        layout,
        config: PlotConfig::for_viewport(viewport),
    }
}

/// Full pipeline for a validated payload: shade, frame, assemble.
pub fn render(
    payload: &ChoroplethPayload,
    selection: &Selection,
    viewport: ViewportClass,
) -> RenderSpec {
    let processed = process_traces(&payload.data, selection);
    let framing = compute_framing(
        payload.bounds.as_ref().map(|env| &env.bounds),
        selection.is_county_view(),
        selection.state.as_deref(),
        viewport,
    );
    assemble(processed, &framing, &payload.layout, viewport)
}

fn without_keys(map: &Map<String, Value>, owned: &[&str]) -> Map<String, Value> {
    map.iter()
        .filter(|(key, _)| !owned.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Bounds, BoundsEnvelope};
    use crate::validation::validate_value;
    use serde_json::json;

    fn payload(bounds: Option<Bounds>) -> ChoroplethPayload {
        let mut p = validate_value(json!({
            "data": [{
                "type": "choropleth",
                "locations": ["19167", "19141"],
                "z": [0, 250000],
                "featureidkey": "id",
                "coloraxis": "coloraxis"
            }],
            "layout": {
                "width": 1200,
                "height": 600,
                "template": {"data": {}},
                "margin": {"r": 0, "t": 0, "l": 0, "b": 0},
                "coloraxis": {"cmax": 4500000},
                "geo": {"showsubunits": true, "scope": "world", "lonaxis": {"showgrid": false}}
            }
        }))
        .unwrap();
        p.bounds = bounds.map(|bounds| BoundsEnvelope { bounds, center: None });
        p
    }

    fn to_value(spec: &RenderSpec) -> Value {
        serde_json::to_value(spec).unwrap()
    }

    #[test]
    fn test_nation_spec_shape() {
        let spec = render(&payload(None), &Selection::nation(), ViewportClass::Desktop);
        let v = to_value(&spec);

        assert_eq!(v["layout"]["dragmode"], json!("zoom"));
        assert_eq!(v["layout"]["geo"]["center"], json!({"lon": -95.0, "lat": 37.5}));
        assert_eq!(v["layout"]["geo"]["projection"], json!({"type": "albers usa", "scale": 0.93}));
        assert_eq!(v["layout"]["geo"]["lonaxis"], json!({"range": [-125.0, -65.0]}));
        assert!(v["layout"]["geo"].get("aspectratio").is_none());
        assert_eq!(v["layout"]["coloraxis"]["colorscale"].as_array().unwrap().len(), 7);
        assert_eq!(v["layout"]["title"]["text"], json!("Bird Flu Outbreaks"));
        assert_eq!(v["config"]["displayModeBar"], json!(true));
        assert_eq!(v["config"]["displaylogo"], json!(false));
    }

    #[test]
    fn test_auto_sizing_forced() {
        let v = to_value(&render(&payload(None), &Selection::nation(), ViewportClass::Desktop));
        assert!(v["layout"].get("width").is_none());
        assert!(v["layout"].get("height").is_none());
        assert_eq!(v["layout"]["autosize"], json!(true));
        assert_eq!(
            v["layout"]["margin"],
            json!({"l": 0.0, "r": 0.0, "t": 0.0, "b": 0.0, "pad": 0.0})
        );
    }

    #[test]
    fn test_backend_keys_pass_through_unless_owned() {
        let v = to_value(&render(&payload(None), &Selection::nation(), ViewportClass::Desktop));
        assert_eq!(v["layout"]["template"], json!({"data": {}}));
        assert_eq!(v["layout"]["geo"]["showsubunits"], json!(true));
        assert_eq!(v["layout"]["geo"]["scope"], json!("usa"));
        assert!(v["layout"]["coloraxis"].get("cmax").is_none());
    }

    #[test]
    fn test_county_spec() {
        let b = Bounds::new(-96.64, -90.14, 40.37, 43.50);
        let spec = render(&payload(Some(b)), &Selection::county("IA", "Sioux"), ViewportClass::Desktop);
        let v = to_value(&spec);

        assert_eq!(v["layout"]["dragmode"], json!("pan"));
        assert_eq!(v["layout"]["coloraxis"], json!({"showscale": false}));
        assert_eq!(v["layout"]["showscale"], json!(false));
        assert_eq!(v["layout"]["geo"]["aspectmode"], json!("data"));
        assert_eq!(v["layout"]["geo"]["projection"]["scale"], json!(2.0));
        assert_eq!(v["data"][0]["showscale"], json!(false));
        assert_eq!(v["data"][0]["featureidkey"], json!("id"));
    }

    #[test]
    fn test_compact_viewport() {
        let v = to_value(&render(&payload(None), &Selection::nation(), ViewportClass::Compact));
        assert_eq!(v["config"]["displayModeBar"], json!(false));
        assert_eq!(v["config"]["scrollZoom"], json!(false));
        assert_eq!(v["config"]["responsive"], json!(true));
        assert_eq!(v["layout"]["title"], Value::Null);
        assert_eq!(v["layout"]["geo"]["center"]["lon"], json!(-100.0));
    }

    #[test]
    fn test_assembly_is_byte_identical() {
        let b = Bounds::new(-124.41, -114.13, 32.53, 42.01);
        let p = payload(Some(b));
        let sel = Selection::state("CA");
        let a = render(&p, &sel, ViewportClass::Desktop).to_json().unwrap();
        let b = render(&p, &sel, ViewportClass::Desktop).to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_duplicate_keys_after_flatten() {
        let json = render(&payload(None), &Selection::nation(), ViewportClass::Desktop)
            .to_json()
            .unwrap();
        assert_eq!(json.matches("\"margin\"").count(), 1);
        assert_eq!(json.matches("\"lonaxis\"").count(), 1);
    }
}
