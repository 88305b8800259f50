//! Trace Processor - per-granularity shading of the backend traces.
//!
//! State and nation views shade regions by magnitude. The county view drops
//! magnitude shading in favour of a single flat hue with a gold outline, so
//! the selected county stands out; hover text and magnitudes stay intact.

use crate::payload::Trace;
use crate::selection::Selection;
use serde_json::{json, Value};

/// A colour scale as `(offset, colour)` stops.
pub type ColorScale = &'static [(f64, &'static str)];

/// White at zero through navy at the maximum. The first stop above zero is
/// pinned to a distinct blue so "no report" never blends into "small report".
pub const MAGNITUDE_SCALE: ColorScale = &[
    (0.0, "#ffffff"),
    (0.00001, "#4a90c2"),
    (0.2, "#5a9bd4"),
    (0.4, "#3a7bbf"),
    (0.6, "#2b6ca3"),
    (0.8, "#1f4e79"),
    (1.0, "#0b2e59"),
];

/// County fill colour.
pub const COUNTY_FILL: &str = "#3a7bbf";

/// Magnitude-independent two-stop scale used for the county view.
pub const FLAT_SCALE: ColorScale = &[(0.0, COUNTY_FILL), (1.0, COUNTY_FILL)];

/// County outline.
pub const COUNTY_OUTLINE_COLOR: &str = "#FFD700";
pub const COUNTY_OUTLINE_WIDTH: f64 = 2.0;

/// Geo subplot every trace is bound to.
pub const GEO_SUBPLOT: &str = "geo";

/// How magnitudes are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadingMode {
    /// 7-stop magnitude scale with a shared colour bar
    Magnitude,
    /// Flat fill, no colour bar
    Flat,
}

impl ShadingMode {
    pub fn for_selection(selection: &Selection) -> Self {
        if selection.is_county_view() {
            Self::Flat
        } else {
            Self::Magnitude
        }
    }

    /// Whether the shared legend/colour bar is shown.
    pub fn shows_scale(self) -> bool {
        self == Self::Magnitude
    }
}

/// Output of the trace processor.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedTraces {
    pub traces: Vec<Trace>,
    pub mode: ShadingMode,
}

/// Rewrites the traces for the selection's granularity. The input is not modified.
pub fn process_traces(traces: &[Trace], selection: &Selection) -> ProcessedTraces {
    let mode = ShadingMode::for_selection(selection);
    let traces = traces
        .iter()
        .map(|trace| match mode {
            ShadingMode::Flat => flatten_trace(trace),
            ShadingMode::Magnitude => shade_trace(trace),
        })
        .collect();
    ProcessedTraces { traces, mode }
}

fn shade_trace(trace: &Trace) -> Trace {
    Trace {
        colorscale: Some(scale_value(MAGNITUDE_SCALE)),
        geo: Some(GEO_SUBPLOT.to_string()),
        ..trace.clone()
    }
}

fn flatten_trace(trace: &Trace) -> Trace {
    Trace {
        colorscale: Some(scale_value(FLAT_SCALE)),
        showscale: Some(false),
        // Explicit nulls so the renderer drops any inherited colour bar/axis.
        colorbar: Some(Value::Null),
        coloraxis: Some(Value::Null),
        marker: Some(json!({
            "line": {"color": COUNTY_OUTLINE_COLOR, "width": COUNTY_OUTLINE_WIDTH}
        })),
        hoverinfo: trace.hoverinfo.clone().or_else(|| Some(json!("text"))),
        geo: Some(GEO_SUBPLOT.to_string()),
        ..trace.clone()
    }
}

/// Serializes a colour scale as `[[offset, colour], ...]`.
pub fn scale_value(scale: ColorScale) -> Value {
    Value::Array(
        scale
            .iter()
            .map(|(offset, color)| json!([offset, color]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_traces() -> Vec<Trace> {
        vec![
            serde_json::from_value(json!({
                "type": "choropleth",
                "locations": ["19167", "19141", "19193"],
                "z": [0, 120000, 4500000],
                "hovertemplate": "County=%{customdata[0]}<br>Flock Size=%{z}",
                "coloraxis": "coloraxis",
                "marker": {"line": {"width": 0.5, "color": "#666666"}}
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "type": "choropleth",
                "locations": ["Iowa"],
                "z": [0],
                "hoverinfo": "skip",
                "showscale": false
            }))
            .unwrap(),
        ]
    }

    #[test]
    fn test_county_collapses_to_flat_scale() {
        let input = sample_traces();
        let out = process_traces(&input, &Selection::county("IA", "Sioux"));

        assert_eq!(out.mode, ShadingMode::Flat);
        assert!(!out.mode.shows_scale());
        for (before, after) in input.iter().zip(&out.traces) {
            let stops = after.colorscale.as_ref().unwrap().as_array().unwrap();
            assert_eq!(stops.len(), 2);
            assert_eq!(stops[0][1], stops[1][1]);
            assert_eq!(after.showscale, Some(false));
            assert_eq!(after.coloraxis, Some(Value::Null));
            // Display-only rewrite: data and hover untouched.
            assert_eq!(after.z, before.z);
            assert_eq!(after.locations, before.locations);
            assert_eq!(after.hovertemplate, before.hovertemplate);
            assert_eq!(after.text, before.text);
        }
    }

    #[test]
    fn test_county_hoverinfo_defaults_to_text() {
        let out = process_traces(&sample_traces(), &Selection::county("IA", "Sioux"));
        assert_eq!(out.traces[0].hoverinfo, Some(json!("text")));
        assert_eq!(out.traces[1].hoverinfo, Some(json!("skip")));
    }

    #[test]
    fn test_county_outline_is_gold() {
        let out = process_traces(&sample_traces(), &Selection::county("IA", "Sioux"));
        let marker = out.traces[0].marker.as_ref().unwrap();
        assert_eq!(marker["line"]["color"], json!("#FFD700"));
        assert_eq!(marker["line"]["width"], json!(2.0));
    }

    #[test]
    fn test_state_view_keeps_magnitude_scale() {
        let input = sample_traces();
        let out = process_traces(&input, &Selection::state("IA"));

        assert_eq!(out.mode, ShadingMode::Magnitude);
        let stops = out.traces[0].colorscale.as_ref().unwrap().as_array().unwrap();
        assert_eq!(stops.len(), 7);
        assert_eq!(stops[0], json!([0.0, "#ffffff"]));
        // First stop above zero is not white.
        assert_ne!(stops[1][1], json!("#ffffff"));
        assert_eq!(out.traces[0].marker, input[0].marker);
        assert_eq!(out.traces[0].coloraxis, input[0].coloraxis);
    }

    #[test]
    fn test_all_traces_bound_to_geo() {
        for sel in [Selection::nation(), Selection::county("IA", "Sioux")] {
            let out = process_traces(&sample_traces(), &sel);
            assert!(out.traces.iter().all(|t| t.geo.as_deref() == Some("geo")));
        }
    }

    #[test]
    fn test_input_not_mutated() {
        let input = sample_traces();
        let snapshot = input.clone();
        let _ = process_traces(&input, &Selection::county("IA", "Sioux"));
        assert_eq!(input, snapshot);
    }

    fn trace_strategy() -> impl Strategy<Value = Trace> {
        (
            prop::collection::vec((0u64..5_000_000, "[0-9]{5}"), 1..12),
            "[A-Za-z =%{}<>]{0,40}",
            any::<bool>(),
        )
            .prop_map(|(rows, hovertemplate, with_text)| {
                let (z, locations): (Vec<u64>, Vec<String>) = rows.into_iter().unzip();
                let text: Vec<String> = z.iter().map(|m| format!("Flock Size: {}", m)).collect();
                let mut raw = json!({
                    "type": "choropleth",
                    "locations": locations,
                    "z": z,
                    "hovertemplate": hovertemplate,
                    "coloraxis": "coloraxis",
                });
                if with_text {
                    raw["text"] = json!(text);
                }
                serde_json::from_value(raw).unwrap()
            })
    }

    proptest! {
        #[test]
        fn prop_county_collapse_keeps_data(
            traces in prop::collection::vec(trace_strategy(), 1..4),
        ) {
            let out = process_traces(&traces, &Selection::county("MN", "Kandiyohi"));
            prop_assert_eq!(out.mode, ShadingMode::Flat);
            prop_assert_eq!(out.traces.len(), traces.len());

            for (before, after) in traces.iter().zip(&out.traces) {
                prop_assert_eq!(after.colorscale.as_ref(), Some(&scale_value(FLAT_SCALE)));
                prop_assert_eq!(FLAT_SCALE.len(), 2);
                prop_assert_eq!(after.showscale, Some(false));
                prop_assert_eq!(&after.z, &before.z);
                prop_assert_eq!(&after.locations, &before.locations);
                prop_assert_eq!(&after.text, &before.text);
                prop_assert_eq!(&after.hovertemplate, &before.hovertemplate);
                prop_assert_eq!(&after.hovertext, &before.hovertext);
            }
        }
    }
}
