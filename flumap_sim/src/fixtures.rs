//! Seeded backend payloads.
//!
//! Produces bodies shaped like the outbreak backend's choropleth endpoint:
//! one magnitude trace keyed by county FIPS, an outline trace for the
//! selected state, a dark-theme layout, and padded state bounds.

use flumap_core::Bounds;
use flumap_env::ChoroplethQuery;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};

/// One state the simulated backend knows about.
#[derive(Debug, Clone, Copy)]
pub struct StateFixture {
    pub code: &'static str,
    pub name: &'static str,
    pub fips: &'static str,
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
    pub counties: &'static [&'static str],
}

impl StateFixture {
    /// Raw extent of the state outline.
    pub fn extent(&self) -> Bounds {
        Bounds::new(self.min_lon, self.max_lon, self.min_lat, self.max_lat)
    }

    /// Extent plus the backend's padding: 0.3 for Alaska, 0.15 for
    /// Louisiana, 0.1 for wide states, 0.2 otherwise.
    pub fn padded_bounds(&self) -> Bounds {
        let lon_range = self.max_lon - self.min_lon;
        let lat_range = self.max_lat - self.min_lat;
        let factor = match self.code {
            "AK" => 0.3,
            "LA" => 0.15,
            _ if lon_range > lat_range * 1.5 => 0.1,
            _ => 0.2,
        };
        let lon_pad = lon_range * factor;
        let lat_pad = lat_range * factor;
        Bounds::new(
            self.min_lon - lon_pad,
            self.max_lon + lon_pad,
            self.min_lat - lat_pad,
            self.max_lat + lat_pad,
        )
    }

    /// Five-digit FIPS code of the i-th county.
    pub fn county_fips(&self, index: usize) -> String {
        format!("{}{:03}", self.fips, index * 2 + 1)
    }

    fn matches(&self, key: &str) -> bool {
        self.code.eq_ignore_ascii_case(key) || self.name.eq_ignore_ascii_case(key)
    }
}

pub const STATES: &[StateFixture] = &[
    StateFixture {
        code: "IA",
        name: "Iowa",
        fips: "19",
        min_lon: -96.64,
        max_lon: -90.14,
        min_lat: 40.37,
        max_lat: 43.50,
        counties: &["Buena Vista", "Sioux", "Polk", "Linn", "Scott"],
    },
    StateFixture {
        code: "CA",
        name: "California",
        fips: "06",
        min_lon: -124.41,
        max_lon: -114.13,
        min_lat: 32.53,
        max_lat: 42.01,
        counties: &["Merced", "Riverside", "Stanislaus", "Sonoma", "Los Angeles"],
    },
    StateFixture {
        code: "AK",
        name: "Alaska",
        fips: "02",
        min_lon: -179.15,
        max_lon: -129.97,
        min_lat: 51.21,
        max_lat: 71.39,
        counties: &["Anchorage", "Matanuska-Susitna", "Fairbanks North Star"],
    },
    StateFixture {
        code: "HI",
        name: "Hawaii",
        fips: "15",
        min_lon: -160.25,
        max_lon: -154.81,
        min_lat: 18.91,
        max_lat: 22.24,
        counties: &["Honolulu", "Hawaii", "Maui", "Kauai"],
    },
    StateFixture {
        code: "LA",
        name: "Louisiana",
        fips: "22",
        min_lon: -94.04,
        max_lon: -88.82,
        min_lat: 28.93,
        max_lat: 33.02,
        counties: &["Caddo", "Orleans", "Jefferson"],
    },
    StateFixture {
        code: "MN",
        name: "Minnesota",
        fips: "27",
        min_lon: -97.24,
        max_lon: -89.49,
        min_lat: 43.50,
        max_lat: 49.38,
        counties: &["Kandiyohi", "Stearns", "Meeker", "Otter Tail"],
    },
];

/// Deterministic payload generator.
#[derive(Debug, Clone, Copy)]
pub struct Fixtures {
    seed: u64,
}

impl Fixtures {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Looks a state up by postal code or full name.
    pub fn state(key: &str) -> Option<&'static StateFixture> {
        STATES.iter().find(|s| s.matches(key))
    }

    /// Flock sizes for every county of a state, stable for a given seed.
    ///
    /// Roughly a third of counties report nothing.
    pub fn magnitudes(&self, state: &StateFixture) -> Vec<u64> {
        let state_index = STATES
            .iter()
            .position(|s| s.code == state.code)
            .unwrap_or(0) as u64;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(state_index));
        state
            .counties
            .iter()
            .map(|_| {
                if rng.gen_bool(0.35) {
                    0
                } else {
                    rng.gen_range(1_000..5_000_000)
                }
            })
            .collect()
    }

    /// Largest magnitude across all states.
    pub fn global_max(&self) -> u64 {
        STATES
            .iter()
            .flat_map(|s| self.magnitudes(s))
            .max()
            .unwrap_or(0)
    }

    /// The JSON document the backend would return for a query.
    pub fn payload(&self, query: &ChoroplethQuery) -> Value {
        let selected = query.state.as_deref().and_then(Self::state);
        let global_max = self.global_max();

        let mut locations = Vec::new();
        let mut z = Vec::new();
        let mut text = Vec::new();
        for state in STATES {
            if selected.is_some_and(|s| s.code != state.code) {
                continue;
            }
            for (i, (county, magnitude)) in state
                .counties
                .iter()
                .zip(self.magnitudes(state))
                .enumerate()
            {
                if let Some(wanted) = query.county.as_deref() {
                    if selected.is_some() && !county.eq_ignore_ascii_case(wanted) {
                        continue;
                    }
                }
                locations.push(state.county_fips(i));
                z.push(magnitude);
                text.push(format!("{} County, {}<br>Flock Size: {}", county, state.name, magnitude));
            }
        }

        let mut data = vec![json!({
            "type": "choropleth",
            "locations": locations,
            "z": z,
            "text": text,
            "hovertemplate": "%{text}<extra></extra>",
            "coloraxis": "coloraxis",
            "marker": {"line": {"width": 0.5, "color": "#666666"}},
        })];
        if let Some(state) = selected {
            data.push(json!({
                "type": "choropleth",
                "locations": [state.name],
                "z": [0],
                "zmin": 0,
                "zmax": global_max,
                "showscale": false,
                "hoverinfo": "skip",
                "marker": {"line": {"color": "#ffffff", "width": 2}, "opacity": 0},
                "showlegend": false,
            }));
        }

        let mut body = json!({
            "data": data,
            "layout": {
                "margin": {"r": 0, "t": 0, "l": 0, "b": 0},
                "paper_bgcolor": "#1e1e1e",
                "plot_bgcolor": "#1e1e1e",
                "geo": {
                    "bgcolor": "#1e1e1e",
                    "showsubunits": true,
                    "showcountries": true,
                    "coastlinecolor": "#666666",
                    "scope": "usa",
                    "projection": {"scale": 1.0, "type": "albers usa"},
                },
                "coloraxis": {"cmin": 0, "cmax": global_max, "cmid": global_max / 2},
                "width": 1200,
                "height": 600,
            },
        });
        if let Some(state) = selected {
            let bounds = state.padded_bounds();
            let center = state.extent().center();
            body["bounds"] = json!({
                "bounds": {
                    "min_lon": bounds.min_lon,
                    "max_lon": bounds.max_lon,
                    "min_lat": bounds.min_lat,
                    "max_lat": bounds.max_lat,
                },
                "center": {"lon": center.lon, "lat": center.lat},
            });
        }
        body
    }

    pub fn body_for(&self, query: &ChoroplethQuery) -> String {
        self.payload(query).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flumap_core::validate_body;

    #[test]
    fn test_lookup_by_code_or_name() {
        assert_eq!(Fixtures::state("ia").unwrap().name, "Iowa");
        assert_eq!(Fixtures::state("ALASKA").unwrap().code, "AK");
        assert!(Fixtures::state("Atlantis").is_none());
    }

    #[test]
    fn test_magnitudes_are_seeded() {
        let iowa = Fixtures::state("IA").unwrap();
        assert_eq!(Fixtures::new(7).magnitudes(iowa), Fixtures::new(7).magnitudes(iowa));
        assert_eq!(Fixtures::new(7).magnitudes(iowa).len(), iowa.counties.len());
    }

    #[test]
    fn test_nation_payload_has_no_bounds() {
        let body = Fixtures::new(1).body_for(&ChoroplethQuery::default());
        let payload = validate_body(&body).unwrap();
        assert!(payload.bounds.is_none());
        assert_eq!(payload.data.len(), 1);
    }

    #[test]
    fn test_state_payload_carries_padded_bounds() {
        let query = ChoroplethQuery::new(Some("IA"), None);
        let payload = validate_body(&Fixtures::new(1).body_for(&query)).unwrap();
        let envelope = payload.bounds.unwrap();
        let iowa = Fixtures::state("IA").unwrap();
        assert_eq!(envelope.bounds, iowa.padded_bounds());
        // outline trace
        assert_eq!(payload.data.len(), 2);
    }

    #[test]
    fn test_county_payload_filters_to_county() {
        let query = ChoroplethQuery::new(Some("MN"), Some("kandiyohi"));
        let value = Fixtures::new(3).payload(&query);
        assert_eq!(value["data"][0]["locations"], json!(["27001"]));
    }

    #[test]
    fn test_padding_rules() {
        let iowa = Fixtures::state("IA").unwrap();
        // Iowa is wide: 6.5 lon vs 3.13 lat
        let padded = iowa.padded_bounds();
        assert!((padded.min_lon - (-96.64 - 0.65)).abs() < 1e-9);

        let alaska = Fixtures::state("AK").unwrap();
        let padded = alaska.padded_bounds();
        assert!((padded.max_lat - (71.39 + 20.18 * 0.3)).abs() < 1e-9);
    }
}
