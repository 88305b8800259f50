//! Deterministic scenarios for the choropleth view.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: Nation view with default framing
    NationView,

    /// SIM-002: State zoom framed from backend bounds
    StateZoom,

    /// SIM-003: Alaska county with flat shading and pan mode
    CountyZoom,

    /// SIM-004: Two connection failures, then success
    FlakyBackend,

    /// SIM-005: Backend returns 503 on every attempt
    BackendDown,

    /// SIM-006: Slow response for an abandoned selection
    RapidReselect,

    /// SIM-007: HTML error page and missing data array
    MalformedBody,

    /// SIM-008: Random selections against a lossy backend
    Chaos,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::NationView,
            ScenarioId::StateZoom,
            ScenarioId::CountyZoom,
            ScenarioId::FlakyBackend,
            ScenarioId::BackendDown,
            ScenarioId::RapidReselect,
            ScenarioId::MalformedBody,
            ScenarioId::Chaos,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::NationView => "nation_view",
            ScenarioId::StateZoom => "state_zoom",
            ScenarioId::CountyZoom => "county_zoom",
            ScenarioId::FlakyBackend => "flaky_backend",
            ScenarioId::BackendDown => "backend_down",
            ScenarioId::RapidReselect => "rapid_reselect",
            ScenarioId::MalformedBody => "malformed_body",
            ScenarioId::Chaos => "chaos",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::NationView => "No selection: fixed nation framing, magnitude scale, zoom mode",
            ScenarioId::StateZoom => "Each fixture state: center and scale derived from padded bounds",
            ScenarioId::CountyZoom => "Alaska county: 0.8 correction, flat fill, gold outline, pan mode",
            ScenarioId::FlakyBackend => "2 connection failures then success after 1s and 2s backoff",
            ScenarioId::BackendDown => "3 x 503: failure published, previous frame preserved",
            ScenarioId::RapidReselect => "A requested, then B; B answers first, late A is discarded",
            ScenarioId::MalformedBody => "Unparsable body and missing data array are retried",
            ScenarioId::Chaos => "Seeded selections with 40% connection loss; invariants only",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nation_view" | "nation" | "sim-001" => Ok(ScenarioId::NationView),
            "state_zoom" | "state" | "sim-002" => Ok(ScenarioId::StateZoom),
            "county_zoom" | "county" | "sim-003" => Ok(ScenarioId::CountyZoom),
            "flaky_backend" | "flaky" | "sim-004" => Ok(ScenarioId::FlakyBackend),
            "backend_down" | "down" | "sim-005" => Ok(ScenarioId::BackendDown),
            "rapid_reselect" | "reselect" | "sim-006" => Ok(ScenarioId::RapidReselect),
            "malformed_body" | "malformed" | "sim-007" => Ok(ScenarioId::MalformedBody),
            "chaos" | "sim-008" => Ok(ScenarioId::Chaos),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("SIM-006".parse::<ScenarioId>(), Ok(ScenarioId::RapidReselect));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
