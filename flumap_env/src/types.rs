//! Common wire types for the FluMap environment abstraction.

use serde::{Deserialize, Serialize};

/// Path of the choropleth endpoint relative to the backend base URL.
pub const CHOROPLETH_PATH: &str = "/api/map/choropleth";

/// Query parameters for one choropleth request.
///
/// Both parameters are optional; an absent state means the nation view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChoroplethQuery {
    pub state: Option<String>,
    pub county: Option<String>,
}

impl ChoroplethQuery {
    /// Creates a query, dropping empty strings.
    pub fn new(state: Option<&str>, county: Option<&str>) -> Self {
        let keep = |s: Option<&str>| s.filter(|v| !v.is_empty()).map(str::to_string);
        Self {
            state: keep(state),
            county: keep(county),
        }
    }

    /// Returns the query pairs in the order the backend expects them.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::with_capacity(2);
        if let Some(state) = &self.state {
            pairs.push(("state", state.as_str()));
        }
        if let Some(county) = &self.county {
            pairs.push(("county", county.as_str()));
        }
        pairs
    }
}

impl std::fmt::Display for ChoroplethQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.state, &self.county) {
            (None, _) => write!(f, "nation"),
            (Some(state), None) => write!(f, "{}", state),
            (Some(state), Some(county)) => write!(f, "{}/{}", state, county),
        }
    }
}

/// Raw backend response: status code plus the body as text.
///
/// The body is kept as text so parse failures can quote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a 200 response.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_drops_empty_strings() {
        let query = ChoroplethQuery::new(Some(""), Some(""));
        assert_eq!(query, ChoroplethQuery::default());
        assert!(query.pairs().is_empty());
    }

    #[test]
    fn test_query_pairs_order() {
        let query = ChoroplethQuery::new(Some("IA"), Some("Sioux"));
        assert_eq!(query.pairs(), vec![("state", "IA"), ("county", "Sioux")]);
        assert_eq!(query.to_string(), "IA/Sioux");
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::ok("{}").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
    }
}
