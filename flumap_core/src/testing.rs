//! Test doubles for the environment traits.

use async_trait::async_trait;
use flumap_env::{ChoroplethQuery, ChoroplethTransport, EnvError, HttpResponse, MapContext};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Context whose sleeps return immediately and are recorded.
#[derive(Default)]
pub struct InstantContext {
    sleeps: Mutex<Vec<Duration>>,
}

impl InstantContext {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl MapContext for InstantContext {
    fn now(&self) -> Duration {
        self.sleeps().iter().sum()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }

    fn spawn<F>(&self, _name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future);
    }
}

/// Transport that replays a fixed script, then fails with a network error.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, EnvError>>>,
    queries: Mutex<Vec<ChoroplethQuery>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<HttpResponse, EnvError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, response: Result<HttpResponse, EnvError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<ChoroplethQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChoroplethTransport for ScriptedTransport {
    async fn get(&self, query: &ChoroplethQuery) -> Result<HttpResponse, EnvError> {
        self.queries.lock().unwrap().push(query.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EnvError::network("script exhausted")))
    }

    fn endpoint(&self) -> String {
        "scripted".to_string()
    }
}

/// Minimal valid nation-level body.
pub fn nation_body() -> String {
    json!({
        "data": [{
            "type": "choropleth",
            "locations": ["19167", "06037"],
            "z": [1200, 0],
            "coloraxis": "coloraxis"
        }],
        "layout": {"margin": {"r": 0, "t": 0, "l": 0, "b": 0}}
    })
    .to_string()
}

/// Valid state-level body with bounds.
pub fn state_body(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> String {
    json!({
        "data": [{
            "type": "choropleth",
            "locations": ["19167"],
            "z": [1200],
            "coloraxis": "coloraxis"
        }],
        "layout": {},
        "bounds": {"bounds": {
            "min_lon": min_lon, "max_lon": max_lon,
            "min_lat": min_lat, "max_lat": max_lat
        }}
    })
    .to_string()
}
