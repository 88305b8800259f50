//! Backend transport abstraction for the FluMap view.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{ChoroplethQuery, HttpResponse};

/// Abstraction for one round trip to the choropleth endpoint.
///
/// # Implementations
///
/// - **Production**: `HttpTransport` - reqwest against a live backend
/// - **Simulation**: `SimBackend` - scripted responses, latency, faults
///
/// # Request Flow
///
/// ```text
/// View                     Transport                   Backend
///   |                          |                          |
///   |-- get(query) ----------->|                          |
///   |                          |-- GET /api/map/... ----->|
///   |                          |<-- status + body --------|
///   |<-- HttpResponse ---------|                          |
/// ```
#[async_trait]
pub trait ChoroplethTransport: Send + Sync + 'static {
    /// Performs a single GET for the given query.
    ///
    /// # Returns
    /// * `Ok(HttpResponse)` - The backend answered (any status)
    /// * `Err(EnvError)` - No response was obtained
    ///
    /// # Note
    /// A non-2xx status is still `Ok`; classifying it is the caller's job.
    async fn get(&self, query: &ChoroplethQuery) -> Result<HttpResponse, EnvError>;

    /// Human-readable endpoint description (for logging).
    fn endpoint(&self) -> String;
}

/// Fault injection for simulated backends.
pub trait TransportController: Send + Sync {
    /// The next `count` requests fail with a connection error.
    fn fail_next(&self, count: usize);

    /// The next `count` requests answer with the given status.
    fn status_next(&self, status: u16, count: usize);

    /// The next `count` requests answer 200 with an unparsable body.
    fn garble_next(&self, count: usize);

    /// Sets the response latency in milliseconds.
    fn set_latency(&self, latency_ms: u64);

    /// Clears all pending faults.
    fn heal_all(&self);
}
