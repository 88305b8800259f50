//! Simulated choropleth backend with fault injection.

use crate::context::SimContext;
use crate::fixtures::Fixtures;
use async_trait::async_trait;
use flumap_env::{ChoroplethQuery, ChoroplethTransport, EnvError, HttpResponse, TransportController};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::debug;

/// How a single request misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// No response at all
    Connection,
    /// Non-2xx status
    Status(u16),
    /// 200 with a body that is not JSON
    Garbled,
    /// 200 with JSON that has no `data` array
    MissingData,
}

/// A request parked until the scenario releases it.
struct Held {
    query: ChoroplethQuery,
    release: oneshot::Sender<()>,
}

struct BackendState {
    faults: VecDeque<Fault>,
    failure_rate: f64,
    rng: ChaCha8Rng,
    latency_ms: u64,
    hold: bool,
    held: Vec<Held>,
    log: Vec<ChoroplethQuery>,
}

/// In-process stand-in for the outbreak backend.
///
/// Answers from seeded fixtures. Faults come from an explicit queue first,
/// then from the seeded failure rate. In hold mode each request parks until
/// released, which lets a scenario pick the completion order of concurrent
/// fetches.
pub struct SimBackend {
    fixtures: Fixtures,
    context: Arc<SimContext>,
    state: Mutex<BackendState>,
    arrivals: watch::Sender<usize>,
}

impl SimBackend {
    pub fn new(seed: u64, context: Arc<SimContext>) -> Self {
        let (arrivals, _) = watch::channel(0);
        Self {
            fixtures: Fixtures::new(seed),
            context,
            state: Mutex::new(BackendState {
                faults: VecDeque::new(),
                failure_rate: 0.0,
                rng: ChaCha8Rng::seed_from_u64(seed.wrapping_mul(0x9e3779b97f4a7c15)),
                latency_ms: 0,
                hold: false,
                held: Vec::new(),
                log: Vec::new(),
            }),
            arrivals,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fixtures(&self) -> Fixtures {
        self.fixtures
    }

    /// Queues faults for the next requests, in order.
    pub fn inject(&self, faults: impl IntoIterator<Item = Fault>) {
        self.lock().faults.extend(faults);
    }

    /// Probability that an unscripted request fails with a connection error.
    pub fn set_failure_rate(&self, rate: f64) {
        self.lock().failure_rate = rate.clamp(0.0, 1.0);
    }

    /// Parks every subsequent request until released.
    pub fn hold(&self, enabled: bool) {
        self.lock().hold = enabled;
    }

    /// Releases the oldest held request for `query`.
    pub fn release(&self, query: &ChoroplethQuery) -> bool {
        let mut state = self.lock();
        match state.held.iter().position(|h| &h.query == query) {
            Some(index) => {
                let held = state.held.remove(index);
                held.release.send(()).is_ok()
            }
            None => false,
        }
    }

    /// Releases every held request and leaves hold mode.
    pub fn release_all(&self) {
        let mut state = self.lock();
        state.hold = false;
        for held in state.held.drain(..) {
            let _ = held.release.send(());
        }
    }

    /// Waits until at least `count` requests have arrived in total.
    pub async fn wait_for_requests(&self, count: usize) {
        let mut rx = self.arrivals.subscribe();
        let _ = rx.wait_for(|seen| *seen >= count).await;
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.lock().log.len()
    }

    /// Every query received, in arrival order.
    pub fn requests(&self) -> Vec<ChoroplethQuery> {
        self.lock().log.clone()
    }

    fn respond(&self, query: &ChoroplethQuery, fault: Option<Fault>) -> Result<HttpResponse, EnvError> {
        match fault {
            None => Ok(HttpResponse::ok(self.fixtures.body_for(query))),
            Some(Fault::Connection) => Err(EnvError::network("connection refused")),
            Some(Fault::Status(status)) => Ok(HttpResponse::new(status, "Internal Server Error")),
            Some(Fault::Garbled) => Ok(HttpResponse::ok("<!DOCTYPE html><html><body>Bad Gateway</body></html>")),
            Some(Fault::MissingData) => Ok(HttpResponse::ok(r#"{"error": "no data"}"#)),
        }
    }
}

#[async_trait]
impl ChoroplethTransport for SimBackend {
    async fn get(&self, query: &ChoroplethQuery) -> Result<HttpResponse, EnvError> {
        let (fault, gate, latency_ms, arrived) = {
            let mut state = self.lock();
            state.log.push(query.clone());
            let fault = match state.faults.pop_front() {
                Some(fault) => Some(fault),
                None => {
                    let rate = state.failure_rate;
                    (rate > 0.0 && state.rng.gen_bool(rate)).then_some(Fault::Connection)
                }
            };
            let gate = if state.hold {
                let (release, wait) = oneshot::channel();
                state.held.push(Held {
                    query: query.clone(),
                    release,
                });
                Some(wait)
            } else {
                None
            };
            (fault, gate, state.latency_ms, state.log.len())
        };
        self.arrivals.send_replace(arrived);
        debug!("backend request #{} for {} (fault: {:?})", arrived, query, fault);

        if latency_ms > 0 {
            self.context.advance_time(Duration::from_millis(latency_ms));
        }
        if let Some(wait) = gate {
            let _ = wait.await;
        }
        self.respond(query, fault)
    }

    fn endpoint(&self) -> String {
        "sim://backend".to_string()
    }
}

impl TransportController for SimBackend {
    fn fail_next(&self, count: usize) {
        self.inject(std::iter::repeat(Fault::Connection).take(count));
    }

    fn status_next(&self, status: u16, count: usize) {
        self.inject(std::iter::repeat(Fault::Status(status)).take(count));
    }

    fn garble_next(&self, count: usize) {
        self.inject(std::iter::repeat(Fault::Garbled).take(count));
    }

    fn set_latency(&self, latency_ms: u64) {
        self.lock().latency_ms = latency_ms;
    }

    fn heal_all(&self) {
        let mut state = self.lock();
        state.faults.clear();
        state.failure_rate = 0.0;
    }
}
