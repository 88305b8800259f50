//! Fetch Controller - one logical fetch with bounded retry and staleness guard.
//!
//! # State Machine
//!
//! ```text
//!              begin()                      payload ok
//!   Idle ──────────────► Fetching(g, 1) ─────────────────► Succeeded(g)
//!                          │    ▲
//!            retryable err │    │ backoff 1s, 2s, ...
//!                          ▼    │
//!                        Fetching(g, k) ── k == max ─────► FailedTerminal(g)
//!
//!   begin() from any state ──► Fetching(g + 1, 1)
//! ```
//!
//! Every cycle is tagged with a generation from an owned monotonic counter.
//! Only the latest generation may move the state machine; a cycle that
//! finds itself superseded stops retrying and reports `Superseded`.

use crate::config::RetryPolicy;
use crate::error::FetchError;
use crate::payload::ChoroplethPayload;
use crate::selection::Selection;
use crate::validation::validate_body;
use flumap_env::{ChoroplethQuery, ChoroplethTransport, EnvError, MapContext};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Fetch cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching { generation: u64, attempt: u32 },
    Succeeded { generation: u64 },
    FailedTerminal { generation: u64 },
}

/// Retry-governed fetcher generic over the environment.
pub struct FetchController<Ctx, T>
where
    Ctx: MapContext,
    T: ChoroplethTransport,
{
    context: Arc<Ctx>,
    transport: Arc<T>,
    policy: RetryPolicy,

    /// Latest issued generation (0 = none yet)
    generation: AtomicU64,

    state: Mutex<FetchState>,
}

impl<Ctx, T> FetchController<Ctx, T>
where
    Ctx: MapContext,
    T: ChoroplethTransport,
{
    pub fn new(context: Arc<Ctx>, transport: Arc<T>, policy: RetryPolicy) -> Self {
        Self {
            context,
            transport,
            policy,
            generation: AtomicU64::new(0),
            state: Mutex::new(FetchState::Idle),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn state(&self) -> FetchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest_generation() == generation
    }

    /// Issues a new generation, superseding any cycle in flight.
    pub fn begin(&self) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *state = FetchState::Fetching {
            generation,
            attempt: 1,
        };
        generation
    }

    /// Begins a new generation and runs it to completion.
    pub async fn fetch(&self, selection: &Selection) -> Result<ChoroplethPayload, FetchError> {
        let generation = self.begin();
        self.run(generation, selection).await
    }

    /// Runs the retry loop for an already-issued generation.
    pub async fn run(
        &self,
        generation: u64,
        selection: &Selection,
    ) -> Result<ChoroplethPayload, FetchError> {
        let query = selection.query();
        let max_attempts = self.policy.max_attempts;
        let mut last = FetchError::NetworkFailure("no attempt made".to_string());
        let mut attempts_made = 0;

        for attempt in 1..=max_attempts {
            if let Some(delay) = self.policy.delay_before(attempt) {
                debug!("gen {} backing off {:?} before attempt {}", generation, delay, attempt);
                self.context.sleep(delay).await;
            }

            self.ensure_current(generation)?;
            self.transition(generation, FetchState::Fetching { generation, attempt });
            attempts_made = attempt;

            match self.attempt(&query).await {
                Ok(payload) => {
                    self.ensure_current(generation)?;
                    self.transition(generation, FetchState::Succeeded { generation });
                    info!(
                        "Loaded choropleth for {} ({} traces, attempt {}/{})",
                        query,
                        payload.data.len(),
                        attempt,
                        max_attempts
                    );
                    return Ok(payload);
                }
                Err(err) => {
                    warn!(
                        "Error loading choropleth map (attempt {}/{}): {}",
                        attempt, max_attempts, err
                    );
                    let retryable = err.is_retryable();
                    last = err;
                    if !retryable {
                        break;
                    }
                }
            }
        }

        self.ensure_current(generation)?;
        self.transition(generation, FetchState::FailedTerminal { generation });
        Err(FetchError::RetriesExhausted {
            attempts: attempts_made,
            last: Box::new(last),
        })
    }

    /// One round trip: transport, status check, validation.
    async fn attempt(&self, query: &ChoroplethQuery) -> Result<ChoroplethPayload, FetchError> {
        let response = self.transport.get(query).await?;
        if !response.is_success() {
            return Err(EnvError::Status(response.status).into());
        }
        validate_body(&response.body)
    }

    fn ensure_current(&self, generation: u64) -> Result<(), FetchError> {
        let latest = self.latest_generation();
        if latest != generation {
            debug!("gen {} superseded by {}; discarding", generation, latest);
            return Err(FetchError::Superseded { generation, latest });
        }
        Ok(())
    }

    /// Moves the state machine, but only on behalf of the latest generation.
    fn transition(&self, generation: u64, next: FetchState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_current(generation) {
            *state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{nation_body, InstantContext, ScriptedTransport};
    use flumap_env::HttpResponse;
    use std::time::Duration;

    fn controller(
        script: Vec<Result<HttpResponse, EnvError>>,
    ) -> (
        FetchController<InstantContext, ScriptedTransport>,
        Arc<InstantContext>,
        Arc<ScriptedTransport>,
    ) {
        let ctx = Arc::new(InstantContext::default());
        let transport = Arc::new(ScriptedTransport::new(script));
        let ctl = FetchController::new(ctx.clone(), transport.clone(), RetryPolicy::default());
        (ctl, ctx, transport)
    }

    #[test]
    fn test_initial_state() {
        let (ctl, _, _) = controller(vec![]);
        assert_eq!(ctl.state(), FetchState::Idle);
        assert_eq!(ctl.latest_generation(), 0);
    }

    #[test]
    fn test_generations_are_monotonic() {
        let (ctl, _, _) = controller(vec![]);
        let g1 = ctl.begin();
        let g2 = ctl.begin();
        assert!(g2 > g1);
        assert!(!ctl.is_current(g1));
        assert_eq!(ctl.state(), FetchState::Fetching { generation: g2, attempt: 1 });
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let (ctl, ctx, transport) = controller(vec![Ok(HttpResponse::ok(nation_body()))]);
        let payload = ctl.fetch(&Selection::nation()).await.unwrap();
        assert_eq!(payload.data.len(), 1);
        assert_eq!(transport.calls(), 1);
        assert!(ctx.sleeps().is_empty());
        assert_eq!(ctl.state(), FetchState::Succeeded { generation: 1 });
    }

    #[tokio::test]
    async fn test_success_on_third_attempt() {
        let (ctl, ctx, transport) = controller(vec![
            Err(EnvError::network("connection refused")),
            Ok(HttpResponse::new(500, "oops")),
            Ok(HttpResponse::ok(nation_body())),
        ]);

        let result = ctl.fetch(&Selection::state("IA")).await;
        assert!(result.is_ok());
        assert_eq!(transport.calls(), 3);
        assert_eq!(
            ctx.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert_eq!(ctl.state(), FetchState::Succeeded { generation: 1 });
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_failure() {
        let (ctl, ctx, transport) = controller(vec![
            Err(EnvError::network("connection refused")),
            Ok(HttpResponse::ok("not json")),
            Ok(HttpResponse::new(503, "")),
        ]);

        let err = ctl.fetch(&Selection::nation()).await.unwrap_err();
        assert_eq!(transport.calls(), 3);
        assert_eq!(ctx.sleeps().len(), 2);
        match &err {
            FetchError::RetriesExhausted { attempts, last } => {
                assert_eq!(*attempts, 3);
                assert_eq!(last.to_string(), "HTTP error! status: 503");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctl.state(), FetchState::FailedTerminal { generation: 1 });
    }

    #[tokio::test]
    async fn test_exhaustion_counts_attempts_actually_made() {
        let ctx = Arc::new(InstantContext::default());
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let policy = RetryPolicy::new(4, Duration::from_millis(10));
        let ctl = FetchController::new(ctx.clone(), transport.clone(), policy);

        let err = ctl.fetch(&Selection::state("MN")).await.unwrap_err();
        match err {
            FetchError::RetriesExhausted { attempts, .. } => {
                assert_eq!(attempts as usize, transport.calls());
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctx.sleeps().len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_retried() {
        let (ctl, _, transport) = controller(vec![
            Ok(HttpResponse::ok(r#"{"layout": {}}"#)),
            Ok(HttpResponse::ok(nation_body())),
        ]);
        assert!(ctl.fetch(&Selection::nation()).await.is_ok());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_query_forwarded() {
        let (ctl, _, transport) = controller(vec![Ok(HttpResponse::ok(nation_body()))]);
        ctl.fetch(&Selection::county("AK", "Anchorage")).await.unwrap();
        assert_eq!(
            transport.queries(),
            vec![ChoroplethQuery::new(Some("AK"), Some("Anchorage"))]
        );
    }

    #[tokio::test]
    async fn test_superseded_generation_stops_retrying() {
        let (ctl, _, transport) = controller(vec![
            Err(EnvError::network("down")),
            Ok(HttpResponse::ok(nation_body())),
        ]);
        let ctl = Arc::new(ctl);

        let stale = ctl.begin();
        // A newer selection arrives before the stale cycle runs.
        let fresh = ctl.begin();

        let err = ctl.run(stale, &Selection::nation()).await.unwrap_err();
        assert_eq!(err, FetchError::Superseded { generation: stale, latest: fresh });
        assert_eq!(transport.calls(), 0);
        assert_eq!(ctl.state(), FetchState::Fetching { generation: fresh, attempt: 1 });
    }
}
