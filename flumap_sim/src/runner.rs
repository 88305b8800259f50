//! Scenario runner - drives the real view against the simulated backend.

use crate::backend::{Fault, SimBackend};
use crate::context::SimContext;
use crate::fixtures::{Fixtures, STATES};
use crate::scenarios::ScenarioId;

use flumap_core::assembler::{ColorAxis, DragMode};
use flumap_core::framing::{ALASKA_COUNTY_CORRECTION, HAWAII_STATE_CORRECTION};
use flumap_core::traces::{scale_value, FLAT_SCALE, MAGNITUDE_SCALE};
use flumap_core::view::failure_message;
use flumap_core::{
    compute_framing, dynamic_scale, ChoroplethView, Framing, MapConfig, RefreshOutcome,
    RenderSpec, Selection, ViewState, ViewportClass,
};
use flumap_env::{MapContext, TransportController};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// The view type every scenario drives.
pub type SimView = ChoroplethView<SimContext, SimBackend>;

/// Why a scenario did not pass.
#[derive(Debug, Error)]
pub enum ScenarioFailure {
    #[error("runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("task: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Assertion(String),
}

fn ensure(condition: bool, message: impl Into<String>) -> Result<(), ScenarioFailure> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioFailure::Assertion(message.into()))
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Virtual time elapsed, backoff and latency included
    pub virtual_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,

    /// Frame on screen when the scenario ended
    pub final_spec: Option<Arc<RenderSpec>>,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    /// Requests the backend received
    pub requests: usize,

    /// Backoff sleeps taken
    pub backoff_sleeps: usize,

    pub committed: usize,
    pub discarded: usize,
    pub failed: usize,
}

/// One simulated deployment: clock, backend and view.
#[derive(Clone)]
pub struct Harness {
    pub context: Arc<SimContext>,
    pub backend: Arc<SimBackend>,
    pub view: Arc<SimView>,
    outcomes: Arc<Mutex<Vec<RefreshOutcome>>>,
}

impl Harness {
    pub fn new(seed: u64, config: &MapConfig) -> Self {
        let context = SimContext::shared();
        let backend = Arc::new(SimBackend::new(seed, context.clone()));
        let view = Arc::new(ChoroplethView::new(context.clone(), backend.clone(), config));
        Self {
            context,
            backend,
            view,
            outcomes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Runs one refresh and records its outcome.
    pub async fn refresh(&self, selection: Selection) -> RefreshOutcome {
        let outcome = self.view.refresh(selection).await;
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
        outcome
    }

    /// The frame on screen, or an assertion failure when there is none.
    pub fn spec(&self) -> Result<Arc<RenderSpec>, ScenarioFailure> {
        self.view
            .current_spec()
            .ok_or_else(|| ScenarioFailure::Assertion("no frame on screen".to_string()))
    }

    /// Framing the view should produce for a selection of fixture data.
    pub fn expected_framing(&self, selection: &Selection) -> Framing {
        let selection = selection.clone().normalized();
        let bounds = selection
            .state
            .as_deref()
            .and_then(Fixtures::state)
            .map(|s| s.padded_bounds());
        compute_framing(
            bounds.as_ref(),
            selection.is_county_view(),
            selection.state.as_deref(),
            self.view.viewport(),
        )
    }

    pub fn metrics(&self) -> ScenarioMetrics {
        let outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        let count = |f: fn(&RefreshOutcome) -> bool| outcomes.iter().filter(|o| f(o)).count();
        ScenarioMetrics {
            requests: self.backend.request_count(),
            backoff_sleeps: self.context.sleeps().len(),
            committed: count(|o| matches!(o, RefreshOutcome::Committed { .. })),
            discarded: count(|o| matches!(o, RefreshOutcome::Discarded { .. })),
            failed: count(|o| matches!(o, RefreshOutcome::Failed { .. })),
        }
    }
}

fn frame_matches(spec: &RenderSpec, framing: &Framing) -> bool {
    let geo = &spec.layout.geo;
    geo.center == framing.center
        && geo.projection.scale == framing.scale
        && geo.lonaxis.range == framing.lon_range
        && geo.lataxis.range == framing.lat_range
        && geo.aspectratio == framing.aspect_ratio
}

fn all_traces_use(spec: &RenderSpec, scale: Value) -> bool {
    spec.data.iter().all(|t| t.colorscale.as_ref() == Some(&scale))
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// View configuration (retry policy, viewport)
    config: MapConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: MapConfig::default(),
        }
    }

    /// Sets the viewport class the view renders for.
    pub fn with_viewport(mut self, viewport: ViewportClass) -> Self {
        self.config = self.config.with_viewport(viewport);
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let harness = Harness::new(self.seed, &self.config);
        let outcome = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ScenarioFailure::from)
            .and_then(|runtime| runtime.block_on(self.drive(scenario, &harness)));

        let failure_reason = outcome.err().map(|e| e.to_string());
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            virtual_time_secs: harness.context.now().as_secs_f64(),
            failure_reason,
            metrics: harness.metrics(),
            final_spec: harness.view.current_spec(),
        }
    }

    async fn drive(&self, scenario: ScenarioId, h: &Harness) -> Result<(), ScenarioFailure> {
        match scenario {
            ScenarioId::NationView => self.run_nation_view(h).await,
            ScenarioId::StateZoom => self.run_state_zoom(h).await,
            ScenarioId::CountyZoom => self.run_county_zoom(h).await,
            ScenarioId::FlakyBackend => self.run_flaky_backend(h).await,
            ScenarioId::BackendDown => self.run_backend_down(h).await,
            ScenarioId::RapidReselect => self.run_rapid_reselect(h).await,
            ScenarioId::MalformedBody => self.run_malformed_body(h).await,
            ScenarioId::Chaos => self.run_chaos(h).await,
        }
    }

    /// SIM-001: no selection renders the fixed nation frame.
    async fn run_nation_view(&self, h: &Harness) -> Result<(), ScenarioFailure> {
        let outcome = h.refresh(Selection::nation()).await;
        ensure(
            outcome == RefreshOutcome::Committed { generation: 1 },
            format!("expected first commit, got {:?}", outcome),
        )?;

        let spec = h.spec()?;
        ensure(
            frame_matches(&spec, &Framing::nation(self.config.viewport)),
            format!("nation frame mismatch: {:?}", spec.layout.geo.center),
        )?;
        ensure(spec.layout.dragmode == DragMode::Zoom, "nation view must zoom")?;
        ensure(
            all_traces_use(&spec, scale_value(MAGNITUDE_SCALE)),
            "nation traces must use the magnitude scale",
        )?;
        ensure(
            matches!(spec.layout.coloraxis, ColorAxis::Magnitude { .. }),
            "nation view must show the colour bar",
        )?;
        ensure(
            spec.layout.title.is_some() != self.config.viewport.is_compact(),
            "title is shown on desktop only",
        )
    }

    /// SIM-002: every fixture state is framed from its padded bounds.
    async fn run_state_zoom(&self, h: &Harness) -> Result<(), ScenarioFailure> {
        for state in STATES {
            let selection = Selection::state(state.code);
            let outcome = h.refresh(selection.clone()).await;
            ensure(
                matches!(outcome, RefreshOutcome::Committed { .. }),
                format!("{}: {:?}", state.code, outcome),
            )?;

            let spec = h.spec()?;
            let expected = h.expected_framing(&selection);
            ensure(
                frame_matches(&spec, &expected),
                format!("{}: frame {:?} != {:?}", state.code, spec.layout.geo.center, expected.center),
            )?;
            ensure(
                spec.layout
                    .geo
                    .aspectratio
                    .is_some_and(|a| a.x >= 1.0 && a.y >= 1.0),
                format!("{}: inverted aspect ratio", state.code),
            )?;
            ensure(
                spec.layout.geo.passthrough.contains_key("coastlinecolor")
                    && !spec.layout.geo.passthrough.contains_key("projection"),
                format!("{}: backend geo keys not merged", state.code),
            )?;

            if state.code == "HI" {
                let b = state.padded_bounds();
                let uncorrected = dynamic_scale(false, b.lon_span(), b.lat_span());
                ensure(
                    spec.layout.geo.projection.scale == uncorrected * HAWAII_STATE_CORRECTION,
                    "Hawaii state scale not corrected",
                )?;
            }
            debug!("{} framed at scale {:.3}", state.code, spec.layout.geo.projection.scale);
        }
        Ok(())
    }

    /// SIM-003: an Alaska county gets the inset correction and flat shading.
    async fn run_county_zoom(&self, h: &Harness) -> Result<(), ScenarioFailure> {
        let selection = Selection::county("AK", "Anchorage");
        h.refresh(selection.clone()).await;
        let spec = h.spec()?;

        let alaska = Fixtures::state("AK")
            .ok_or_else(|| ScenarioFailure::Assertion("no Alaska fixture".to_string()))?;
        let b = alaska.padded_bounds();
        let expected_scale = dynamic_scale(true, b.lon_span(), b.lat_span()) * ALASKA_COUNTY_CORRECTION;
        ensure(
            spec.layout.geo.projection.scale == expected_scale,
            format!("scale {} != {}", spec.layout.geo.projection.scale, expected_scale),
        )?;
        ensure(frame_matches(&spec, &h.expected_framing(&selection)), "county frame mismatch")?;
        ensure(spec.layout.dragmode == DragMode::Pan, "county view must pan")?;
        ensure(spec.layout.showscale == Some(false), "county view hides the scale")?;
        ensure(
            matches!(spec.layout.coloraxis, ColorAxis::Hidden { showscale: false }),
            "county view must hide the colour axis",
        )?;
        ensure(
            all_traces_use(&spec, scale_value(FLAT_SCALE)),
            "county traces must use the flat scale",
        )?;
        ensure(
            spec.data.iter().all(|t| t.coloraxis == Some(Value::Null)),
            "county traces must drop the shared colour axis",
        )?;
        ensure(
            h.backend.requests() == vec![selection.query()],
            "county query not forwarded",
        )
    }

    /// SIM-004: two connection failures, then success.
    async fn run_flaky_backend(&self, h: &Harness) -> Result<(), ScenarioFailure> {
        h.backend.fail_next(2);
        let outcome = h.refresh(Selection::state("IA")).await;
        ensure(
            matches!(outcome, RefreshOutcome::Committed { .. }),
            format!("expected commit after retries, got {:?}", outcome),
        )?;
        ensure(h.backend.request_count() == 3, "expected exactly 3 requests")?;
        ensure(
            h.context.sleeps() == vec![Duration::from_secs(1), Duration::from_secs(2)],
            format!("backoff schedule {:?}", h.context.sleeps()),
        )
    }

    /// SIM-005: exhausted retries publish a failure over the last good frame.
    async fn run_backend_down(&self, h: &Harness) -> Result<(), ScenarioFailure> {
        h.refresh(Selection::nation()).await;
        let good = h.spec()?;

        h.backend.status_next(503, 3);
        let outcome = h.refresh(Selection::state("MN")).await;
        let RefreshOutcome::Failed { generation, error } = outcome else {
            return Err(ScenarioFailure::Assertion(format!("expected failure, got {:?}", outcome)));
        };
        ensure(generation == 2, "failure must belong to the second cycle")?;

        let state = h.view.current();
        ensure(
            state.error_message() == Some(failure_message(&error).as_str()),
            format!("unexpected message {:?}", state.error_message()),
        )?;
        ensure(
            error.last_failure().to_string() == "HTTP error! status: 503",
            format!("last failure {}", error.last_failure()),
        )?;
        ensure(
            state.spec().is_some_and(|s| Arc::ptr_eq(s, &good)),
            "previous frame must survive the failure",
        )?;
        ensure(h.backend.request_count() == 4, "expected 1 + 3 requests")
    }

    /// SIM-006: a late response for an abandoned selection is discarded.
    async fn run_rapid_reselect(&self, h: &Harness) -> Result<(), ScenarioFailure> {
        let first = Selection::state("CA");
        let second = Selection::state("IA");
        h.backend.hold(true);

        let slow = {
            let h = h.clone();
            let selection = first.clone();
            tokio::spawn(async move { h.refresh(selection).await })
        };
        h.backend.wait_for_requests(1).await;

        let fast = {
            let h = h.clone();
            let selection = second.clone();
            tokio::spawn(async move { h.refresh(selection).await })
        };
        h.backend.wait_for_requests(2).await;

        ensure(h.backend.release(&second.query()), "second request not held")?;
        let fast_outcome = fast.await?;
        ensure(
            fast_outcome == RefreshOutcome::Committed { generation: 2 },
            format!("second selection: {:?}", fast_outcome),
        )?;

        ensure(h.backend.release(&first.query()), "first request not held")?;
        let slow_outcome = slow.await?;
        ensure(
            slow_outcome == RefreshOutcome::Discarded { generation: 1 },
            format!("late response was not discarded: {:?}", slow_outcome),
        )?;

        let state = h.view.current();
        ensure(
            matches!(state, ViewState::Ready { generation: 2, .. }),
            format!("view left at {:?}", state.generation()),
        )?;
        ensure(
            frame_matches(&*h.spec()?, &h.expected_framing(&second)),
            "view must show the second selection",
        )
    }

    /// SIM-007: malformed bodies are retried like network failures.
    async fn run_malformed_body(&self, h: &Harness) -> Result<(), ScenarioFailure> {
        h.backend.inject([Fault::Garbled, Fault::MissingData]);
        let outcome = h.refresh(Selection::state("LA")).await;
        ensure(
            matches!(outcome, RefreshOutcome::Committed { .. }),
            format!("expected recovery, got {:?}", outcome),
        )?;
        ensure(h.backend.request_count() == 3, "expected exactly 3 requests")?;

        h.backend.garble_next(3);
        let outcome = h.refresh(Selection::nation()).await;
        let RefreshOutcome::Failed { error, .. } = outcome else {
            return Err(ScenarioFailure::Assertion(format!("expected failure, got {:?}", outcome)));
        };
        ensure(
            error
                .last_failure()
                .to_string()
                .starts_with("Failed to parse response: <!DOCTYPE html>"),
            format!("unexpected parse error: {}", error.last_failure()),
        )
    }

    /// SIM-008: seeded selections against a lossy backend.
    async fn run_chaos(&self, h: &Harness) -> Result<(), ScenarioFailure> {
        const ROUNDS: usize = 12;

        h.backend.set_failure_rate(0.4);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut last_good: Option<Arc<RenderSpec>> = None;

        for round in 0..ROUNDS {
            let selection = random_selection(&mut rng);
            let before = h.backend.request_count();
            let outcome = h.refresh(selection.clone()).await;
            let attempts = h.backend.request_count() - before;

            ensure(
                (1..=3).contains(&attempts),
                format!("round {}: {} attempts", round, attempts),
            )?;

            match outcome {
                RefreshOutcome::Committed { .. } => {
                    let spec = h.spec()?;
                    ensure(
                        frame_matches(&spec, &h.expected_framing(&selection)),
                        format!("round {}: wrong frame for {}", round, selection),
                    )?;
                    last_good = Some(spec);
                }
                RefreshOutcome::Failed { .. } => {
                    ensure(attempts == 3, format!("round {}: gave up early", round))?;
                    let kept = h.view.current_spec();
                    let preserved = match (&kept, &last_good) {
                        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                        (None, None) => true,
                        _ => false,
                    };
                    ensure(preserved, format!("round {}: previous frame lost", round))?;
                }
                RefreshOutcome::Discarded { .. } => {
                    return Err(ScenarioFailure::Assertion(format!(
                        "round {}: sequential refresh discarded",
                        round
                    )));
                }
            }
        }

        h.backend.heal_all();
        Ok(())
    }
}

/// Nation, a fixture state, or one of its counties.
fn random_selection(rng: &mut ChaCha8Rng) -> Selection {
    let state = &STATES[rng.gen_range(0..STATES.len())];
    match rng.gen_range(0..3) {
        0 => Selection::nation(),
        1 => Selection::state(state.code),
        _ => {
            let county = state.counties[rng.gen_range(0..state.counties.len())];
            Selection::county(state.code, county)
        }
    }
}
