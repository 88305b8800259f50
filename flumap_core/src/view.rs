//! Choropleth View - owns the single "current RenderSpec" slot.
//!
//! This module wires the fetch controller to the pure pipeline and
//! publishes the result.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ChoroplethView                         │
//! │                                                              │
//! │  Selection ──► FetchController ──► Validator                 │
//! │                 (generation g)        │                      │
//! │                                ┌──────┴───────┐              │
//! │                                ▼              ▼              │
//! │                         TraceProcessor  FramingEngine        │
//! │                                └──────┬───────┘              │
//! │                                       ▼                      │
//! │                                  Assembler                   │
//! │                                       │  commit iff g latest │
//! │                                       ▼                      │
//! │                    watch::Sender<ViewState>  ──► renderers   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use flumap_core::{ChoroplethView, MapConfig, SelectionStore};
//! use flumap_env::{HttpTransport, TokioContext};
//!
//! let config = MapConfig::from_env();
//! let view = Arc::new(ChoroplethView::new(
//!     TokioContext::shared(),
//!     Arc::new(HttpTransport::new(&config.backend_url)),
//!     &config,
//! ));
//! let store = SelectionStore::new();
//! tokio::spawn(view.clone().run(store.subscribe()));
//! store.select_state("IA");
//! ```

use crate::assembler::{render, RenderSpec};
use crate::config::{MapConfig, ViewportClass};
use crate::error::FetchError;
use crate::fetch::FetchController;
use crate::selection::Selection;
use flumap_env::{ChoroplethTransport, MapContext};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// What the renderer should currently show.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// Nothing requested yet
    Idle,

    /// A fetch is in flight; the last good frame is kept for display
    Loading {
        generation: u64,
        previous: Option<Arc<RenderSpec>>,
    },

    Ready {
        generation: u64,
        spec: Arc<RenderSpec>,
    },

    /// Retries exhausted; the last good frame is preserved
    Failed {
        generation: u64,
        message: String,
        previous: Option<Arc<RenderSpec>>,
    },
}

impl ViewState {
    /// The frame to draw, if any.
    pub fn spec(&self) -> Option<&Arc<RenderSpec>> {
        match self {
            Self::Idle => None,
            Self::Loading { previous, .. } | Self::Failed { previous, .. } => previous.as_ref(),
            Self::Ready { spec, .. } => Some(spec),
        }
    }

    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Loading { generation, .. }
            | Self::Ready { generation, .. }
            | Self::Failed { generation, .. } => Some(*generation),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Result of one refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A new frame was published
    Committed { generation: u64 },

    /// A newer selection superseded this cycle; nothing was published
    Discarded { generation: u64 },

    /// Retries exhausted; the failure was published
    Failed { generation: u64, error: FetchError },
}

/// User-facing message for a terminal failure.
pub fn failure_message(error: &FetchError) -> String {
    format!(
        "Error loading choropleth map: {}. Please check if the backend server is running.",
        error.last_failure()
    )
}

/// The map view: fetch, derive, and publish one RenderSpec per selection.
pub struct ChoroplethView<Ctx, T>
where
    Ctx: MapContext,
    T: ChoroplethTransport,
{
    context: Arc<Ctx>,
    controller: FetchController<Ctx, T>,
    viewport: watch::Sender<ViewportClass>,
    slot: watch::Sender<ViewState>,
}

impl<Ctx, T> ChoroplethView<Ctx, T>
where
    Ctx: MapContext,
    T: ChoroplethTransport,
{
    pub fn new(context: Arc<Ctx>, transport: Arc<T>, config: &MapConfig) -> Self {
        let controller = FetchController::new(context.clone(), transport, config.retry);
        let (slot, _rx) = watch::channel(ViewState::Idle);
        let (viewport, _rx) = watch::channel(config.viewport);
        Self {
            context,
            controller,
            viewport,
            slot,
        }
    }

    pub fn controller(&self) -> &FetchController<Ctx, T> {
        &self.controller
    }

    pub fn viewport(&self) -> ViewportClass {
        *self.viewport.borrow()
    }

    /// Changes the viewport class. Returns true if it differed.
    ///
    /// A view driven by [`run`](Self::run) re-renders the current selection;
    /// otherwise the change applies on the next `refresh`.
    pub fn set_viewport(&self, viewport: ViewportClass) -> bool {
        self.viewport.send_if_modified(|current| {
            if *current == viewport {
                return false;
            }
            *current = viewport;
            true
        })
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> ViewState {
        self.slot.borrow().clone()
    }

    /// The current frame, if any.
    pub fn current_spec(&self) -> Option<Arc<RenderSpec>> {
        self.slot.borrow().spec().cloned()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.slot.subscribe()
    }

    /// Runs one full cycle for the selection.
    pub async fn refresh(&self, selection: Selection) -> RefreshOutcome {
        let selection = selection.normalized();
        let viewport = self.viewport();
        let generation = self.controller.begin();
        debug!("gen {} refresh {} ({:?})", generation, selection, viewport);

        self.commit(generation, |current| ViewState::Loading {
            generation,
            previous: current.spec().cloned(),
        });

        match self.controller.run(generation, &selection).await {
            Ok(payload) => {
                let spec = Arc::new(render(&payload, &selection, viewport));
                let committed = self.commit(generation, |_| ViewState::Ready {
                    generation,
                    spec: spec.clone(),
                });
                if committed {
                    info!("gen {} committed frame for {}", generation, selection);
                    RefreshOutcome::Committed { generation }
                } else {
                    debug!("gen {} finished after being superseded", generation);
                    RefreshOutcome::Discarded { generation }
                }
            }
            Err(FetchError::Superseded { .. }) => RefreshOutcome::Discarded { generation },
            Err(err) => {
                let message = failure_message(&err);
                let committed = self.commit(generation, |current| ViewState::Failed {
                    generation,
                    message: message.clone(),
                    previous: current.spec().cloned(),
                });
                if committed {
                    error!("{}", message);
                    RefreshOutcome::Failed {
                        generation,
                        error: err,
                    }
                } else {
                    RefreshOutcome::Discarded { generation }
                }
            }
        }
    }

    /// Follows a selection stream and the viewport class, one spawned
    /// refresh per change of either.
    ///
    /// Returns when the selection store is dropped. Earlier refreshes keep
    /// running in the background; the generation guard discards them.
    pub async fn run(self: Arc<Self>, mut selections: watch::Receiver<Selection>) {
        let mut viewports = self.viewport.subscribe();
        let initial = selections.borrow_and_update().clone();
        self.spawn_refresh(initial);

        loop {
            tokio::select! {
                changed = selections.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = viewports.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let viewport = *viewports.borrow_and_update();
                    debug!("viewport now {:?}; re-rendering", viewport);
                }
            }
            let next = selections.borrow_and_update().clone();
            self.spawn_refresh(next);
        }
        debug!("selection store closed; view loop exiting");
    }

    fn spawn_refresh(self: &Arc<Self>, selection: Selection) {
        let view = Arc::clone(self);
        self.context.spawn("choropleth-refresh", async move {
            view.refresh(selection).await;
        });
    }

    /// Publishes `build(current)` iff `generation` is still the latest.
    ///
    /// The check and the write happen under the slot's lock, so a superseded
    /// cycle can never interleave a partial update with a newer one.
    fn commit<F>(&self, generation: u64, build: F) -> bool
    where
        F: FnOnce(&ViewState) -> ViewState,
    {
        self.slot.send_if_modified(|current| {
            if !self.controller.is_current(generation) {
                return false;
            }
            *current = build(current);
            true
        })
    }
}
