//! FluMap Deterministic Simulation Testing (DST) Harness
//!
//! Runs the real `ChoroplethView` against a simulated backend where every
//! source of non-determinism is controlled:
//! - **Time**: virtual clock; backoff sleeps are recorded, not waited out
//! - **Network**: scripted faults, seeded random failures, and gated
//!   requests whose completion order the scenario chooses
//! - **Data**: fixture payloads derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                       Harness                          │
//! │                                                        │
//! │   SimContext ◄──── ChoroplethView ────► SimBackend     │
//! │  (virtual clock)    (real core)        (faults, gates) │
//! │                                             │          │
//! │                                         Fixtures       │
//! │                                   (seeded payloads)    │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use flumap_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::RapidReselect);
//! assert!(result.passed);
//! ```

mod context;
mod backend;
mod fixtures;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use backend::{Fault, SimBackend};
pub use fixtures::{Fixtures, StateFixture};
pub use runner::{Harness, ScenarioFailure, ScenarioMetrics, ScenarioResult, ScenarioRunner, SimView};
