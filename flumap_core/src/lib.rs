//! FluMap Core - Choropleth framing and fetch control for outbreak maps
//!
//! Turns a location selection into one render-ready frame:
//! 1. **Fetch**: one logical request with bounded retry and generation guarding
//! 2. **Validate**: structural check of the backend payload
//! 3. **Shade**: per-granularity trace colouring (magnitude vs. flat outline)
//! 4. **Frame**: projection center/scale/axis ranges from the region bounds
//! 5. **Assemble**: an immutable `RenderSpec` for a plotly-style geo renderer

pub mod config;
pub mod error;
pub mod selection;
pub mod payload;
pub mod validation;
pub mod traces;
pub mod framing;
pub mod assembler;
pub mod fetch;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use config::{MapConfig, RetryPolicy, ViewportClass};
pub use error::{FetchError, FramingError};
pub use selection::{Granularity, Selection, SelectionStore};
pub use payload::{Bounds, BoundsEnvelope, ChoroplethPayload, GeoPoint, Trace};
pub use validation::{validate_body, validate_value};
pub use traces::{process_traces, ProcessedTraces, ShadingMode};
pub use framing::{compute_framing, dynamic_scale, AspectRatio, Framing};
pub use assembler::{assemble, render, PlotConfig, RenderSpec};
pub use fetch::{FetchController, FetchState};
pub use view::{ChoroplethView, RefreshOutcome, ViewState};
