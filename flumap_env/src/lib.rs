//! FluMap Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the FluMap core run
//! against a **Production** backend (tokio + reqwest) or a **Simulated**
//! one (virtual clock + scripted responses).
//!
//! # Core Concept
//!
//! Everything the fetch controller would otherwise do directly is intercepted:
//! - Time (`now()`, `sleep()`) - the retry backoff is observable in tests
//! - Network (`get()`) - one choropleth round trip per call
//! - Tasks (`spawn()`) - overlapping fetches after rapid re-selection
//!
//! # Example
//!
//! ```ignore
//! use flumap_env::{MapContext, ChoroplethTransport, ChoroplethQuery};
//!
//! async fn fetch_once<Ctx: MapContext, T: ChoroplethTransport>(
//!     ctx: &Ctx,
//!     transport: &T,
//! ) {
//!     let query = ChoroplethQuery::new(Some("IA"), None);
//!     match transport.get(&query).await {
//!         Ok(resp) if resp.is_success() => handle(resp.body),
//!         _ => ctx.sleep(Duration::from_secs(1)).await,
//!     }
//! }
//! ```

mod context;
mod transport;
mod types;
mod error;
mod tokio_impl;
#[cfg(feature = "http")]
mod http_impl;

pub use context::MapContext;
pub use transport::{ChoroplethTransport, TransportController};
pub use types::{ChoroplethQuery, HttpResponse, CHOROPLETH_PATH};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
#[cfg(feature = "http")]
pub use http_impl::HttpTransport;
