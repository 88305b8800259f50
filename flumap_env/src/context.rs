//! Core environment context trait for the FluMap view.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for environment interaction.
///
/// The fetch controller never touches `tokio::time` directly: backoff
/// delays go through [`MapContext::sleep`] so a simulated context can
/// record them and skip the wall-clock wait.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and `tokio::spawn`
/// - **Simulation**: `SimContext` - virtual clock, sleeps are recorded
#[async_trait]
pub trait MapContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    ///
    /// Used by the view to run one fetch cycle per selection change, so
    /// an older cycle may still be in flight when a newer one starts.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
