//! Simulation context implementing MapContext for deterministic testing.

use async_trait::async_trait;
use flumap_env::MapContext;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::Instrument;

/// Simulation context backed by a virtual clock.
///
/// - `sleep` advances virtual time instantly and records the duration,
///   so backoff schedules can be asserted without waiting them out
/// - `spawn` runs on the ambient tokio runtime
pub struct SimContext {
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Every duration passed to `sleep`, in call order
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl SimContext {
    pub fn new() -> Self {
        Self {
            virtual_time_ns: Arc::new(Mutex::new(0)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        *time = time.saturating_add(nanos);
    }

    /// Sets the virtual time to a specific value.
    pub fn set_time(&self, time_ns: u64) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        *time = time_ns;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Durations passed to `sleep` so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Forgets recorded sleeps (virtual time is kept).
    pub fn clear_sleeps(&self) {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for SimContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            sleeps: Arc::clone(&self.sleeps),
        }
    }
}

#[async_trait]
impl MapContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        self.advance_time(duration);
        // Give other in-flight cycles a chance to run, as a real sleep would.
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!("sim_task", name = %name);
        tokio::spawn(future.instrument(span));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new();
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));

        ctx.set_time(0);
        assert_eq!(ctx.now(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_sleep_is_recorded_and_advances_clock() {
        let ctx = SimContext::new();
        ctx.sleep(Duration::from_secs(1)).await;
        ctx.sleep(Duration::from_secs(2)).await;

        assert_eq!(ctx.sleeps(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(ctx.now(), Duration::from_secs(3));

        ctx.clear_sleeps();
        assert!(ctx.sleeps().is_empty());
        assert_eq!(ctx.now(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_huge_sleep_saturates_clock() {
        let ctx = SimContext::new();
        ctx.advance_time(Duration::from_secs(1));
        ctx.sleep(Duration::MAX).await;
        assert_eq!(ctx.time_ns(), u64::MAX);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.time_ns(), u64::MAX);
    }

    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new();
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));

        assert_eq!(ctx1.now(), ctx2.now());
    }
}
