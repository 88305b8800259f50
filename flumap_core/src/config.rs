//! Runtime configuration for the map view.

use std::time::Duration;

/// Environment variable that overrides the backend URL.
pub const BACKEND_URL_ENV: &str = "FLUMAP_BACKEND_URL";

/// Backend used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5020";

/// Viewport class supplied by the hosting shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewportClass {
    #[default]
    Desktop,
    /// Narrow screens (the shell's "mobile" breakpoint)
    Compact,
}

impl ViewportClass {
    /// Maps the shell's boolean compact flag.
    pub fn from_compact(compact: bool) -> Self {
        if compact {
            Self::Compact
        } else {
            Self::Desktop
        }
    }

    pub fn is_compact(self) -> bool {
        self == Self::Compact
    }
}

/// Bounded exponential backoff without jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 3)
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each later one (default: 1s)
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; at least one attempt is always made.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait before `attempt` (1-based). `None` for the first attempt.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt <= 1 {
            return None;
        }
        let factor = 2u32.checked_pow(attempt - 2).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }
}

/// Configuration for a choropleth view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapConfig {
    /// Backend base URL (default: http://127.0.0.1:5020)
    pub backend_url: String,

    /// Retry policy for the fetch controller
    pub retry: RetryPolicy,

    /// Initial viewport class
    pub viewport: ViewportClass,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            retry: RetryPolicy::default(),
            viewport: ViewportClass::Desktop,
        }
    }
}

impl MapConfig {
    /// Defaults, with the backend URL taken from `FLUMAP_BACKEND_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                config.backend_url = url.trim().to_string();
            }
        }
        config
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_viewport(mut self, viewport: ViewportClass) -> Self {
        self.viewport = viewport;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_config_default() {
        let config = MapConfig::default();
        assert_eq!(config.backend_url, "http://127.0.0.1:5020");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.viewport, ViewportClass::Desktop);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.delay_before(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_before(3), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_before(4), Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_before(60).is_some());
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_viewport_from_flag() {
        assert!(ViewportClass::from_compact(true).is_compact());
        assert!(!ViewportClass::from_compact(false).is_compact());
    }
}
