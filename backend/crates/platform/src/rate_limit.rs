//! Rate Limiting Infrastructure
//!
//! Common rate limiting abstractions and implementations.
//!
//! Counters use fixed windows: a key's window starts at
//! `(now / window) * window`, so every key resets on the same boundaries.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

impl RateLimitResult {
    /// Seconds until the current window ends, at least 1
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let remaining_ms = (self.reset_at_ms - now_ms).max(0) as u64;
        remaining_ms.div_ceil(1000).max(1)
    }
}

/// Rate limit backend failure
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Invalid rate limit window")]
    InvalidWindow,

    #[error("Rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Check and increment the counter for `key`
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError>;
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    window_start_ms: i64,
    count: u32,
}

/// Process-local fixed-window counters
///
/// Counters are lost on restart and not shared between instances.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    counters: Mutex<HashMap<String, WindowCounter>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and increment against an explicit clock
    pub fn check_at(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let window_ms = config.window_ms();
        if window_ms <= 0 {
            return Err(RateLimitError::InvalidWindow);
        }
        let window_start_ms = (now_ms / window_ms) * window_ms;
        let reset_at_ms = window_start_ms + window_ms;

        let mut counters = self
            .counters
            .lock()
            .map_err(|_| RateLimitError::Unavailable("counter lock poisoned".to_string()))?;

        let counter = counters.entry(key.to_string()).or_insert(WindowCounter {
            window_start_ms,
            count: 0,
        });
        if counter.window_start_ms != window_start_ms {
            *counter = WindowCounter {
                window_start_ms,
                count: 0,
            };
        }

        if counter.count >= config.max_requests {
            return Ok(RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_at_ms,
            });
        }

        counter.count += 1;
        Ok(RateLimitResult {
            allowed: true,
            remaining: config.max_requests - counter.count,
            reset_at_ms,
        })
    }

    /// Drop counters whose window ended before `now_ms`
    pub fn prune(&self, window_ms: i64, now_ms: i64) -> usize {
        let Ok(mut counters) = self.counters.lock() else {
            return 0;
        };
        let before = counters.len();
        counters.retain(|_, c| c.window_start_ms + window_ms > now_ms);
        before - counters.len()
    }

    pub fn len(&self) -> usize {
        self.counters.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        self.check_at(key, config, now_ms())
    }
}

/// Current Unix time in milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 3_600_000;

    #[test]
    fn test_allows_up_to_limit() {
        let store = InMemoryRateLimitStore::new();
        let config = RateLimitConfig::new(3, 3600);
        let now = 10 * HOUR_MS + 5;

        for expected_remaining in [2, 1, 0] {
            let result = store.check_at("ip:1.2.3.4", &config, now).unwrap();
            assert!(result.allowed);
            assert_eq!(result.remaining, expected_remaining);
        }

        let result = store.check_at("ip:1.2.3.4", &config, now).unwrap();
        assert!(!result.allowed);
        assert_eq!(result.reset_at_ms, 11 * HOUR_MS);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = InMemoryRateLimitStore::new();
        let config = RateLimitConfig::new(1, 3600);

        assert!(store.check_at("a", &config, 0).unwrap().allowed);
        assert!(!store.check_at("a", &config, 0).unwrap().allowed);
        assert!(store.check_at("b", &config, 0).unwrap().allowed);
    }

    #[test]
    fn test_window_resets_on_boundary() {
        let store = InMemoryRateLimitStore::new();
        let config = RateLimitConfig::new(1, 3600);

        assert!(store.check_at("k", &config, HOUR_MS - 1).unwrap().allowed);
        assert!(!store.check_at("k", &config, HOUR_MS - 1).unwrap().allowed);
        assert!(store.check_at("k", &config, HOUR_MS).unwrap().allowed);
    }

    #[test]
    fn test_retry_after_secs() {
        let result = RateLimitResult {
            allowed: false,
            remaining: 0,
            reset_at_ms: 10_500,
        };
        assert_eq!(result.retry_after_secs(0), 11);
        assert_eq!(result.retry_after_secs(10_499), 1);
        assert_eq!(result.retry_after_secs(20_000), 1);
    }

    #[test]
    fn test_zero_window_rejected() {
        let store = InMemoryRateLimitStore::new();
        let config = RateLimitConfig::new(1, 0);
        assert!(matches!(
            store.check_at("k", &config, 0),
            Err(RateLimitError::InvalidWindow)
        ));
    }

    #[test]
    fn test_prune() {
        let store = InMemoryRateLimitStore::new();
        let config = RateLimitConfig::new(5, 3600);
        store.check_at("old", &config, 0).unwrap();
        store.check_at("new", &config, 2 * HOUR_MS).unwrap();

        assert_eq!(store.prune(HOUR_MS, 2 * HOUR_MS), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_trait_uses_wall_clock() {
        let store = InMemoryRateLimitStore::new();
        let config = RateLimitConfig::new(1, 60);
        let first = RateLimitStore::check_and_increment(&store, "k", &config)
            .await
            .unwrap();
        assert!(first.allowed);
        assert!(first.reset_at_ms > now_ms() - 1);
    }
}
