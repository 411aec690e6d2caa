//! Application Configuration
//!
//! Configuration for the polls application layer.

use crate::domain::fairness::FairnessPolicy;
use platform::rate_limit::RateLimitConfig;
use std::time::Duration;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Poll application configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Per-signal vote limits
    pub fairness: FairnessPolicy,
    /// Max distance between audit entries folded into one voter
    pub dedup_window: Duration,
    /// Polls older than this are swept
    pub retention: Duration,
    /// Interval between expiry sweeps
    pub sweep_interval: Duration,
    /// Cookie name for the visitor token
    pub visitor_cookie_name: String,
    /// Visitor cookie lifetime
    pub visitor_cookie_ttl: Duration,
    /// Secret key for HMAC signing of visitor tokens (32 bytes)
    pub visitor_secret: [u8; 32],
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Requests per address across the whole poll API
    pub api_rate_limit: RateLimitConfig,
    /// Poll creation requests per address
    pub create_rate_limit: RateLimitConfig,
    /// Vote requests per address and poll
    pub vote_rate_limit: RateLimitConfig,
    /// Trust the first X-Forwarded-For entry as the client address
    pub trust_forwarded_for: bool,
    /// Per-room buffer of the live broadcast channel
    pub broadcast_capacity: usize,
    /// Base URL used to build shareable links
    pub frontend_url: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            fairness: FairnessPolicy::default(),
            dedup_window: Duration::from_secs(2),
            retention: Duration::from_secs(30 * 24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            visitor_cookie_name: "poll_visitor".to_string(),
            visitor_cookie_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            visitor_secret: [0u8; 32],
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            api_rate_limit: RateLimitConfig::new(100, 15 * 60),
            create_rate_limit: RateLimitConfig::new(5, 60 * 60),
            vote_rate_limit: RateLimitConfig::new(10, 60 * 60),
            trust_forwarded_for: false,
            broadcast_capacity: 64,
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

impl PollConfig {
    /// Create config with a random visitor secret
    pub fn with_random_secret() -> Self {
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&platform::crypto::random_bytes(32));
        Self {
            visitor_secret: secret,
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    /// Link a visitor can open to vote on `poll_id`
    pub fn shareable_link(&self, poll_id: &str) -> String {
        format!("{}/poll/{}", self.frontend_url.trim_end_matches('/'), poll_id)
    }
}
