// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Lockout of client addresses after repeated failed logins.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AuthRateLimitSettings;

/// How long a failure counter survives without new failures
const FAILURE_MEMORY: Duration = Duration::from_secs(24 * 60 * 60);

/// Entry in the rate limit map
#[derive(Debug, Clone)]
struct RateLimitEntry {
    /// Number of failed attempts
    failed_attempts: u32,
    /// Time of the last failed attempt
    last_failure: Instant,
    /// When the lockout expires, if locked out
    lockout_expiry: Option<Instant>,
}

/// Rate limiter for login attempts
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    /// Map of IP addresses to rate limit entries
    attempts: Arc<DashMap<IpAddr, RateLimitEntry>>,
    /// Maximum number of failed attempts before lockout
    max_attempts: u32,
    /// Duration of lockout period
    lockout_duration: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::from_settings(&AuthRateLimitSettings::default())
    }
}

impl AuthRateLimiter {
    /// Create a new auth rate limiter
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    pub fn from_settings(settings: &AuthRateLimitSettings) -> Self {
        Self::new(settings.max_attempts, Duration::from_secs(settings.lockout_secs))
    }

    /// Claim one login attempt for `ip`.
    ///
    /// The attempt counts as failed until [`record_success`](Self::record_success)
    /// or [`release`](Self::release) says otherwise. Returns `false` while the
    /// address is locked out. At most `max_attempts` calls succeed per window,
    /// concurrent ones included.
    pub fn try_begin(&self, ip: IpAddr) -> bool {
        let now = Instant::now();

        let mut entry = self.attempts.entry(ip).or_insert_with(|| RateLimitEntry {
            failed_attempts: 0,
            last_failure: now,
            lockout_expiry: None,
        });

        match entry.lockout_expiry {
            Some(expiry) if now < expiry => return false,
            // A served lockout starts a fresh count
            Some(_) => {
                entry.failed_attempts = 0;
                entry.lockout_expiry = None;
            },
            None => {},
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_attempts {
            entry.lockout_expiry = Some(now + self.lockout_duration);
            tracing::warn!(%ip, attempts = entry.failed_attempts, "client locked out of login");
        }
        true
    }

    /// Record a successful authentication
    pub fn record_success(&self, ip: IpAddr) {
        self.attempts.remove(&ip);
    }

    /// Give back an attempt that should not count as a failure
    pub fn release(&self, ip: IpAddr) {
        if let Some(mut entry) = self.attempts.get_mut(&ip) {
            entry.failed_attempts = entry.failed_attempts.saturating_sub(1);
            if entry.failed_attempts < self.max_attempts {
                entry.lockout_expiry = None;
            }
        }
    }

    /// Clean up expired lockouts and stale counters
    pub fn cleanup(&self) {
        let now = Instant::now();

        self.attempts.retain(|_, entry| match entry.lockout_expiry {
            Some(expiry) => now < expiry,
            None => now.duration_since(entry.last_failure) < FAILURE_MEMORY,
        });
    }

    /// Sweep the map once per `interval`, forever
    pub fn spawn_cleanup_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                limiter.cleanup();
            }
        })
    }
}
