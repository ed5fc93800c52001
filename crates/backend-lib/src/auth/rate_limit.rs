// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Rate limiting for authentication attempts.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Default number of failed attempts before rate limiting
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration (5 minutes)
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// How long a failure is remembered when no lockout follows
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

/// Rate limiter for authentication attempts
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    /// Map of IP addresses to rate limit entries
    attempts: Arc<DashMap<IpAddr, RateLimitEntry>>,
    /// Maximum number of failed attempts before lockout (0 disables limiting)
    max_attempts: u32,
    /// Duration of lockout period
    lockout_duration: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_DURATION)
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

    fn enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Record a failed authentication attempt
    pub fn record_failed_attempt(&self, ip: IpAddr) {
        if !self.enabled() {
            return;
        }
        let now = Instant::now();

        let mut entry = self.attempts.entry(ip).or_insert_with(|| RateLimitEntry {
            failed_attempts: 0,
            last_failure: now,
            lockout_expiry: None,
        });

        // A finished lockout starts a fresh count
        if entry.lockout_expiry.is_some_and(|expiry| now >= expiry) {
            entry.failed_attempts = 0;
            entry.lockout_expiry = None;
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_attempts && entry.lockout_expiry.is_none() {
            entry.lockout_expiry = Some(now + self.lockout_duration);
            warn!(
                %ip,
                attempts = entry.failed_attempts,
                lockout_secs = self.lockout_duration.as_secs(),
                "client locked out after repeated failed logins"
            );
        }
    }

    /// Record a successful authentication
    pub fn record_success(&self, ip: IpAddr) {
        self.attempts.remove(&ip);
    }

    /// Check if an IP is allowed to attempt authentication
    pub fn check_rate_limit(&self, ip: IpAddr) -> bool {
        match self.attempts.get(&ip) {
            Some(entry) => entry
                .lockout_expiry
                .is_none_or(|expiry| Instant::now() >= expiry),
            None => true,
        }
    }

    /// Clean up expired lockouts and stale failure counts
    pub fn cleanup(&self) {
        let now = Instant::now();

        self.attempts.retain(|_, entry| match entry.lockout_expiry {
            Some(expiry) => now < expiry,
            None => now.duration_since(entry.last_failure) < FAILURE_MEMORY,
        });
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.attempts.len()
    }
}
