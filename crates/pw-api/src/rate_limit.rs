//! Rate limiting for the auth endpoints.
//!
//! Per-IP and global limits on register/login attempts using the governor
//! crate. The per-IP limiters live in an LRU cache with a bounded entry
//! count, so an attacker cycling source addresses cannot exhaust server
//! memory.

use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use lru::LruCache;
use std::{
    net::IpAddr,
    num::{NonZeroU32, NonZeroUsize},
    sync::{Arc, Mutex},
};
use thiserror::Error;

/// Default per-IP auth attempt limit (attempts per minute).
pub const DEFAULT_AUTH_RATE_PER_IP: u32 = 5;

/// Default global auth attempt limit (attempts per minute).
pub const DEFAULT_AUTH_RATE_GLOBAL: u32 = 100;

/// Maximum tracked IPs before LRU eviction.
pub const DEFAULT_MAX_TRACKED_IPS: usize = 10_000;

type IpRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Rate limit failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("per-IP rate limit exceeded")]
    PerIpLimitExceeded,

    #[error("global rate limit exceeded")]
    GlobalLimitExceeded,
}

/// Per-IP plus global limiter for the auth endpoints.
pub struct LoginRateLimiter {
    per_ip: Mutex<LruCache<IpAddr, Arc<IpRateLimiter>>>,
    global: IpRateLimiter,
    per_ip_quota: Quota,
}

impl LoginRateLimiter {
    /// Creates a limiter with the default quotas.
    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_AUTH_RATE_PER_IP,
            DEFAULT_AUTH_RATE_GLOBAL,
            DEFAULT_MAX_TRACKED_IPS,
        )
    }

    /// Creates a limiter with explicit per-minute quotas.
    pub fn new(per_ip_per_minute: u32, global_per_minute: u32, max_tracked_ips: usize) -> Self {
        let per_ip_quota = Quota::per_minute(
            NonZeroU32::new(per_ip_per_minute.max(1)).unwrap_or(NonZeroU32::MIN),
        );
        let global_quota = Quota::per_minute(
            NonZeroU32::new(global_per_minute.max(1)).unwrap_or(NonZeroU32::MIN),
        );
        let capacity =
            NonZeroUsize::new(max_tracked_ips.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            per_ip: Mutex::new(LruCache::new(capacity)),
            global: RateLimiter::direct(global_quota),
            per_ip_quota,
        }
    }

    /// Checks both limits for one attempt from `ip`.
    pub fn check(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        if self.global.check().is_err() {
            return Err(RateLimitError::GlobalLimitExceeded);
        }

        let limiter = {
            let mut cache = self.per_ip.lock().unwrap_or_else(|e| e.into_inner());
            cache
                .get_or_insert(ip, || Arc::new(RateLimiter::direct(self.per_ip_quota)))
                .clone()
        };
        limiter
            .check()
            .map_err(|_| RateLimitError::PerIpLimitExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_per_ip_limit_trips_after_quota() {
        let limiter = LoginRateLimiter::new(3, 1000, 16);
        for _ in 0..3 {
            assert!(limiter.check(ip(1)).is_ok());
        }
        assert_eq!(
            limiter.check(ip(1)),
            Err(RateLimitError::PerIpLimitExceeded)
        );
        // A different IP is unaffected.
        assert!(limiter.check(ip(2)).is_ok());
    }

    #[test]
    fn test_global_limit_trips_across_ips() {
        let limiter = LoginRateLimiter::new(100, 4, 16);
        for i in 0..4 {
            assert!(limiter.check(ip(i)).is_ok());
        }
        assert_eq!(
            limiter.check(ip(99)),
            Err(RateLimitError::GlobalLimitExceeded)
        );
    }

    #[test]
    fn test_lru_bounds_tracked_ips() {
        let limiter = LoginRateLimiter::new(1, 1000, 2);
        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(2)).is_ok());
        // Evicts ip(1); a fresh limiter for ip(3) is created.
        assert!(limiter.check(ip(3)).is_ok());
        // ip(1) was evicted and starts a fresh quota.
        assert!(limiter.check(ip(1)).is_ok());
    }
}
