//! Rate limiting for sensitive auth endpoints.
//!
//! Sliding window: each allowed or denied call records nothing beyond
//! the timestamps of prior requests inside the window; a request is
//! allowed iff fewer than the action's maximum fall within it. The
//! check-and-increment happens under one lock, so concurrent callers on
//! the same key cannot both slip past the boundary.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    /// Authorization-code callback processing, keyed by client IP.
    Callback,
    /// Token refresh, keyed by session id.
    Refresh,
}

impl RateLimitAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Callback => "callback",
            Self::Refresh => "refresh",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Denied; callers must back off for at least the given seconds.
    Limited { retry_after_seconds: u64 },
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str, action: RateLimitAction, now: i64) -> RateLimitDecision;
}

/// Limiter that always allows; used in tests and when limits are disabled.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str, _action: RateLimitAction, _now: i64) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RatePolicy {
    pub max_requests: usize,
    pub window_seconds: i64,
}

/// In-process sliding-window limiter.
pub struct SlidingWindowLimiter {
    callback: RatePolicy,
    refresh: RatePolicy,
    windows: Mutex<HashMap<String, Vec<i64>>>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(callback: RatePolicy, refresh: RatePolicy) -> Self {
        Self {
            callback,
            refresh,
            windows: Mutex::new(HashMap::new()),
        }
    }

    const fn policy(&self, action: RateLimitAction) -> RatePolicy {
        match action {
            RateLimitAction::Callback => self.callback,
            RateLimitAction::Refresh => self.refresh,
        }
    }

    /// Core sliding-window check, exposed for direct policy arguments.
    pub fn is_allowed(
        &self,
        key: &str,
        max_requests: usize,
        window_seconds: i64,
        now: i64,
    ) -> RateLimitDecision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            // A poisoned lock means a panic elsewhere; fail closed.
            Err(_) => {
                return RateLimitDecision::Limited {
                    retry_after_seconds: window_seconds.max(0).unsigned_abs(),
                }
            }
        };

        let entries = windows.entry(key.to_string()).or_default();
        entries.retain(|stamp| now - *stamp < window_seconds);

        let decision = if entries.len() >= max_requests {
            // Oldest surviving entry decides when a slot frees up.
            let retry_after = entries
                .first()
                .map_or(window_seconds, |oldest| oldest + window_seconds - now)
                .max(1);
            RateLimitDecision::Limited {
                retry_after_seconds: retry_after.unsigned_abs(),
            }
        } else {
            entries.push(now);
            RateLimitDecision::Allowed
        };

        // Keys are client-controlled; drop every key whose newest entry
        // has left all configured windows so the map stays bounded.
        let horizon = window_seconds
            .max(self.callback.window_seconds)
            .max(self.refresh.window_seconds);
        windows.retain(|_, stamps| {
            stamps
                .last()
                .is_some_and(|newest| now - *newest < horizon)
        });

        decision
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check(&self, key: &str, action: RateLimitAction, now: i64) -> RateLimitDecision {
        let policy = self.policy(action);
        let key = format!("{}:{key}", action.as_str());
        self.is_allowed(&key, policy.max_requests, policy.window_seconds, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn limiter() -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(
            RatePolicy {
                max_requests: 10,
                window_seconds: 60,
            },
            RatePolicy {
                max_requests: 5,
                window_seconds: 60,
            },
        )
    }

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(
            limiter.check("1.2.3.4", RateLimitAction::Callback, NOW),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn sixth_call_in_window_is_limited() {
        let limiter = limiter();
        for i in 0..5 {
            assert_eq!(
                limiter.check("sid-a", RateLimitAction::Refresh, NOW + i),
                RateLimitDecision::Allowed,
                "call {i} should be allowed"
            );
        }
        assert!(matches!(
            limiter.check("sid-a", RateLimitAction::Refresh, NOW + 5),
            RateLimitDecision::Limited { .. }
        ));
    }

    #[test]
    fn window_elapse_frees_a_slot() {
        let limiter = limiter();
        for i in 0..5 {
            limiter.check("sid-a", RateLimitAction::Refresh, NOW + i);
        }
        assert!(matches!(
            limiter.check("sid-a", RateLimitAction::Refresh, NOW + 10),
            RateLimitDecision::Limited { .. }
        ));
        // First entry (at NOW) leaves the window at NOW + 60.
        assert_eq!(
            limiter.check("sid-a", RateLimitAction::Refresh, NOW + 60),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn retry_after_counts_down_to_oldest_entry() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.check("sid-a", RateLimitAction::Refresh, NOW);
        }
        match limiter.check("sid-a", RateLimitAction::Refresh, NOW + 20) {
            RateLimitDecision::Limited {
                retry_after_seconds,
            } => assert_eq!(retry_after_seconds, 40),
            RateLimitDecision::Allowed => panic!("expected limited"),
        }
    }

    #[test]
    fn keys_and_actions_are_independent() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.check("sid-a", RateLimitAction::Refresh, NOW);
        }
        assert!(matches!(
            limiter.check("sid-a", RateLimitAction::Refresh, NOW),
            RateLimitDecision::Limited { .. }
        ));
        // Same key, different action: separate window.
        assert_eq!(
            limiter.check("sid-a", RateLimitAction::Callback, NOW),
            RateLimitDecision::Allowed
        );
        // Different key, same action.
        assert_eq!(
            limiter.check("sid-b", RateLimitAction::Refresh, NOW),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn stale_keys_are_evicted() {
        let limiter = limiter();
        // A client rotating forged addresses must not grow the map for
        // the life of the process.
        for i in 0..100 {
            limiter.check(&format!("ip-{i}"), RateLimitAction::Callback, NOW);
        }
        assert_eq!(limiter.windows.lock().unwrap().len(), 100);

        limiter.check("ip-new", RateLimitAction::Callback, NOW + 120);
        let windows = limiter.windows.lock().unwrap();
        assert_eq!(windows.len(), 1);
        assert!(windows.contains_key("callback:ip-new"));
    }

    #[test]
    fn denied_calls_do_not_extend_the_window() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.check("sid-a", RateLimitAction::Refresh, NOW);
        }
        // Hammering while limited must not push the recovery point out.
        for i in 0..30 {
            let _ = limiter.check("sid-a", RateLimitAction::Refresh, NOW + i);
        }
        assert_eq!(
            limiter.check("sid-a", RateLimitAction::Refresh, NOW + 60),
            RateLimitDecision::Allowed
        );
    }
}
