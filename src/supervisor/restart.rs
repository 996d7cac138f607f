// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Restart backoff and the rolling restart budget.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::SupervisorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    base: Duration,
    cap: Duration,
    max_restarts: u32,
    window: Duration,
}

impl RestartPolicy {
    pub fn new(base: Duration, cap: Duration, max_restarts: u32, window: Duration) -> Self {
        Self {
            base,
            cap,
            max_restarts,
            window,
        }
    }

    pub fn from_config(settings: &SupervisorConfig) -> Self {
        Self::new(
            Duration::from_secs(settings.restart_backoff_secs),
            Duration::from_secs(settings.max_restart_backoff_secs),
            settings.max_restarts,
            Duration::from_secs(settings.restart_window_secs),
        )
    }

    /// Delay before the `n`-th restart in the window: `base * 2^(n-1)`, capped.
    pub fn backoff(&self, n: u32) -> Duration {
        let factor = 2u32.saturating_pow(n.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.cap)
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Restart { attempt: u32, after: Duration },
    /// Budget used up; `restarts` already happened inside the window
    GiveUp { restarts: u32 },
}

/// Restarts of one module inside the rolling window.
#[derive(Debug, Default)]
pub struct RestartTracker {
    restarts: VecDeque<Instant>,
}

impl RestartTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a crash at `now` and decide what to do about it.
    pub fn record_crash(&mut self, now: Instant, policy: &RestartPolicy) -> RestartDecision {
        while let Some(oldest) = self.restarts.front() {
            if now.saturating_duration_since(*oldest) > policy.window() {
                self.restarts.pop_front();
            } else {
                break;
            }
        }

        let restarts = self.restarts.len() as u32;
        if restarts >= policy.max_restarts() {
            return RestartDecision::GiveUp { restarts };
        }

        self.restarts.push_back(now);
        let attempt = restarts + 1;
        RestartDecision::Restart {
            attempt,
            after: policy.backoff(attempt),
        }
    }

    pub fn in_window(&self) -> usize {
        self.restarts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RestartPolicy {
        RestartPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(10),
            3,
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let policy = policy();
        let delays: Vec<u64> = (1..=6).map(|n| policy.backoff(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
        assert_eq!(policy.backoff(200), Duration::from_secs(10));
    }

    #[test]
    fn test_budget_exhausted_after_max_restarts() {
        let policy = policy();
        let mut tracker = RestartTracker::new();
        let start = Instant::now();

        for attempt in 1..=3 {
            assert_eq!(
                tracker.record_crash(start, &policy),
                RestartDecision::Restart {
                    attempt,
                    after: policy.backoff(attempt)
                }
            );
        }
        assert_eq!(
            tracker.record_crash(start, &policy),
            RestartDecision::GiveUp { restarts: 3 }
        );
    }

    #[test]
    fn test_old_restarts_leave_the_window() {
        let policy = policy();
        let mut tracker = RestartTracker::new();
        let start = Instant::now();

        tracker.record_crash(start, &policy);
        tracker.record_crash(start + Duration::from_secs(30), &policy);
        tracker.record_crash(start + Duration::from_secs(40), &policy);
        assert_eq!(tracker.in_window(), 3);

        let later = start + Duration::from_secs(61);
        assert_eq!(
            tracker.record_crash(later, &policy),
            RestartDecision::Restart {
                attempt: 3,
                after: Duration::from_secs(4)
            }
        );
        assert_eq!(tracker.in_window(), 3);
    }
}
