//! Sliding-window rate limiting with Retry-After precedence.
//!
//! The service tolerates roughly 20 requests per minute. The limiter records
//! the instant of every granted request and blocks a caller until issuing one
//! more request would keep the trailing window under budget. A server-supplied
//! Retry-After hint is an additional floor on the next grant: it can only
//! delay, never shorten, the computed schedule.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// Request-budget rate limiter shared by every outbound request path.
///
/// All fetchers must acquire through the same instance; the budget is global
/// to the process regardless of how many logical callers share it.
#[derive(Debug)]
pub struct RateLimiter {
    budget: usize,
    window: Duration,
    state: Mutex<LimiterState>,
}

#[derive(Debug)]
struct LimiterState {
    /// Grant instants inside the trailing window, oldest first
    granted: VecDeque<Instant>,
    /// Floor on the next grant, set from a server Retry-After hint
    not_before: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter allowing `budget` requests per `window`.
    ///
    /// # Panics
    /// Panics if `budget` is zero or `window` is zero; a limiter that can
    /// never grant is a configuration error caught at construction.
    pub fn new(budget: usize, window: Duration) -> Self {
        assert!(budget > 0, "rate limiter budget must be at least 1");
        assert!(!window.is_zero(), "rate limiter window must be non-zero");
        Self {
            budget,
            window,
            state: Mutex::new(LimiterState {
                granted: VecDeque::with_capacity(budget),
                not_before: None,
            }),
        }
    }

    /// Create a limiter with a 60-second window.
    pub fn per_minute(budget: usize) -> Self {
        Self::new(budget, Duration::from_secs(60))
    }

    /// Suspend until issuing one more request stays under budget, then record
    /// the grant.
    pub async fn acquire(&self) {
        loop {
            match self.try_grant(Instant::now()) {
                None => return,
                Some(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "Rate limit: waiting");
                    sleep(wait).await;
                }
            }
        }
    }

    /// Honor a server-provided wait hint: no grant happens before `now +
    /// delay`. An earlier hint is never shortened by a later, smaller one.
    pub fn note_retry_after(&self, delay: Duration) {
        let floor = Instant::now() + delay;
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        state.not_before = Some(match state.not_before {
            Some(existing) if existing > floor => existing,
            _ => floor,
        });
        debug!(delay_ms = delay.as_millis() as u64, "Rate limit: honoring Retry-After hint");
    }

    /// Number of grants currently inside the trailing window.
    pub fn in_flight_budget(&self) -> usize {
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();
        Self::prune(&mut state.granted, now, self.window);
        state.granted.len()
    }

    /// Attempt a grant at `now`. Returns `None` when granted, otherwise the
    /// duration to wait before trying again.
    fn try_grant(&self, now: Instant) -> Option<Duration> {
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        Self::prune(&mut state.granted, now, self.window);

        let mut earliest = now;

        if state.granted.len() >= self.budget {
            // The oldest in-window grant leaving the window frees a slot.
            if let Some(oldest) = state.granted.front() {
                earliest = earliest.max(*oldest + self.window);
            }
        }

        if let Some(floor) = state.not_before {
            earliest = earliest.max(floor);
        }

        if earliest <= now {
            state.granted.push_back(now);
            None
        } else {
            Some(earliest - now)
        }
    }

    fn prune(granted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = granted.front() {
            if now.duration_since(*oldest) >= window {
                granted.pop_front();
            } else {
                break;
            }
        }
    }
}
