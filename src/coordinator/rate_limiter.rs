// ABOUTME: Sliding-window rate limiter with per-minute and per-hour caps.
// ABOUTME: Shared by all dispatch workers; one mutex guards both windows.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Timestamps of recent requests within a trailing span, oldest first.
#[derive(Debug)]
struct Window {
    span: Duration,
    cap: usize,
    stamps: VecDeque<Instant>,
}

impl Window {
    fn new(span: Duration, cap: usize) -> Self {
        Self {
            span,
            cap,
            stamps: VecDeque::new(),
        }
    }

    /// Drop stamps that are `span` or older. Calling it twice at the same instant is a no-op.
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.stamps.front() {
            if now.duration_since(oldest) >= self.span {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn is_full(&self) -> bool {
        self.stamps.len() >= self.cap
    }

    /// Time until the oldest stamp leaves the window, zero if there is room.
    fn wait_time(&self, now: Instant) -> Duration {
        if !self.is_full() {
            return Duration::ZERO;
        }
        self.stamps
            .front()
            .map(|&oldest| self.span.saturating_sub(now.duration_since(oldest)))
            .unwrap_or(Duration::ZERO)
    }
}

/// Mutable state for the rate limiter, protected by a single mutex.
#[derive(Debug)]
struct RateLimiterState {
    minute: Window,
    hour: Window,
}

impl RateLimiterState {
    fn prune(&mut self, now: Instant) {
        self.minute.prune(now);
        self.hour.prune(now);
    }

    fn permitted(&self) -> bool {
        !self.minute.is_full() && !self.hour.is_full()
    }

    fn record(&mut self, now: Instant) {
        self.minute.stamps.push_back(now);
        self.hour.stamps.push_back(now);
    }
}

/// Current window occupancy, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RateLimitUsage {
    pub minute_count: usize,
    pub hour_count: usize,
    pub per_minute: usize,
    pub per_hour: usize,
}

/// Sliding-window rate limiter.
///
/// A request is permitted only while both the last-minute and last-hour
/// windows hold fewer entries than their caps. This is a best-effort gate,
/// not a queue: after sleeping [`wait_time`](Self::wait_time) a caller must
/// check again, since another worker may have taken the freed slot.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<RateLimiterState>,
    per_minute: usize,
    per_hour: usize,
}

impl RateLimiter {
    /// Create a limiter. Caps below 1 are raised to 1.
    ///
    /// # Arguments
    ///
    /// * `per_minute` - Maximum requests in any trailing 60 seconds.
    /// * `per_hour` - Maximum requests in any trailing 3600 seconds.
    pub fn new(per_minute: usize, per_hour: usize) -> Self {
        let per_minute = per_minute.max(1);
        let per_hour = per_hour.max(1);

        Self {
            state: Mutex::new(RateLimiterState {
                minute: Window::new(MINUTE, per_minute),
                hour: Window::new(HOUR, per_hour),
            }),
            per_minute,
            per_hour,
        }
    }

    /// Returns true if both windows have room, after pruning stale entries.
    pub async fn permitted(&self) -> bool {
        let mut state = self.state.lock().await;
        state.prune(Instant::now());
        state.permitted()
    }

    /// Record a request made now in both windows.
    pub async fn record(&self) {
        let mut state = self.state.lock().await;
        state.record(Instant::now());
    }

    /// Prune, check and record in one critical section.
    ///
    /// Returns true if the request was admitted and recorded. Unlike a separate
    /// `permitted()` + `record()` pair, concurrent callers can never push a
    /// window past its cap.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.prune(now);
        if !state.permitted() {
            return false;
        }
        state.record(now);
        true
    }

    /// How long until a slot frees up in whichever window is full.
    ///
    /// Takes the longer wait when both are full; zero when neither is.
    pub async fn wait_time(&self) -> Duration {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.prune(now);
        state.minute.wait_time(now).max(state.hour.wait_time(now))
    }

    /// Snapshot of how full each window is.
    pub async fn usage(&self) -> RateLimitUsage {
        let mut state = self.state.lock().await;
        state.prune(Instant::now());
        RateLimitUsage {
            minute_count: state.minute.stamps.len(),
            hour_count: state.hour.stamps.len(),
            per_minute: self.per_minute,
            per_hour: self.per_hour,
        }
    }

    pub fn per_minute(&self) -> usize {
        self.per_minute
    }

    pub fn per_hour(&self) -> usize {
        self.per_hour
    }
}
