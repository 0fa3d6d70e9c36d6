// ABOUTME: Aggregated send statistics shared by all dispatch workers.
// ABOUTME: Counters sit behind one mutex; callers read serializable snapshots.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// Per-phone counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhoneStats {
    pub sent: u64,
    pub failed: u64,
}

/// Point-in-time copy of the statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_sent: u64,
    /// Failed attempts, rate-limited ones included.
    pub total_failed: u64,
    /// Attempts abandoned because the local rate limiter had no room.
    pub total_rate_limited: u64,
    pub targets_processed: u64,
    /// Start of the first batch since the last reset.
    pub start_time: Option<DateTime<Utc>>,
    /// End of the most recent batch; `None` while a batch is running.
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds spent inside finished batches. Idle time between batches is excluded.
    pub active_secs: f64,
    pub phone_stats: HashMap<String, PhoneStats>,
}

impl StatsSnapshot {
    pub fn total_attempts(&self) -> u64 {
        self.total_sent + self.total_failed
    }

    /// Percentage of attempts that were sent, 0 when nothing was attempted.
    pub fn success_rate(&self) -> f64 {
        match self.total_attempts() {
            0 => 0.0,
            n => self.total_sent as f64 / n as f64 * 100.0,
        }
    }

    /// Sent messages per second of active batch time, 0 until a batch has finished.
    pub fn messages_per_second(&self) -> f64 {
        if self.active_secs > 0.0 {
            self.total_sent as f64 / self.active_secs
        } else {
            0.0
        }
    }
}

/// Statistics collector.
///
/// Every update takes the same lock, so concurrent workers never lose increments.
#[derive(Debug, Default)]
pub struct Statistics {
    inner: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    snap: StatsSnapshot,
    batch_start: Option<DateTime<Utc>>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a batch. Keeps the first start time across batches.
    pub async fn begin(&self) {
        self.begin_at(Utc::now()).await;
    }

    /// Mark the end of a batch and add its duration to the active time.
    pub async fn finish(&self) {
        self.finish_at(Utc::now()).await;
    }

    pub(crate) async fn begin_at(&self, now: DateTime<Utc>) {
        let mut state = self.inner.lock().await;
        state.batch_start = Some(now);
        let s = &mut state.snap;
        s.start_time.get_or_insert(now);
        s.end_time = None;
    }

    pub(crate) async fn finish_at(&self, now: DateTime<Utc>) {
        let mut state = self.inner.lock().await;
        if let Some(started) = state.batch_start.take() {
            state.snap.active_secs += (now - started).num_milliseconds().max(0) as f64 / 1000.0;
        }
        state.snap.end_time = Some(now);
    }

    pub async fn record_sent(&self, phone: &str) {
        let mut state = self.inner.lock().await;
        let s = &mut state.snap;
        s.total_sent += 1;
        s.phone_stats.entry(phone.to_string()).or_default().sent += 1;
    }

    /// Count one failed attempt. `rate_limited` also bumps the rate-limited total.
    pub async fn record_failed(&self, phone: &str, rate_limited: bool) {
        self.record_failures(phone, 1, rate_limited).await;
    }

    /// Count several failed attempts at once.
    pub async fn record_failures(&self, phone: &str, n: u64, rate_limited: bool) {
        if n == 0 {
            return;
        }
        let mut state = self.inner.lock().await;
        let s = &mut state.snap;
        s.total_failed += n;
        if rate_limited {
            s.total_rate_limited += n;
        }
        s.phone_stats.entry(phone.to_string()).or_default().failed += n;
    }

    pub async fn target_done(&self) {
        self.inner.lock().await.snap.targets_processed += 1;
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().await.snap.clone()
    }

    pub async fn reset(&self) {
        *self.inner.lock().await = State::default();
    }
}
