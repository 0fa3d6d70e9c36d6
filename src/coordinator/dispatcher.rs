// ABOUTME: Dispatch coordinator - fans targets out to concurrent workers behind a
// ABOUTME: counting gate, with rate limiting, retry/backoff, and fault isolation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Notify, Semaphore};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::rate_limiter::{RateLimitUsage, RateLimiter};
use super::retry::RetryPolicy;
use super::stats::{Statistics, StatsSnapshot};
use crate::config::Config;
use crate::error::SendError;
use crate::target::Target;
use crate::transport::{Delivery, HttpSender, Sender};

/// Classification of one message send after all retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SendStatus {
    /// The endpoint accepted the message.
    Sent,
    /// HTTP 200 without `success: true`.
    Rejected(String),
    /// A non-200, non-429 status.
    HttpStatus(u16),
    /// Transport failures used up every attempt.
    RetriesExhausted(String),
    /// The endpoint kept answering 429.
    Throttled,
    /// The local rate limiter had no room even after one wait.
    RateLimited,
    /// A non-retryable error from the sender.
    Error(String),
}

/// Result of one message send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub status: SendStatus,
}

impl SendOutcome {
    fn sent() -> Self {
        Self {
            success: true,
            status: SendStatus::Sent,
        }
    }

    fn failed(status: SendStatus) -> Self {
        Self {
            success: false,
            status,
        }
    }
}

/// Per-phone result of a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetSummary {
    /// True if at least one message was sent.
    pub success: bool,
    pub sent: u32,
    /// Failed sends, rate-limited ones included.
    pub failed: u32,
    /// The subset of `failed` that the local rate limiter turned away.
    pub rate_limited: u32,
    /// Set when the worker for this target died unexpectedly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetSummary {
    fn merge(&mut self, other: TargetSummary) {
        self.success |= other.success;
        self.sent += other.sent;
        self.failed += other.failed;
        self.rate_limited += other.rate_limited;
        if self.error.is_none() {
            self.error = other.error;
        }
    }
}

/// Per-phone results of a dispatch, keyed by phone number.
pub type DispatchReport = HashMap<String, TargetSummary>;

/// Progress of one worker, readable after the worker has died.
#[derive(Debug, Default)]
struct Progress {
    sent: AtomicU32,
    failed: AtomicU32,
    rate_limited: AtomicU32,
}

impl Progress {
    fn attempted(&self) -> u32 {
        self.sent.load(Ordering::SeqCst) + self.failed.load(Ordering::SeqCst)
    }

    fn summary(&self) -> TargetSummary {
        let sent = self.sent.load(Ordering::SeqCst);
        TargetSummary {
            success: sent > 0,
            sent,
            failed: self.failed.load(Ordering::SeqCst),
            rate_limited: self.rate_limited.load(Ordering::SeqCst),
            error: None,
        }
    }
}

/// State shared by every worker of every batch.
struct Shared {
    sender: Arc<dyn Sender>,
    limiter: Arc<RateLimiter>,
    stats: Statistics,
    policy: RetryPolicy,
    stopped: AtomicBool,
    /// Wakes workers sleeping in a delay, backoff, or rate-limit wait.
    halt: Notify,
}

/// Dispatch coordinator.
///
/// Runs one worker per target, at most `max_concurrent` at a time. Each worker
/// sends its message `count` times in order, pausing `delay` between sends.
/// Every send passes the shared [`RateLimiter`] first and retries transient
/// failures with exponential backoff. Nothing a worker does can fail or cancel
/// a sibling worker.
pub struct Dispatcher {
    shared: Arc<Shared>,
    max_concurrent: usize,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// # Arguments
    ///
    /// * `sender` - Performs single send requests.
    /// * `limiter` - Shared rate limiter. May be shared with other dispatchers.
    /// * `policy` - Retry ceiling and backoff.
    /// * `max_concurrent` - Maximum targets in flight. Values below 1 are raised to 1.
    pub fn new(
        sender: Arc<dyn Sender>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        max_concurrent: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                sender,
                limiter,
                stats: Statistics::new(),
                policy,
                stopped: AtomicBool::new(false),
                halt: Notify::new(),
            }),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Create a dispatcher that posts to the configured HTTP endpoint.
    pub fn from_config(config: &Config) -> Result<Self, SendError> {
        let sender = HttpSender::new(&config.api, config.delivery.timeout())?;
        let limiter = RateLimiter::new(
            config.rate_limit.requests_per_minute,
            config.rate_limit.requests_per_hour,
        );
        Ok(Self::new(
            Arc::new(sender),
            Arc::new(limiter),
            RetryPolicy::from(&config.delivery),
            config.delivery.max_concurrent,
        ))
    }

    /// Send every target and return a summary per phone number.
    ///
    /// An empty batch returns an empty report and touches no statistics.
    /// Targets sharing a phone number are merged into one summary.
    pub async fn dispatch(&self, targets: Vec<Target>) -> DispatchReport {
        if targets.is_empty() {
            return DispatchReport::new();
        }

        let span = info_span!("dispatch", batch = %Uuid::new_v4(), targets = targets.len());
        self.run_batch(targets).instrument(span).await
    }

    /// Send a single target.
    pub async fn dispatch_one(&self, target: Target) -> DispatchReport {
        self.dispatch(vec![target]).await
    }

    /// Ask running workers to stop before their next send.
    ///
    /// Requests already in flight finish normally; workers waiting between
    /// sends wake up and return. The flag is sticky: later batches on this
    /// dispatcher send nothing.
    pub fn stop(&self) {
        info!("stop requested");
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.halt.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    pub async fn statistics(&self) -> StatsSnapshot {
        self.shared.stats.snapshot().await
    }

    pub async fn reset_statistics(&self) {
        self.shared.stats.reset().await;
        info!("statistics reset");
    }

    pub async fn rate_limit_usage(&self) -> RateLimitUsage {
        self.shared.limiter.usage().await
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    async fn run_batch(&self, targets: Vec<Target>) -> DispatchReport {
        let shared = &self.shared;
        shared.stats.begin().await;
        info!(max_concurrent = self.max_concurrent, "starting dispatch");

        let gate = Arc::new(Semaphore::new(self.max_concurrent));
        let mut meta = Vec::with_capacity(targets.len());
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let progress = Arc::new(Progress::default());
            meta.push((target.phone().to_string(), target.count(), progress.clone()));
            handles.push(tokio::spawn(
                run_worker(shared.clone(), gate.clone(), target, progress).in_current_span(),
            ));
        }

        let mut report = DispatchReport::new();
        for ((phone, count, progress), joined) in meta.into_iter().zip(join_all(handles).await) {
            let failure = match joined {
                Ok(Ok(summary)) => {
                    report.entry(phone).or_default().merge(summary);
                    continue;
                }
                Ok(Err(reason)) => reason,
                Err(join_err) => join_err.to_string(),
            };

            // The worker never finished; everything it did not attempt counts as failed.
            let remaining = count.saturating_sub(progress.attempted());
            error!(%phone, remaining, error = %failure, "target worker failed");
            shared
                .stats
                .record_failures(&phone, u64::from(remaining), false)
                .await;
            shared.stats.target_done().await;

            let mut summary = progress.summary();
            summary.failed += remaining;
            summary.error = Some(failure);
            report.entry(phone).or_default().merge(summary);
        }

        shared.stats.finish().await;
        let snap = shared.stats.snapshot().await;
        info!(
            sent = snap.total_sent,
            failed = snap.total_failed,
            success_rate = snap.success_rate(),
            "dispatch completed"
        );
        report
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    gate: Arc<Semaphore>,
    target: Target,
    progress: Arc<Progress>,
) -> Result<TargetSummary, String> {
    let _permit = gate
        .acquire_owned()
        .await
        .map_err(|e| format!("concurrency gate unavailable: {}", e))?;
    Ok(shared.process(&target, &progress).await)
}

impl Shared {
    /// Send one target `count` times, sequentially.
    async fn process(&self, target: &Target, progress: &Progress) -> TargetSummary {
        let phone = target.phone();
        let count = target.count();
        info!(%phone, count, "processing target");

        for i in 0..count {
            if self.is_stopped() {
                info!(%phone, remaining = count - i, "stopped; skipping remaining sends");
                break;
            }

            let Some(outcome) = self.deliver(target).await else {
                info!(%phone, remaining = count - i, "stopped while waiting for a rate-limit slot");
                break;
            };
            match &outcome.status {
                SendStatus::Sent => {
                    progress.sent.fetch_add(1, Ordering::SeqCst);
                    self.stats.record_sent(phone).await;
                    info!(%phone, n = i + 1, count, "message sent");
                }
                SendStatus::RateLimited => {
                    progress.failed.fetch_add(1, Ordering::SeqCst);
                    progress.rate_limited.fetch_add(1, Ordering::SeqCst);
                    self.stats.record_failed(phone, true).await;
                    warn!(%phone, n = i + 1, count, "rate limit still exceeded after waiting");
                }
                status => {
                    progress.failed.fetch_add(1, Ordering::SeqCst);
                    self.stats.record_failed(phone, false).await;
                    warn!(%phone, n = i + 1, count, ?status, "message failed");
                }
            }

            if i + 1 < count && !target.delay().is_zero() {
                self.pause(target.delay()).await;
            }
        }

        self.stats.target_done().await;
        progress.summary()
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for `wait`, cut short by [`Dispatcher::stop`].
    ///
    /// Returns false if the dispatcher was stopped before or during the wait.
    async fn pause(&self, wait: Duration) -> bool {
        let halted = self.halt.notified();
        tokio::pin!(halted);
        // Register before checking the flag so a concurrent stop() is not missed.
        halted.as_mut().enable();
        if self.is_stopped() {
            return false;
        }

        tokio::select! {
            biased;
            () = &mut halted => false,
            () = tokio::time::sleep(wait) => true,
        }
    }

    /// One message send: rate-limit gate, then request with retries.
    ///
    /// Returns `None` if the dispatcher stopped before any request went out.
    async fn deliver(&self, target: &Target) -> Option<SendOutcome> {
        let phone = target.phone();
        let mut failures = 0u32;
        let mut throttles = 0u32;

        loop {
            match self.acquire_slot(phone).await {
                Slot::Taken => {}
                Slot::Full => return Some(SendOutcome::failed(SendStatus::RateLimited)),
                // A retry that never went out still leaves the earlier attempt failed.
                Slot::Stopped if failures + throttles > 0 => {
                    return Some(SendOutcome::failed(SendStatus::Error(
                        "stopped before retry".to_string(),
                    )));
                }
                Slot::Stopped => return None,
            }

            match self.sender.send(target).await {
                Ok(Delivery::Accepted) => return Some(SendOutcome::sent()),
                Ok(Delivery::Rejected(body)) => {
                    debug!(%phone, %body, "endpoint rejected message");
                    return Some(SendOutcome::failed(SendStatus::Rejected(body)));
                }
                Ok(Delivery::Status(code)) => {
                    return Some(SendOutcome::failed(SendStatus::HttpStatus(code)));
                }
                Ok(Delivery::Throttled { retry_after }) => {
                    // 429s have their own ceiling and never use up transport retries.
                    throttles += 1;
                    if throttles >= self.policy.max_attempts {
                        return Some(SendOutcome::failed(SendStatus::Throttled));
                    }
                    let wait = retry_after.unwrap_or(self.policy.throttle_fallback);
                    warn!(%phone, wait_secs = wait.as_secs_f64(), "endpoint rate limit hit");
                    if !self.pause(wait).await {
                        return Some(SendOutcome::failed(SendStatus::Throttled));
                    }
                }
                Err(e) if e.is_retryable() => {
                    failures += 1;
                    if failures >= self.policy.max_attempts {
                        error!(%phone, attempts = failures, error = %e, "giving up after retries");
                        return Some(SendOutcome::failed(SendStatus::RetriesExhausted(
                            e.to_string(),
                        )));
                    }
                    let backoff = self.policy.backoff(failures - 1);
                    warn!(
                        %phone,
                        attempt = failures,
                        backoff_secs = backoff.as_secs_f64(),
                        error = %e,
                        "transient send failure"
                    );
                    if !self.pause(backoff).await {
                        return Some(SendOutcome::failed(SendStatus::Error(e.to_string())));
                    }
                }
                Err(e) => {
                    error!(%phone, error = %e, "send failed");
                    return Some(SendOutcome::failed(SendStatus::Error(e.to_string())));
                }
            }
        }
    }

    /// Take a rate-limit slot, waiting at most one cycle for one to free up.
    async fn acquire_slot(&self, phone: &str) -> Slot {
        if self.limiter.try_acquire().await {
            return Slot::Taken;
        }
        let wait = self.limiter.wait_time().await;
        warn!(%phone, wait_secs = wait.as_secs_f64(), "rate limit reached, waiting");
        if !self.pause(wait).await {
            return Slot::Stopped;
        }
        if self.limiter.try_acquire().await {
            Slot::Taken
        } else {
            Slot::Full
        }
    }
}

/// Outcome of waiting on the rate limiter.
enum Slot {
    Taken,
    /// Still no room after one wait.
    Full,
    /// The dispatcher stopped during the wait.
    Stopped,
}
