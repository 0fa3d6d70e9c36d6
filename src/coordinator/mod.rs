// ABOUTME: Coordinator module - rate limiting, statistics, and concurrent dispatch.
// ABOUTME: The Dispatcher drives workers; RateLimiter and Statistics are shared by them.

mod dispatcher;
mod rate_limiter;
mod retry;
mod stats;

pub use dispatcher::{DispatchReport, Dispatcher, SendOutcome, SendStatus, TargetSummary};
pub use rate_limiter::{RateLimitUsage, RateLimiter};
pub use retry::RetryPolicy;
pub use stats::{PhoneStats, Statistics, StatsSnapshot};

#[cfg(test)]
mod rate_limiter_test;
