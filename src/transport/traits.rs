// ABOUTME: Defines the Sender trait - the seam between the dispatcher and
// ABOUTME: whatever actually delivers a message (HTTP endpoint, test double).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SendError;
use crate::target::Target;

/// How the endpoint answered a single send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// HTTP 200 with `success: true`.
    Accepted,
    /// HTTP 200 without `success: true`. Not retried.
    Rejected(String),
    /// HTTP 429. The dispatcher waits `retry_after` (or its fallback) and tries again.
    Throttled { retry_after: Option<Duration> },
    /// Any other status. Not retried.
    Status(u16),
}

/// Trait for message senders.
///
/// Implementations issue one request per call. Transport failures come back
/// as `Err` and are classified with [`SendError::is_retryable`].
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, target: &Target) -> Result<Delivery, SendError>;
}
