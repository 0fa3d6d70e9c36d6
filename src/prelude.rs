// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use textcast::prelude::*;` to get started quickly.

pub use crate::config::{ApiConfig, Config, DeliveryConfig, LoggingConfig, RateLimitConfig};
pub use crate::coordinator::{
    DispatchReport, Dispatcher, PhoneStats, RateLimitUsage, RateLimiter, RetryPolicy, SendOutcome,
    SendStatus, Statistics, StatsSnapshot, TargetSummary,
};
pub use crate::error::{ConfigError, LoadError, SendError, TextcastError, ValidationError};
pub use crate::target::{
    LoadReport, SkippedLine, Target, load_targets, parse_targets, validate_message, validate_phone,
};
pub use crate::transport::{Delivery, HttpSender, Sender, parse_retry_after};
