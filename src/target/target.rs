// ABOUTME: Defines Target - one phone number plus the message, repeat count
// ABOUTME: and pacing delay to send to it - along with its validation rules.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::error::ValidationError;

/// Longest message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[0-9]{7,15}$").expect("phone pattern compiles"));

/// Returns true if `phone` is `+` followed by 7 to 15 digits.
pub fn validate_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// Returns true if `message` is non-empty and at most [`MAX_MESSAGE_CHARS`] characters.
pub fn validate_message(message: &str) -> bool {
    !message.is_empty() && message.chars().count() <= MAX_MESSAGE_CHARS
}

/// A validated send target.
///
/// Targets are immutable once built. The dispatcher takes ownership of each
/// one and hands it to exactly one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    phone: String,
    message: String,
    count: u32,
    delay: Duration,
}

impl Target {
    /// Build a target, rejecting anything that would fail validation.
    ///
    /// # Arguments
    ///
    /// * `phone` - Destination number, `+` followed by 7-15 digits.
    /// * `message` - Text body, 1 to 4096 characters.
    /// * `count` - How many times to send the message. Must be at least 1.
    /// * `delay_secs` - Pause between consecutive sends. Must be finite and non-negative.
    pub fn new(
        phone: impl Into<String>,
        message: impl Into<String>,
        count: u32,
        delay_secs: f64,
    ) -> Result<Self, ValidationError> {
        let phone = phone.into();
        let message = message.into();

        if !validate_phone(&phone) {
            return Err(ValidationError::InvalidPhone(phone));
        }
        if message.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        let len = message.chars().count();
        if len > MAX_MESSAGE_CHARS {
            return Err(ValidationError::MessageTooLong {
                len,
                max: MAX_MESSAGE_CHARS,
            });
        }
        if count == 0 {
            return Err(ValidationError::ZeroCount);
        }
        let delay = Duration::try_from_secs_f64(delay_secs)
            .map_err(|_| ValidationError::InvalidDelay(delay_secs))?;

        Ok(Self {
            phone,
            message,
            count,
            delay,
        })
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Number of times the message is sent.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Pause between consecutive sends to this target.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}
