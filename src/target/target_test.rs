// ABOUTME: Tests for target construction and validation rules.
// ABOUTME: Covers phone format, message length, count, and delay checks.

use super::target::{MAX_MESSAGE_CHARS, Target, validate_message, validate_phone};
use crate::error::ValidationError;

#[test]
fn test_phone_validation() {
    assert!(validate_phone("+14155550100"));
    assert!(validate_phone("+1234567"));
    assert!(validate_phone("+123456789012345"));

    assert!(!validate_phone("14155550100"));
    assert!(!validate_phone("+123"));
    assert!(!validate_phone("+1234567890123456"));
    assert!(!validate_phone("+1415-555-0100"));
    assert!(!validate_phone(""));
}

#[test]
fn test_message_validation() {
    assert!(validate_message("hi"));
    assert!(validate_message(&"a".repeat(MAX_MESSAGE_CHARS)));
    assert!(!validate_message(""));
    assert!(!validate_message(&"a".repeat(MAX_MESSAGE_CHARS + 1)));
}

#[test]
fn test_message_length_counts_characters_not_bytes() {
    // Each 'é' is two bytes but one character.
    let message = "é".repeat(MAX_MESSAGE_CHARS);
    assert!(message.len() > MAX_MESSAGE_CHARS);
    assert!(validate_message(&message));
}

#[test]
fn test_new_target_keeps_fields() {
    let target = Target::new("+14155550100", "Hello", 3, 1.5).unwrap();
    assert_eq!(target.phone(), "+14155550100");
    assert_eq!(target.message(), "Hello");
    assert_eq!(target.count(), 3);
    assert_eq!(target.delay().as_millis(), 1500);
}

#[test]
fn test_new_target_rejects_invalid_input() {
    assert_eq!(
        Target::new("555", "Hello", 1, 0.0),
        Err(ValidationError::InvalidPhone("555".to_string()))
    );
    assert_eq!(
        Target::new("+14155550100", "", 1, 0.0),
        Err(ValidationError::EmptyMessage)
    );
    assert_eq!(
        Target::new("+14155550100", "a".repeat(MAX_MESSAGE_CHARS + 1), 1, 0.0),
        Err(ValidationError::MessageTooLong {
            len: MAX_MESSAGE_CHARS + 1,
            max: MAX_MESSAGE_CHARS
        })
    );
    assert_eq!(
        Target::new("+14155550100", "Hello", 0, 0.0),
        Err(ValidationError::ZeroCount)
    );
    assert!(matches!(
        Target::new("+14155550100", "Hello", 1, -1.0),
        Err(ValidationError::InvalidDelay(_))
    ));
    assert!(matches!(
        Target::new("+14155550100", "Hello", 1, f64::NAN),
        Err(ValidationError::InvalidDelay(_))
    ));
}
