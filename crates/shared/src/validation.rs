//! Common validation and normalization utilities.

use chrono::{DateTime, Duration, Utc};
use validator::ValidationError;

/// Maximum allowed future timestamp tolerance in seconds (5 minutes for clock skew).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 300;

/// Country calling code stripped from stored phone numbers.
const DEFAULT_COUNTRY_CODE: &str = "55";

/// Longest national number kept after stripping the country code.
const MAX_NATIONAL_DIGITS: usize = 11;

lazy_static::lazy_static! {
    static ref PHONE_REGEX: regex::Regex =
        regex::Regex::new(r"^\+?[0-9()\-\s.]{8,20}$").unwrap();
    static ref WHITESPACE_REGEX: regex::Regex = regex::Regex::new(r"\s+").unwrap();
}

/// Normalizes a phone number for client matching.
///
/// Keeps digits only and drops a leading country code when the remainder
/// is still a full national number. Returns `None` when nothing is left.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    if digits.len() > MAX_NATIONAL_DIGITS && digits.starts_with(DEFAULT_COUNTRY_CODE) {
        return Some(digits[DEFAULT_COUNTRY_CODE.len()..].to_string());
    }

    Some(digits)
}

/// Normalizes a client name for matching: trimmed, single-spaced, lowercase.
pub fn normalize_name(raw: &str) -> Option<String> {
    let collapsed = WHITESPACE_REGEX.replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.to_lowercase())
    }
}

/// Validates the shape of a phone number as typed by staff.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_REGEX.is_match(phone) && normalize_phone(phone).is_some() {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone number must contain 8 to 20 digits or separators".into());
        Err(err)
    }
}

/// Validates that a completion timestamp is not in the future.
///
/// A small tolerance absorbs clock skew between the checkout terminal and the server.
pub fn validate_completed_at(completed_at: &DateTime<Utc>) -> Result<(), ValidationError> {
    let future_limit = Utc::now() + Duration::seconds(MAX_FUTURE_TOLERANCE_SECS);
    if *completed_at > future_limit {
        let mut err = ValidationError::new("completed_at_future");
        err.message = Some("Completion time cannot be in the future".into());
        return Err(err);
    }

    Ok(())
}
