//! Input validation functions
//!
//! Custom validators plugged into the `validator` derive on request types.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use validator::ValidationError;

/// Usernames never contain `@`, so a login identifier is either a
/// username or an email address, never both.
static USERNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]{3,32}$").expect("username pattern is a valid regex")
});

/// Validate username format
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_PATTERN.is_match(username) {
        return Ok(());
    }

    let mut err = ValidationError::new("username");
    err.message = Some("Username must be 3-32 characters of letters, digits, '_', '.' or '-'".into());
    Err(err)
}
