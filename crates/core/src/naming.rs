//! Validation for identifiers that end up in process arguments or URLs.
//!
//! Queue names are appended to the worker subprocess command line and
//! plugin names are used as registry keys and directory names, so both
//! are restricted to a conservative character set.

use crate::error::CoreError;

/// Maximum length of a queue or plugin name.
pub const MAX_NAME_LEN: usize = 128;

/// Allowed characters: alphanumeric, hyphen, underscore, dot.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Validate a queue name.
pub fn validate_queue_name(name: &str) -> Result<(), CoreError> {
    if is_safe_name(name) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid queue name '{name}': use 1-{MAX_NAME_LEN} characters of [A-Za-z0-9_.-]"
        )))
    }
}
