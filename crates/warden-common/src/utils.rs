//! Utility functions for Warden

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, WardenError};

/// Current Unix time in milliseconds
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Reject resource ids the coordinator cannot key on
///
/// Resource ids are opaque; the only requirement is that they are non-empty.
///
/// # Examples
///
/// ```
/// use warden_common::check_resource_id;
///
/// assert!(check_resource_id("/_user/a/ad/admin/message").is_ok());
/// assert!(check_resource_id("").is_err());
/// ```
pub fn check_resource_id(resource_id: &str) -> Result<()> {
    if resource_id.is_empty() {
        return Err(WardenError::IllegalArgument(
            "resource id must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_timestamp_is_positive() {
        assert!(current_timestamp() > 0);
    }

    #[test]
    fn test_check_resource_id() {
        assert!(check_resource_id("doc/42").is_ok());
        assert!(check_resource_id(" ").is_ok()); // opaque, not trimmed
        assert!(matches!(
            check_resource_id(""),
            Err(WardenError::IllegalArgument(_))
        ));
    }
}
