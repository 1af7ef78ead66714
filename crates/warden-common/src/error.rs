//! Error types for Warden
//!
//! `WardenError` is shared by every crate in the workspace. Contention is never
//! an error: the only recoverable lock failure is `LockTimeout`, everything
//! else either signals a caller mistake or a backing-store failure that is
//! propagated unmodified.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum WardenError {
    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("failed to lock resource '{resource_id}' after {attempts} attempts")]
    LockTimeout { resource_id: String, attempts: u32 },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl WardenError {
    /// Whether this is the recoverable timeout raised by a bounded lock wait
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, WardenError::LockTimeout { .. })
    }

    /// Resource id carried by a lock timeout, if any
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            WardenError::LockTimeout { resource_id, .. } => Some(resource_id),
            _ => None,
        }
    }
}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warden_error_display() {
        let err = WardenError::IllegalArgument("resource id must not be empty".to_string());
        assert_eq!(format!("{}", err), "caused: resource id must not be empty");

        let err = WardenError::LockTimeout {
            resource_id: "doc/99".to_string(),
            attempts: 3,
        };
        assert_eq!(
            format!("{}", err),
            "failed to lock resource 'doc/99' after 3 attempts"
        );

        let err = WardenError::Cache("backend unavailable".to_string());
        assert_eq!(format!("{}", err), "cache error: backend unavailable");
    }

    #[test]
    fn test_lock_timeout_helpers() {
        let err = WardenError::LockTimeout {
            resource_id: "/_user/a/ad/admin/message".to_string(),
            attempts: 300,
        };
        assert!(err.is_lock_timeout());
        assert_eq!(err.resource_id(), Some("/_user/a/ad/admin/message"));

        let err = WardenError::Config("bad value".to_string());
        assert!(!err.is_lock_timeout());
        assert_eq!(err.resource_id(), None);
    }

    #[test]
    fn test_serialization_error_from_serde() {
        let serde_err = serde_json::from_slice::<u64>(b"not json").unwrap_err();
        let err = WardenError::from(serde_err);
        assert!(matches!(err, WardenError::Serialization(_)));
    }
}
