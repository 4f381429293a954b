//! Error types for cache operations.
//!
//! This module defines all error types that can surface from the cache layer.
//! Note that "not found" and "known absent" are *statuses*, not errors; see
//! [`crate::CacheStatus`].

use std::fmt;
use std::time::Duration;

/// Errors that can occur during cache operations.
///
/// The engine's propagation policy distinguishes two classes: cache-layer
/// errors (`RemoteUnavailable`, `LockTimeout`, decode failures) are absorbed
/// on the hot path to preserve availability and are only recorded; data-source
/// errors and encode failures are returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The codec could not encode or decode a value.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the codec failure.
        message: String,
    },

    /// The remote tier could not be reached or answered with a transport error.
    #[error("Remote tier unavailable: {message}")]
    RemoteUnavailable {
        /// Description of the transport failure.
        message: String,
    },

    /// An in-process lock could not be acquired within the wait budget.
    #[error("Lock wait budget exhausted for key: {key} ({waited_ms}ms)")]
    LockTimeout {
        /// The user key the lock was requested for.
        key: String,
        /// How long the caller waited, in milliseconds.
        waited_ms: u64,
    },

    /// The user-supplied data source failed.
    ///
    /// Unlike cache-layer errors, these are propagated to the caller verbatim.
    #[error("Data source error: {source}")]
    DataSource {
        /// The underlying error reported by the data source.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The configuration is invalid or an operation is unsupported by it.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new `RemoteUnavailable` error.
    #[must_use]
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `LockTimeout` error.
    #[must_use]
    pub fn lock_timeout(key: impl Into<String>, waited: Duration) -> Self {
        Self::LockTimeout {
            key: key.into(),
            waited_ms: waited.as_millis() as u64,
        }
    }

    /// Creates a new `DataSource` error from any error type.
    #[must_use]
    pub fn data_source(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::DataSource {
            source: Box::new(source),
        }
    }

    /// Creates a new `DataSource` error from a plain message.
    #[must_use]
    pub fn data_source_msg(message: impl Into<String>) -> Self {
        Self::DataSource {
            source: message.into().into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns `true` if this is a serialization error.
    #[must_use]
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Returns `true` if this is a remote-tier transport error.
    #[must_use]
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }

    /// Returns `true` if this is a lock wait timeout.
    #[must_use]
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Returns `true` if this error originated in the user data source.
    #[must_use]
    pub fn is_data_source(&self) -> bool {
        matches!(self, Self::DataSource { .. })
    }

    /// Returns the error category for logging and metrics labels.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Serialization { .. } => ErrorCategory::Serialization,
            Self::RemoteUnavailable { .. } => ErrorCategory::Remote,
            Self::LockTimeout { .. } => ErrorCategory::Lock,
            Self::DataSource { .. } => ErrorCategory::DataSource,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

/// Categories of cache errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Codec encode/decode failure.
    Serialization,
    /// Remote tier transport failure.
    Remote,
    /// Lock acquisition timeout.
    Lock,
    /// User data source failure.
    DataSource,
    /// Invalid or unsupported configuration.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization => write!(f, "serialization"),
            Self::Remote => write!(f, "remote"),
            Self::Lock => write!(f, "lock"),
            Self::DataSource => write!(f, "data_source"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Convenience result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::serialization("bad payload");
        assert_eq!(err.to_string(), "Serialization error: bad payload");

        let err = CacheError::remote_unavailable("connection refused");
        assert_eq!(
            err.to_string(),
            "Remote tier unavailable: connection refused"
        );

        let err = CacheError::lock_timeout("user:42", Duration::from_millis(250));
        assert_eq!(
            err.to_string(),
            "Lock wait budget exhausted for key: user:42 (250ms)"
        );
    }

    #[test]
    fn test_error_predicates() {
        let err = CacheError::remote_unavailable("down");
        assert!(err.is_remote_unavailable());
        assert!(!err.is_lock_timeout());
        assert!(!err.is_data_source());

        let err = CacheError::lock_timeout("k", Duration::from_millis(1));
        assert!(err.is_lock_timeout());
        assert!(!err.is_serialization());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            CacheError::serialization("x").category(),
            ErrorCategory::Serialization
        );
        assert_eq!(
            CacheError::remote_unavailable("x").category(),
            ErrorCategory::Remote
        );
        assert_eq!(
            CacheError::lock_timeout("k", Duration::ZERO).category(),
            ErrorCategory::Lock
        );
        assert_eq!(
            CacheError::data_source_msg("query failed").category(),
            ErrorCategory::DataSource
        );
        assert_eq!(
            CacheError::configuration("bad").category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Serialization.to_string(), "serialization");
        assert_eq!(ErrorCategory::Remote.to_string(), "remote");
        assert_eq!(ErrorCategory::Lock.to_string(), "lock");
        assert_eq!(ErrorCategory::DataSource.to_string(), "data_source");
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
    }

    #[test]
    fn test_data_source_error_preserves_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::TimedOut, "query timeout");
        let err = CacheError::data_source(inner);
        assert!(err.is_data_source());
        assert!(err.to_string().contains("query timeout"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
