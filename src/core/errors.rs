/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned by [`Deadline::run`](crate::Deadline::run) when the deadline
/// expires before the task's completion is observed
///
/// The task is not cancelled; it keeps running in the background. The error
/// classifies as both a timeout and a temporary condition, so callers that
/// retry on transient failures may retry on it.
#[derive(Error, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Diagnostic)]
#[error("deadline exceeded")]
#[diagnostic(
    code(deadline::exceeded),
    help("The task may still be running. Extend the deadline or retry.")
)]
pub struct DeadlineExceeded;

impl DeadlineExceeded {
    /// Always `true`
    #[inline]
    pub const fn is_timeout(&self) -> bool {
        true
    }

    /// Always `true`: expiry is recoverable by the caller
    #[inline]
    pub const fn is_temporary(&self) -> bool {
        true
    }
}

impl From<DeadlineExceeded> for std::io::Error {
    fn from(err: DeadlineExceeded) -> Self {
        std::io::Error::new(std::io::ErrorKind::TimedOut, err)
    }
}

/// Result alias for operations bounded by a deadline
pub type DeadlineResult<T> = Result<T, DeadlineExceeded>;

/// Errors building launch infrastructure
#[derive(Error, Debug, Diagnostic)]
pub enum LaunchError {
    #[error("Invalid launcher configuration: {0}")]
    #[diagnostic(
        code(launch::invalid_config),
        help("Worker count and queue capacity must both be at least 1.")
    )]
    InvalidConfig(String),

    #[error("Failed to spawn worker thread: {0}")]
    #[diagnostic(
        code(launch::spawn_failed),
        help("The OS refused to create a thread. Check process thread limits.")
    )]
    Spawn(#[from] std::io::Error),
}

/// Result alias for launcher construction
pub type LaunchResult<T> = Result<T, LaunchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_exceeded_classification() {
        let err = DeadlineExceeded;
        assert!(err.is_timeout());
        assert!(err.is_temporary());
        assert_eq!(err.to_string(), "deadline exceeded");
    }

    #[test]
    fn test_deadline_exceeded_into_io_error() {
        let err: std::io::Error = DeadlineExceeded.into();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);

        let inner = err.get_ref().and_then(|e| e.downcast_ref::<DeadlineExceeded>());
        assert_eq!(inner, Some(&DeadlineExceeded));
    }

    #[test]
    fn test_deadline_exceeded_serialization() {
        let json = serde_json::to_string(&DeadlineExceeded).unwrap();
        let back: DeadlineExceeded = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DeadlineExceeded);
    }

    #[test]
    fn test_launch_error_display() {
        let err = LaunchError::InvalidConfig("workers must be at least 1".into());
        assert_eq!(
            err.to_string(),
            "Invalid launcher configuration: workers must be at least 1"
        );
    }
}
