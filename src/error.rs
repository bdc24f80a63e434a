//! Error types used by resources, shared resources and the host runtime.
//!
//! This module defines two main error enums:
//!
//! - [`ResourceError`]: failures while producing a resource value.
//! - [`RuntimeError`]: errors raised by the [`Host`](crate::Host) itself.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//!
//! Failures raised by a consumer `body` are **not** represented here: they are
//! part of the body's own return value and travel through
//! [`Resource::using`](crate::Resource::using) untouched.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced while producing a resource value.
///
/// A `ResourceError` is delivered to every consumer waiting on the value, so it
/// is cheap to clone (`Arc<str>` payloads).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The producer failed before (or instead of) handing off its value.
    #[error("production failed: {error}")]
    Failed {
        /// The underlying error message.
        error: Arc<str>,
    },

    /// The producer completed without ever handing off a value and without a failure cause.
    #[error("producer completed without emitting a value")]
    NeverEmitted,

    /// The producer was cancelled before it handed off its value.
    #[error("production cancelled")]
    Canceled,

    /// The producer task panicked.
    #[error("producer panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: Arc<str>,
    },

    /// A [`Context`](crate::Context) element would break the isolation between
    /// the resource's task tree and the caller's.
    #[error("invalid context: {reason}")]
    InvalidContext {
        /// Which element was rejected.
        reason: Arc<str>,
    },
}

impl ResourceError {
    /// Shorthand for [`ResourceError::Failed`].
    ///
    /// # Example
    /// ```
    /// use taskshare::ResourceError;
    ///
    /// let err = ResourceError::failed("connection refused");
    /// assert_eq!(err.to_string(), "production failed: connection refused");
    /// ```
    pub fn failed(error: impl Into<Arc<str>>) -> Self {
        ResourceError::Failed {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskshare::ResourceError;
    ///
    /// assert_eq!(ResourceError::NeverEmitted.as_label(), "resource_never_emitted");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ResourceError::Failed { .. } => "resource_failed",
            ResourceError::NeverEmitted => "resource_never_emitted",
            ResourceError::Canceled => "resource_canceled",
            ResourceError::Panicked { .. } => "resource_panicked",
            ResourceError::InvalidContext { .. } => "resource_invalid_context",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ResourceError::Failed { error } => format!("error: {error}"),
            ResourceError::NeverEmitted => "never emitted".to_string(),
            ResourceError::Canceled => "cancelled".to_string(),
            ResourceError::Panicked { info } => format!("panic: {info}"),
            ResourceError::InvalidContext { reason } => format!("invalid context: {reason}"),
        }
    }

    /// Converts a join failure of a producer task into a resource error.
    pub(crate) fn from_join(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            return ResourceError::Canceled;
        }
        match err.try_into_panic() {
            Ok(payload) => ResourceError::Panicked {
                info: panic_message(payload.as_ref()).into(),
            },
            Err(_) => ResourceError::Canceled,
        }
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// # Errors produced by the host runtime.
///
/// These represent failures in the host itself,
/// such as a shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some hot resources were still draining.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of shared resources whose producers had not stopped in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskshare::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck resources={stuck:?}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(ResourceError::failed("x").as_label(), "resource_failed");
        assert_eq!(ResourceError::Canceled.as_label(), "resource_canceled");
        assert_eq!(
            ResourceError::InvalidContext { reason: "scope".into() }.as_label(),
            "resource_invalid_context"
        );
    }

    #[test]
    fn clones_compare_equal() {
        let err = ResourceError::failed("boom");
        assert_eq!(err.clone(), err);
        assert_eq!(err.as_message(), "error: boom");
    }

    #[test]
    fn panic_message_handles_common_payloads() {
        let s: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
