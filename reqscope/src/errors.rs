//! Error types for request context access and scoped execution.
//!
//! Reading an absent identity or an unresolved context key is always surfaced
//! to the caller with a specific variant. Snapshot construction and the
//! install/restore transitions have no error path.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The main error type for reqscope operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// An identity was required but none is installed.
    #[error("No authenticated identity is installed in the current context")]
    Unauthenticated,

    /// A context value a collaborator depends on was never set.
    #[error("Context value '{key}' is not set")]
    UnresolvedContext {
        /// The missing key.
        key: String,
    },

    /// A scoped execution was cancelled before it completed.
    #[error("Scoped execution cancelled: {reason}")]
    Cancelled {
        /// Why the execution was cancelled.
        reason: String,
    },

    /// A scoped execution did not complete before its deadline.
    #[error("Scoped execution timed out after {after:?}")]
    TimedOut {
        /// The deadline that elapsed.
        after: Duration,
    },

    /// A launched child task panicked.
    #[error("Child task panicked: {message}")]
    ChildPanicked {
        /// The panic payload, if it was a string.
        message: String,
    },

    /// A worker pool could not be built.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ContextError {
    /// Creates an unresolved-context error for the given key.
    #[must_use]
    pub fn unresolved(key: impl Into<String>) -> Self {
        Self::UnresolvedContext { key: key.into() }
    }

    /// Creates a cancellation error with a reason.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Returns true for the unauthenticated-access condition.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Returns true if the execution was cancelled or timed out.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::TimedOut { .. })
    }

    /// Converts a tokio join error, which is either a cancellation or a panic.
    pub(crate) fn from_join_error(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            return Self::cancelled("task aborted");
        }
        let payload = err.into_panic();
        Self::ChildPanicked {
            message: panic_message(payload.as_ref()),
        }
    }
}

impl From<std::io::Error> for ContextError {
    fn from(err: std::io::Error) -> Self {
        Self::Runtime(err.to_string())
    }
}

impl From<serde_json::Error> for ContextError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Every failure collected from a group of children.
///
/// Failures are kept in launch order and none are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChildFailures {
    failures: Vec<(usize, ContextError)>,
}

impl ChildFailures {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the failure of the child launched at `index`.
    pub fn push(&mut self, index: usize, error: ContextError) {
        self.failures.push((index, error));
    }

    /// Returns the number of failed children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Returns true if no child failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the first failure in launch order.
    #[must_use]
    pub fn first(&self) -> Option<&ContextError> {
        self.failures.first().map(|(_, e)| e)
    }

    /// Iterates over `(launch index, error)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = &(usize, ContextError)> {
        self.failures.iter()
    }

    /// Returns the launch indices of the failed children.
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        self.failures.iter().map(|(i, _)| *i).collect()
    }
}

impl fmt::Display for ChildFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} child task(s) failed", self.failures.len())?;
        for (index, error) in &self.failures {
            write!(f, "; [{index}] {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ChildFailures {}

impl IntoIterator for ChildFailures {
    type Item = (usize, ContextError);
    type IntoIter = std::vec::IntoIter<(usize, ContextError)>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_display() {
        let err = ContextError::Unauthenticated;
        assert!(err.is_unauthenticated());
        assert!(err.to_string().contains("identity"));
    }

    #[test]
    fn test_unresolved_display_names_key() {
        let err = ContextError::unresolved("organization_id");
        assert_eq!(err.to_string(), "Context value 'organization_id' is not set");
        assert!(!err.is_unauthenticated());
    }

    #[test]
    fn test_cancellation_kinds() {
        assert!(ContextError::cancelled("shutdown").is_cancellation());
        assert!(ContextError::TimedOut {
            after: Duration::from_millis(5)
        }
        .is_cancellation());
        assert!(!ContextError::Unauthenticated.is_cancellation());
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(boxed.as_ref()), "owned boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(boxed.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn test_child_failures_keeps_all() {
        let mut failures = ChildFailures::new();
        failures.push(1, ContextError::cancelled("a"));
        failures.push(3, ContextError::Unauthenticated);

        assert_eq!(failures.len(), 2);
        assert_eq!(failures.indices(), vec![1, 3]);
        assert_eq!(failures.first(), Some(&ContextError::cancelled("a")));

        let text = failures.to_string();
        assert!(text.starts_with("2 child task(s) failed"));
        assert!(text.contains("[3]"));
    }

    #[test]
    fn test_config_error_from_json() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let ctx_err: ContextError = err.into();
        assert!(matches!(ctx_err, ContextError::Config(_)));
    }
}
