//! Running work under a snapshot.

use crate::cancellation::CancellationToken;
use crate::context::{ContextHolder, ContextSnapshot};
use crate::errors::ContextError;
use crate::propagation::{PropagationToken, WithContext};
use crate::runtime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// Where a scoped execution runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerCategory {
    /// The worker pool of the current runtime.
    #[default]
    Default,
    /// The blocking pool; the work is driven to completion on a blocking thread.
    Blocking,
    /// The shared elastic pool (see [`runtime::elastic_handle`]).
    Elastic,
}

impl fmt::Display for WorkerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::Blocking => "blocking",
            Self::Elastic => "elastic",
        };
        f.write_str(name)
    }
}

/// Aborts the task if the awaiting side goes away first.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs `fut` on the calling task with `snapshot` installed for every poll.
pub async fn scoped<F: Future>(snapshot: ContextSnapshot, fut: F) -> F::Output {
    fut.with_context(snapshot).await
}

/// Runs `fut` under `snapshot`, optionally on another worker category.
///
/// With `category` set to `None` the work runs inline on the calling task.
/// Otherwise it is spawned on the chosen category and awaited; dropping the
/// returned future aborts the spawned task (blocking work runs to completion).
/// A panic inside `fut` is resumed on the caller once the worker has restored
/// its own slot.
///
/// # Errors
///
/// Returns [`ContextError::Cancelled`] if the runtime cancels the spawned task
/// and [`ContextError::Runtime`] if the elastic pool cannot start.
pub async fn run_with<F>(
    snapshot: ContextSnapshot,
    category: Option<WorkerCategory>,
    fut: F,
) -> Result<F::Output, ContextError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let scoped = fut.with_context(snapshot);
    let Some(category) = category else {
        return Ok(scoped.await);
    };

    debug!(%category, "Dispatching scoped execution");
    let handle = match category {
        WorkerCategory::Default => tokio::spawn(scoped),
        WorkerCategory::Blocking => {
            let runtime = Handle::current();
            tokio::task::spawn_blocking(move || runtime.block_on(scoped))
        }
        WorkerCategory::Elastic => runtime::elastic_handle()?.spawn(scoped),
    };

    let mut guard = AbortOnDrop(handle);
    match (&mut guard.0).await {
        Ok(output) => Ok(output),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => Err(ContextError::cancelled(format!(
            "{category} worker cancelled the task"
        ))),
    }
}

/// Like [`run_with`], inheriting the snapshot the caller sees right now.
///
/// The snapshot is captured when this function is called, not when the
/// returned future is first polled.
///
/// # Errors
///
/// See [`run_with`].
pub fn run_with_current<F>(
    category: Option<WorkerCategory>,
    fut: F,
) -> impl Future<Output = Result<F::Output, ContextError>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    run_with(ContextHolder::current(), category, fut)
}

/// Runs a blocking closure on the blocking pool under `snapshot`.
///
/// # Errors
///
/// Returns [`ContextError::Cancelled`] if the runtime shuts down first.
pub async fn run_blocking_with<F, R>(snapshot: ContextSnapshot, f: F) -> Result<R, ContextError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let token = PropagationToken::new(snapshot);
    match tokio::task::spawn_blocking(token.wrap(f)).await {
        Ok(output) => Ok(output),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => Err(ContextError::cancelled("blocking worker cancelled the task")),
    }
}

/// Runs `fut` under `snapshot` with a deadline.
///
/// On expiry the work is dropped between polls, so its snapshot is not left
/// installed anywhere.
///
/// # Errors
///
/// Returns [`ContextError::TimedOut`] when the deadline elapses first.
pub async fn run_with_timeout<F: Future>(
    snapshot: ContextSnapshot,
    after: Duration,
    fut: F,
) -> Result<F::Output, ContextError> {
    tokio::time::timeout(after, fut.with_context(snapshot))
        .await
        .map_err(|_| {
            debug!(?after, "Scoped execution timed out");
            ContextError::TimedOut { after }
        })
}

/// Runs `fut` under `snapshot` until it completes or `cancel` fires.
///
/// Work is not started if `cancel` is already cancelled.
///
/// # Errors
///
/// Returns [`ContextError::Cancelled`] with the token's reason.
pub async fn run_until_cancelled<F: Future>(
    snapshot: ContextSnapshot,
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ContextError> {
    let cancelled_error = || {
        ContextError::cancelled(cancel.reason().unwrap_or_else(|| "cancelled".to_string()))
    };

    if cancel.is_cancelled() {
        return Err(cancelled_error());
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(cancelled_error()),
        output = fut.with_context(snapshot) => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{current_token, Locale};
    use futures::FutureExt;
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn with_token(token: &str) -> ContextSnapshot {
        ContextSnapshot::empty().with_token(token)
    }

    #[tokio::test]
    async fn test_scoped_inline() {
        let seen = scoped(with_token("inline"), async { current_token() }).await;
        assert_eq!(seen.as_deref(), Some("inline"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_with_every_category() {
        for category in [
            None,
            Some(WorkerCategory::Default),
            Some(WorkerCategory::Blocking),
            Some(WorkerCategory::Elastic),
        ] {
            let seen = run_with(with_token("cat"), category, async {
                tokio::time::sleep(Duration::from_millis(2)).await;
                current_token()
            })
            .await
            .unwrap();
            assert_eq!(seen.as_deref(), Some("cat"), "category {category:?}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_with_current_inherits() {
        ContextHolder::replace(with_token("parent").with_locale(Locale::parse("es")));
        let (token, locale) = run_with_current(Some(WorkerCategory::Default), async {
            (current_token(), crate::context::current_locale())
        })
        .await
        .unwrap();
        ContextHolder::clear();

        assert_eq!(token.as_deref(), Some("parent"));
        assert_eq!(locale, Locale::parse("es"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawned_panic_is_resumed_on_caller() {
        ContextHolder::replace(with_token("caller"));
        let result = AssertUnwindSafe(run_with(
            with_token("inner"),
            Some(WorkerCategory::Default),
            async {
                panic!("spawned failure");
            },
        ))
        .catch_unwind()
        .await;

        assert!(result.is_err());
        assert_eq!(current_token().as_deref(), Some("caller"));
        ContextHolder::clear();
    }

    #[tokio::test]
    async fn test_run_blocking_with() {
        let seen = run_blocking_with(with_token("blocking"), current_token)
            .await
            .unwrap();
        assert_eq!(seen.as_deref(), Some("blocking"));
    }

    #[tokio::test]
    async fn test_run_with_timeout_expires_and_restores() {
        ContextHolder::replace(with_token("caller"));
        let result = run_with_timeout(with_token("slow"), Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;

        assert_eq!(
            result,
            Err(ContextError::TimedOut {
                after: Duration::from_millis(10)
            })
        );
        assert_eq!(current_token().as_deref(), Some("caller"));
        ContextHolder::clear();
    }

    #[tokio::test]
    async fn test_run_with_timeout_completes() {
        let out = run_with_timeout(with_token("fast"), Duration::from_secs(1), async {
            current_token()
        })
        .await
        .unwrap();
        assert_eq!(out.as_deref(), Some("fast"));
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel("request aborted");
        });

        ContextHolder::replace(with_token("caller"));
        let result = run_until_cancelled(with_token("work"), &cancel, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;

        assert_eq!(result, Err(ContextError::cancelled("request aborted")));
        assert_eq!(current_token().as_deref(), Some("caller"));
        ContextHolder::clear();
    }

    #[tokio::test]
    async fn test_run_until_cancelled_skips_when_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel("early");
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();

        let result = run_until_cancelled(ContextSnapshot::empty(), &cancel, async move {
            flag.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(result.is_err());
        assert!(!started.load(Ordering::SeqCst));
    }

    #[test]
    fn test_category_serde_and_display() {
        assert_eq!(WorkerCategory::default(), WorkerCategory::Default);
        assert_eq!(WorkerCategory::Elastic.to_string(), "elastic");
        let parsed: WorkerCategory = serde_json::from_str("\"blocking\"").unwrap();
        assert_eq!(parsed, WorkerCategory::Blocking);
    }
}
