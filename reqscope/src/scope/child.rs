//! Launching concurrent children under a snapshot.

use crate::context::{ContextHolder, ContextSnapshot};
use crate::errors::ContextError;
use crate::propagation::WithContext;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;
use uuid::Uuid;

/// A concurrently progressing child launched by [`launch_child`].
///
/// Awaiting the handle yields the child's output, or the failure that ended
/// it. Dropping the handle detaches the child; it keeps running.
#[derive(Debug)]
#[must_use = "dropping a ChildHandle detaches the child"]
pub struct ChildHandle<T> {
    id: Uuid,
    handle: JoinHandle<T>,
}

impl<T> ChildHandle<T> {
    /// Returns the child's id, as recorded in logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Requests the child to stop at its next suspension point.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Returns a handle that can abort the child after this one is consumed.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    /// Returns true once the child has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for ChildHandle<T> {
    type Output = Result<T, ContextError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.handle).poll(cx).map(|result| {
            result.map_err(|err| {
                let err = ContextError::from_join_error(err);
                debug!(child = %id, error = %err, "Child failed");
                err
            })
        })
    }
}

/// Spawns `fut` on the current runtime with `snapshot` installed.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn launch_child<F>(snapshot: ContextSnapshot, fut: F) -> ChildHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let id = Uuid::new_v4();
    debug!(child = %id, "Launching child");
    ChildHandle {
        id,
        handle: tokio::spawn(fut.with_context(snapshot)),
    }
}

/// Spawns `fut` with the snapshot the caller sees right now.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn launch_child_inherited<F>(fut: F) -> ChildHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    launch_child(ContextHolder::current(), fut)
}
