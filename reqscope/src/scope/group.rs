//! Structured fan-out of children sharing a parent context.

use super::child::{launch_child, ChildHandle};
use crate::cancellation::CancellationToken;
use crate::context::{ContextHolder, ContextSnapshot};
use crate::errors::{ChildFailures, ContextError};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use std::future::Future;
use tracing::warn;

/// A group of children launched from one parent.
///
/// Each child carries an explicit or inherited snapshot. Children run
/// independently and may finish in any order; results are returned in launch
/// order. The group's cancellation token is cancelled on the first failure so
/// cooperative children can stop early.
pub struct ChildGroup<T> {
    cancel_token: CancellationToken,
    children: RwLock<Vec<ChildHandle<T>>>,
}

impl<T: Send + 'static> ChildGroup<T> {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            children: RwLock::new(Vec::new()),
        }
    }

    /// Returns the group's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Launches a child under `snapshot`.
    pub fn spawn<F>(&self, snapshot: ContextSnapshot, fut: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.children.write().push(launch_child(snapshot, fut));
    }

    /// Launches a child under the snapshot the caller sees right now.
    pub fn spawn_inherited<F>(&self, fut: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.spawn(ContextHolder::current(), fut);
    }

    /// Returns the number of children not yet joined.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.read().len()
    }

    /// Returns true if there are no children to join.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.read().is_empty()
    }

    /// Aborts every child not yet joined and cancels the group token.
    pub fn abort_all(&self, reason: &str) {
        self.cancel_token.cancel(reason);
        for child in self.children.read().iter() {
            child.abort();
        }
    }

    /// Waits for every child.
    ///
    /// Returns all outputs in launch order, or every failure that occurred;
    /// no failure is dropped in favour of another.
    pub async fn join_all(&self) -> Result<Vec<T>, ChildFailures> {
        let children = std::mem::take(&mut *self.children.write());
        let mut outputs = Vec::with_capacity(children.len());
        let mut failures = ChildFailures::new();

        for (index, child) in children.into_iter().enumerate() {
            match child.await {
                Ok(output) => outputs.push(output),
                Err(err) => {
                    warn!(index, error = %err, "Child task failed");
                    self.cancel_token.cancel(err.to_string());
                    failures.push(index, err);
                }
            }
        }

        if failures.is_empty() {
            Ok(outputs)
        } else {
            Err(failures)
        }
    }

    /// Waits for every child, stopping at the first failure to complete.
    ///
    /// The first failure in completion order is returned and the remaining
    /// children are aborted.
    pub async fn join_first(&self) -> Result<Vec<T>, ContextError> {
        let children = std::mem::take(&mut *self.children.write());
        let aborts: Vec<_> = children.iter().map(ChildHandle::abort_handle).collect();
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None)
            .take(children.len())
            .collect();

        let mut pending: FuturesUnordered<_> = children
            .into_iter()
            .enumerate()
            .map(|(index, child)| async move { (index, child.await) })
            .collect();

        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(output) => slots[index] = Some(output),
                Err(err) => {
                    warn!(index, error = %err, "Child task failed, aborting siblings");
                    self.cancel_token.cancel(err.to_string());
                    for abort in &aborts {
                        abort.abort();
                    }
                    return Err(err);
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

impl<T: Send + 'static> Default for ChildGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ChildGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildGroup")
            .field("child_count", &self.children.read().len())
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}
