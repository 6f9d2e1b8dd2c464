//! Futures that carry a snapshot across suspension points.

use super::PropagationToken;
use crate::context::ContextSnapshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project_lite::pin_project! {
    /// A future that runs every poll of `inner` with a snapshot installed.
    ///
    /// A tokio task may resume on a different worker thread after each
    /// suspension, so the snapshot is installed at the start of every poll
    /// and the thread's previous value is restored when the poll returns or
    /// unwinds. Between polls nothing of this future is left installed on
    /// any thread, which makes dropping it (abort, timeout, `select!`) safe.
    #[derive(Debug)]
    #[must_use = "futures do nothing unless polled"]
    pub struct Scoped<F> {
        token: PropagationToken,
        #[pin]
        inner: F,
    }
}

impl<F> Scoped<F> {
    /// Wraps `inner` so it runs under `token`.
    pub fn new(token: PropagationToken, inner: F) -> Self {
        Self { token, inner }
    }

    /// Returns the token governing this future.
    pub fn token(&self) -> &PropagationToken {
        &self.token
    }

    /// Returns the wrapped future.
    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _guard = this.token.enter();
        this.inner.poll(cx)
    }
}

/// Attaches a snapshot to any future.
pub trait WithContext: Future + Sized {
    /// Runs this future under `snapshot`.
    fn with_context(self, snapshot: ContextSnapshot) -> Scoped<Self> {
        Scoped::new(PropagationToken::new(snapshot), self)
    }

    /// Runs this future under the snapshot the calling thread sees now.
    fn with_current_context(self) -> Scoped<Self> {
        Scoped::new(PropagationToken::capture(), self)
    }
}

impl<F: Future> WithContext for F {}
