//! Install/restore adapter for a captured snapshot.

use crate::context::{ContextHolder, ContextSnapshot};
use std::marker::PhantomData;
use tracing::trace;

/// A snapshot captured for one scoped invocation.
///
/// The token is a point-in-time copy, not a live link to the holder. Each time
/// the work it governs runs on a thread, [`install`](Self::install) swaps the
/// captured snapshot into that thread's holder and remembers what was there;
/// [`restore`](Self::restore) puts it back.
///
/// Two tokens are equal when their captured snapshots are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropagationToken {
    snapshot: ContextSnapshot,
}

impl PropagationToken {
    /// Captures an explicit snapshot.
    #[must_use]
    pub fn new(snapshot: ContextSnapshot) -> Self {
        Self { snapshot }
    }

    /// Captures whatever the calling thread currently sees.
    #[must_use]
    pub fn capture() -> Self {
        Self::new(ContextHolder::current())
    }

    /// Returns the captured snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }

    /// Installs the captured snapshot on this thread and returns the previous one.
    ///
    /// An untouched slot is materialized to the default before it is remembered.
    #[must_use = "the previous snapshot must be handed back to `restore`"]
    pub fn install(&self) -> ContextSnapshot {
        let previous = ContextHolder::current();
        ContextHolder::replace(self.snapshot.clone());
        trace!(has_token = self.snapshot.token().is_some(), "Context installed");
        previous
    }

    /// Writes `previous` back, discarding whatever is installed now.
    pub fn restore(&self, previous: ContextSnapshot) {
        ContextHolder::replace(previous);
        trace!("Context restored");
    }

    /// Installs the snapshot until the returned guard drops.
    ///
    /// The guard restores during unwinding too.
    #[must_use = "the snapshot is restored when the guard is dropped"]
    pub fn enter(&self) -> PropagationGuard<'_> {
        PropagationGuard {
            previous: Some(self.install()),
            token: self,
            _not_send: PhantomData,
        }
    }

    /// Runs `f` synchronously with the snapshot installed.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    /// Wraps `f` so it runs under the snapshot on whichever thread calls it.
    pub fn wrap<F, R>(self, f: F) -> impl FnOnce() -> R
    where
        F: FnOnce() -> R,
    {
        move || self.scope(f)
    }
}

impl From<ContextSnapshot> for PropagationToken {
    fn from(snapshot: ContextSnapshot) -> Self {
        Self::new(snapshot)
    }
}

/// Restores the previous snapshot when dropped.
#[derive(Debug)]
pub struct PropagationGuard<'a> {
    previous: Option<ContextSnapshot>,
    token: &'a PropagationToken,
    _not_send: PhantomData<*const ()>,
}

impl Drop for PropagationGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.token.restore(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Locale;

    fn on_fresh_thread<F: FnOnce() + Send + 'static>(f: F) {
        std::thread::spawn(f).join().unwrap();
    }

    #[test]
    fn test_install_then_restore() {
        on_fresh_thread(|| {
            let outer = ContextSnapshot::empty().with_token("outer");
            ContextHolder::replace(outer.clone());

            let token = PropagationToken::new(ContextSnapshot::empty().with_token("inner"));
            let previous = token.install();
            assert_eq!(previous, outer);
            assert_eq!(ContextHolder::current().token(), Some("inner"));

            token.restore(previous);
            assert_eq!(ContextHolder::current(), outer);
        });
    }

    #[test]
    fn test_install_materializes_untouched_slot() {
        on_fresh_thread(|| {
            let token = PropagationToken::new(ContextSnapshot::empty().with_token("t"));
            let previous = token.install();
            assert!(previous.is_empty());
            token.restore(previous);
            assert!(ContextHolder::current().is_empty());
        });
    }

    #[test]
    fn test_restore_discards_writes_made_while_installed() {
        on_fresh_thread(|| {
            let token = PropagationToken::new(ContextSnapshot::empty());
            token.scope(|| {
                crate::context::set_property("scratch", Some("x".into()));
                assert_eq!(crate::context::property("scratch").as_deref(), Some("x"));
            });
            assert!(crate::context::property("scratch").is_none());
            assert!(token.snapshot().property("scratch").is_none());
        });
    }

    #[test]
    fn test_nested_tokens_restore_in_reverse() {
        on_fresh_thread(|| {
            let a = PropagationToken::new(ContextSnapshot::empty().with_locale(Locale::parse("fr")));
            let b = PropagationToken::new(ContextSnapshot::empty().with_locale(Locale::parse("de")));

            a.scope(|| {
                assert_eq!(ContextHolder::current(), *a.snapshot());
                b.scope(|| assert_eq!(ContextHolder::current(), *b.snapshot()));
                assert_eq!(ContextHolder::current(), *a.snapshot());
            });
            assert!(ContextHolder::current().is_empty());
        });
    }

    #[test]
    fn test_guard_restores_on_panic() {
        on_fresh_thread(|| {
            ContextHolder::replace(ContextSnapshot::empty().with_token("before"));
            let token = PropagationToken::new(ContextSnapshot::empty().with_token("during"));

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                token.scope(|| panic!("block failed"));
            }));

            assert!(result.is_err());
            assert_eq!(ContextHolder::current().token(), Some("before"));
        });
    }

    #[test]
    fn test_wrap_carries_snapshot_to_other_thread() {
        let token = PropagationToken::new(ContextSnapshot::empty().with_token("carried"));
        let seen = std::thread::spawn(token.wrap(|| crate::context::current_token()))
            .join()
            .unwrap();
        assert_eq!(seen.as_deref(), Some("carried"));
    }

    #[test]
    fn test_token_equality_is_snapshot_equality() {
        let a = PropagationToken::from(ContextSnapshot::empty().with_token("x"));
        let b = PropagationToken::from(ContextSnapshot::empty().with_token("x"));
        let c = PropagationToken::from(ContextSnapshot::empty().with_token("y"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
