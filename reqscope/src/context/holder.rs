//! Thread-scoped storage of the current snapshot.

use super::ContextSnapshot;
use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static CURRENT: RefCell<Option<ContextSnapshot>> = const { RefCell::new(None) };
}

/// Per-thread slot holding the currently installed [`ContextSnapshot`].
///
/// Each OS thread owns exactly one slot and only that thread reads or writes
/// it. The slot answers "what is installed on the thread running right now",
/// not "what belongs to this logical task"; tasks that hop threads must carry
/// their snapshot through [`crate::propagation::Scoped`].
///
/// Reading an empty slot materializes [`ContextSnapshot::empty`] and stores it,
/// so consecutive reads return the same value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextHolder;

impl ContextHolder {
    /// Returns the current thread's snapshot, materializing the default on first read.
    #[must_use]
    pub fn current() -> ContextSnapshot {
        CURRENT.with(|slot| {
            slot.borrow_mut()
                .get_or_insert_with(ContextSnapshot::empty)
                .clone()
        })
    }

    /// Returns the current snapshot without materializing a default.
    #[must_use]
    pub fn peek() -> Option<ContextSnapshot> {
        CURRENT.with(|slot| slot.borrow().clone())
    }

    /// Returns true if the slot holds a snapshot.
    #[must_use]
    pub fn is_set() -> bool {
        CURRENT.with(|slot| slot.borrow().is_some())
    }

    /// Overwrites the slot, returning what was stored before.
    pub fn replace(snapshot: ContextSnapshot) -> Option<ContextSnapshot> {
        CURRENT.with(|slot| slot.borrow_mut().replace(snapshot))
    }

    /// Applies `f` to the current snapshot and stores the result.
    ///
    /// `f` runs outside the slot borrow, so it may itself read the holder.
    pub fn update<F>(f: F) -> ContextSnapshot
    where
        F: FnOnce(&ContextSnapshot) -> ContextSnapshot,
    {
        let next = f(&Self::current());
        Self::replace(next.clone());
        next
    }

    /// Removes the slot content. The next [`current`](Self::current) yields the default again.
    pub fn clear() {
        Self::take();
    }

    /// Removes and returns the slot content.
    pub fn take() -> Option<ContextSnapshot> {
        CURRENT.with(|slot| slot.borrow_mut().take())
    }

    /// Installs `snapshot` until the returned guard is dropped.
    ///
    /// On drop the slot goes back to exactly what it held before, including
    /// being unset.
    #[must_use = "the snapshot is uninstalled when the guard is dropped"]
    pub fn enter(snapshot: ContextSnapshot) -> HolderGuard {
        HolderGuard {
            previous: Self::replace(snapshot),
            _not_send: PhantomData,
        }
    }

    pub(crate) fn restore_raw(previous: Option<ContextSnapshot>) {
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Restores the previous slot content on drop.
///
/// The guard is bound to the thread that created it.
#[derive(Debug)]
pub struct HolderGuard {
    previous: Option<ContextSnapshot>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for HolderGuard {
    fn drop(&mut self) {
        ContextHolder::restore_raw(self.previous.take());
    }
}
