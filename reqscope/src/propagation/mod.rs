//! Propagation of a snapshot into the threads that run a task.
//!
//! This module provides:
//! - `PropagationToken`, the install/restore pair for a captured snapshot
//! - `Scoped`, a future that brackets every poll with install/restore
//! - `WithContext`, an extension trait attaching a snapshot to any future

mod future;
mod token;

pub use future::{Scoped, WithContext};
pub use token::{PropagationGuard, PropagationToken};
