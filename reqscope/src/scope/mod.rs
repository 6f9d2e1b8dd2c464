//! Scoped execution and fan-out helpers.
//!
//! Every helper wraps the work in a [`crate::propagation::Scoped`] future, so
//! the chosen snapshot is installed before the first instruction of the work,
//! re-installed on every resume, and restored on every suspension, completion,
//! panic or cancellation.

mod child;
mod group;
mod run;

pub use child::{launch_child, launch_child_inherited, ChildHandle};
pub use group::ChildGroup;
pub use run::{
    run_blocking_with, run_until_cancelled, run_with, run_with_current, run_with_timeout,
    scoped, WorkerCategory,
};
