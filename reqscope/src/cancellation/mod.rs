//! Cooperative cancellation for scoped executions.

mod token;

pub use token::{CancelCallback, CancellationToken};
