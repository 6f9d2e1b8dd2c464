//! # Reqscope
//!
//! Request-scoped identity, locale and property context for tokio services.
//!
//! Reqscope gives every piece of code running on behalf of a request a
//! consistent view of who the caller is, which locale they want and which
//! properties were attached to the request, without that view leaking into
//! another request that reuses the same worker thread:
//!
//! - **Snapshots**: immutable values bundling identity, token, locale and properties
//! - **Holder**: one current snapshot per OS thread, materialized on first read
//! - **Propagation**: futures that install their snapshot on every poll and restore after it
//! - **Scoped execution**: run work under a snapshot on the default, blocking or elastic workers
//! - **Fan-out**: launch children carrying explicit or inherited snapshots
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reqscope::prelude::*;
//!
//! let request = ContextSnapshot::empty()
//!     .with_identity(Identity::new("alice"))
//!     .with_locale(Locale::parse("fr-FR"));
//!
//! let greeting = run_with(request, Some(WorkerCategory::Default), async {
//!     format!("bonjour {}", current_identity()?.id)
//! })
//! .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod errors;
pub mod observability;
pub mod propagation;
pub mod runtime;
pub mod scope;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{BlockingConfig, ContextConfig, ElasticConfig, LoggingConfig};
    pub use crate::context::{
        current_identity, current_locale, current_organization_id, current_token, property,
        set_property, ContextHolder, ContextSnapshot, Identity, Locale, Properties,
    };
    pub use crate::errors::{ChildFailures, ContextError};
    pub use crate::propagation::{PropagationToken, Scoped, WithContext};
    pub use crate::scope::{
        launch_child, launch_child_inherited, run_blocking_with, run_until_cancelled, run_with,
        run_with_current, run_with_timeout, scoped, ChildGroup, ChildHandle, WorkerCategory,
    };
}
