//! Tokio runtime integration.
//!
//! Runtimes built here clear the holder slot of each worker thread when the
//! thread starts, stops and (optionally) parks, so a pooled thread never hands
//! a stale snapshot to the next task it runs.

use crate::config::{ContextConfig, ElasticConfig};
use crate::context::ContextHolder;
use crate::errors::ContextError;
use parking_lot::Mutex;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, warn};

static ELASTIC: ElasticPool = ElasticPool::new();

/// Adds the holder hygiene hooks to a runtime builder.
pub fn install_thread_hooks(builder: &mut Builder, clear_on_park: bool) -> &mut Builder {
    builder
        .on_thread_start(ContextHolder::clear)
        .on_thread_stop(ContextHolder::clear);
    if clear_on_park {
        builder.on_thread_park(ContextHolder::clear);
    }
    builder
}

/// Builds a multi-thread runtime configured from `config`.
///
/// The elastic settings and `clear_on_park` are also recorded for the shared
/// elastic pool, which picks them up when it first starts.
///
/// # Errors
///
/// Returns [`ContextError::Runtime`] if tokio cannot build the runtime.
pub fn build_runtime(config: &ContextConfig) -> Result<Runtime, ContextError> {
    build_runtime_in(&ELASTIC, config)
}

fn build_runtime_in(pool: &ElasticPool, config: &ContextConfig) -> Result<Runtime, ContextError> {
    pool.configure(config.elastic.clone(), config.clear_on_park);
    let mut builder = Builder::new_multi_thread();
    builder
        .enable_all()
        .max_blocking_threads(config.blocking.max_threads.max(1));
    install_thread_hooks(&mut builder, config.clear_on_park);
    Ok(builder.build()?)
}

/// Sets the elastic pool configuration used when the pool is first needed.
///
/// Elastic threads clear their slot on park. Returns false if the pool was
/// already started; the configuration is then ignored.
pub fn configure_elastic(config: ElasticConfig) -> bool {
    ELASTIC.configure(config, true)
}

/// Returns a handle to the elastic pool, starting it on first use.
///
/// # Errors
///
/// Returns [`ContextError::Runtime`] if the pool cannot be built.
pub fn elastic_handle() -> Result<Handle, ContextError> {
    ELASTIC.handle()
}

#[derive(Debug, Clone)]
struct PendingElastic {
    config: ElasticConfig,
    clear_on_park: bool,
}

/// A secondary runtime started on first use.
struct ElasticPool {
    runtime: OnceLock<Runtime>,
    pending: Mutex<Option<PendingElastic>>,
}

impl ElasticPool {
    const fn new() -> Self {
        Self {
            runtime: OnceLock::new(),
            pending: parking_lot::const_mutex(None),
        }
    }

    fn configure(&self, config: ElasticConfig, clear_on_park: bool) -> bool {
        let mut pending = self.pending.lock();
        if self.runtime.get().is_some() {
            warn!("Elastic pool already running; configuration ignored");
            return false;
        }
        *pending = Some(PendingElastic {
            config,
            clear_on_park,
        });
        true
    }

    fn handle(&self) -> Result<Handle, ContextError> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime.handle().clone());
        }

        let pending = self.pending.lock();
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime.handle().clone());
        }

        let PendingElastic {
            config,
            clear_on_park,
        } = pending.clone().unwrap_or_else(|| PendingElastic {
            config: ElasticConfig::default(),
            clear_on_park: true,
        });

        let mut builder = Builder::new_multi_thread();
        builder
            .enable_all()
            .worker_threads(config.worker_threads.max(1))
            .thread_name(config.thread_name.clone());
        install_thread_hooks(&mut builder, clear_on_park);
        let runtime = builder.build()?;
        debug!(
            worker_threads = config.worker_threads,
            thread_name = %config.thread_name,
            clear_on_park,
            "Elastic pool started"
        );

        let handle = runtime.handle().clone();
        if let Err(runtime) = self.runtime.set(runtime) {
            runtime.shutdown_background();
        }
        drop(pending);
        Ok(handle)
    }
}
