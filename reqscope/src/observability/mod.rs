//! Observability utilities.

mod tracing;

pub use self::tracing::{context_span, init_logging, token_fingerprint, ContextSpanAttributes};
