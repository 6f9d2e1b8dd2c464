//! Request context values and their thread-scoped holder.
//!
//! This module provides:
//! - Immutable context snapshots (identity, token, locale, properties)
//! - The per-thread holder of the current snapshot
//! - Accessors reading and writing through the holder

mod access;
mod holder;
mod identity;
mod locale;
mod snapshot;

pub use access::{
    current_identity, current_identity_opt, current_locale, current_organization_id,
    current_token, property, require_property, set_identity, set_locale, set_property,
    set_token,
};
pub use holder::{ContextHolder, HolderGuard};
pub use identity::Identity;
pub use locale::Locale;
pub use snapshot::{ContextSnapshot, Properties};
