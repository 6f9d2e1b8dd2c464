//! Accessors over the current thread's snapshot.
//!
//! Reads delegate to [`ContextHolder::current`]. Writes build a replacement
//! snapshot and swap it into the holder; a snapshot already handed out is
//! never changed.

use super::{ContextHolder, ContextSnapshot, Identity, Locale};
use crate::errors::ContextError;
use std::sync::Arc;

/// Returns the current caller identity.
///
/// # Errors
///
/// Returns [`ContextError::Unauthenticated`] when no identity is installed.
pub fn current_identity() -> Result<Arc<Identity>, ContextError> {
    ContextHolder::current().require_identity().cloned()
}

/// Returns the current caller identity if one is installed.
#[must_use]
pub fn current_identity_opt() -> Option<Arc<Identity>> {
    ContextHolder::current().identity().cloned()
}

/// Returns the organization the current caller acts for.
///
/// # Errors
///
/// Returns [`ContextError::Unauthenticated`] without an identity and
/// [`ContextError::UnresolvedContext`] when the identity has no organization.
pub fn current_organization_id() -> Result<String, ContextError> {
    current_identity()?
        .organization_id
        .clone()
        .ok_or_else(|| ContextError::unresolved("organization_id"))
}

/// Returns the current token, if any.
#[must_use]
pub fn current_token() -> Option<String> {
    ContextHolder::current().token().map(str::to_owned)
}

/// Returns the current locale; root when none was chosen.
#[must_use]
pub fn current_locale() -> Locale {
    ContextHolder::current().locale().clone()
}

/// Returns a property of the current snapshot.
#[must_use]
pub fn property(key: &str) -> Option<String> {
    ContextHolder::current().property(key).map(str::to_owned)
}

/// Returns a property of the current snapshot or an unresolved-context error.
pub fn require_property(key: &str) -> Result<String, ContextError> {
    ContextHolder::current()
        .require_property(key)
        .map(str::to_owned)
}

/// Sets or removes a property on the current thread's snapshot.
pub fn set_property(key: impl Into<String>, value: Option<String>) -> ContextSnapshot {
    let key = key.into();
    ContextHolder::update(move |s| s.set_property(key, value))
}

/// Replaces the identity on the current thread's snapshot.
pub fn set_identity(identity: Option<Identity>) -> ContextSnapshot {
    ContextHolder::update(move |s| match identity {
        Some(identity) => s.with_identity(identity),
        None => s.without_identity(),
    })
}

/// Replaces the token on the current thread's snapshot.
pub fn set_token(token: Option<String>) -> ContextSnapshot {
    ContextHolder::update(move |s| match token {
        Some(token) => s.with_token(token),
        None => s.without_token(),
    })
}

/// Replaces the locale on the current thread's snapshot.
pub fn set_locale(locale: Locale) -> ContextSnapshot {
    ContextHolder::update(move |s| s.with_locale(locale))
}
