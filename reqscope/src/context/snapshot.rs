//! Immutable request context snapshots.

use super::{Identity, Locale};
use crate::errors::ContextError;
use crate::observability::token_fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Property table carried by a snapshot.
pub type Properties = BTreeMap<String, String>;

/// An immutable snapshot of who is asking and in what context.
///
/// Every `with_*` and `set_property` call returns a new snapshot; fields that
/// did not change are shared by `Arc` with the original. Equality and hashing
/// are structural over properties, identity, token and locale. `Debug`
/// output shows a fingerprint of the token, never the token itself.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Ad-hoc key/value properties.
    #[serde(default)]
    properties: Arc<Properties>,

    /// The caller identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity: Option<Arc<Identity>>,

    /// Opaque bearer/session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<Arc<str>>,

    /// Preferred locale.
    #[serde(default)]
    locale: Locale,
}

impl ContextSnapshot {
    /// Creates an empty snapshot: no properties, identity or token, root locale.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a snapshot from its fields.
    #[must_use]
    pub fn create(
        properties: Properties,
        identity: Option<Identity>,
        token: Option<String>,
        locale: Option<Locale>,
    ) -> Self {
        Self {
            properties: Arc::new(properties),
            identity: identity.map(Arc::new),
            token: token.map(Arc::from),
            locale: locale.unwrap_or_default(),
        }
    }

    /// Returns a copy with the identity replaced.
    #[must_use]
    pub fn with_identity(&self, identity: impl Into<Arc<Identity>>) -> Self {
        Self {
            identity: Some(identity.into()),
            ..self.clone()
        }
    }

    /// Returns a copy with no identity.
    #[must_use]
    pub fn without_identity(&self) -> Self {
        Self {
            identity: None,
            ..self.clone()
        }
    }

    /// Returns a copy with the token replaced.
    #[must_use]
    pub fn with_token(&self, token: impl Into<Arc<str>>) -> Self {
        Self {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    /// Returns a copy with no token.
    #[must_use]
    pub fn without_token(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }

    /// Returns a copy with the locale replaced.
    #[must_use]
    pub fn with_locale(&self, locale: Locale) -> Self {
        Self {
            locale,
            ..self.clone()
        }
    }

    /// Returns a copy with the whole property table replaced.
    #[must_use]
    pub fn with_properties(&self, properties: Properties) -> Self {
        Self {
            properties: Arc::new(properties),
            ..self.clone()
        }
    }

    /// Returns a copy with `key` set to `value`, or removed when `value` is `None`.
    #[must_use]
    pub fn set_property(&self, key: impl Into<String>, value: Option<String>) -> Self {
        let key = key.into();
        match value {
            Some(value) => {
                if self.property(&key) == Some(value.as_str()) {
                    return self.clone();
                }
                let mut properties = (*self.properties).clone();
                properties.insert(key, value);
                self.with_properties(properties)
            }
            None => {
                if !self.properties.contains_key(&key) {
                    return self.clone();
                }
                let mut properties = (*self.properties).clone();
                properties.remove(&key);
                self.with_properties(properties)
            }
        }
    }

    /// Returns a copy with `key` set to `value`.
    #[must_use]
    pub fn with_property(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(key, Some(value.into()))
    }

    /// Returns a copy without `key`.
    #[must_use]
    pub fn without_property(&self, key: impl Into<String>) -> Self {
        self.set_property(key, None)
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns a property value or an unresolved-context error.
    pub fn require_property(&self, key: &str) -> Result<&str, ContextError> {
        self.property(key)
            .ok_or_else(|| ContextError::unresolved(key))
    }

    /// Returns the property table.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Returns the identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Arc<Identity>> {
        self.identity.as_ref()
    }

    /// Returns the identity or the unauthenticated error.
    pub fn require_identity(&self) -> Result<&Arc<Identity>, ContextError> {
        self.identity.as_ref().ok_or(ContextError::Unauthenticated)
    }

    /// Returns the token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns the locale.
    #[must_use]
    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Returns true if nothing but the defaults is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::empty()
    }
}

impl fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSnapshot")
            .field("properties", &self.properties)
            .field("identity", &self.identity)
            .field(
                "token",
                &self
                    .token
                    .as_deref()
                    .map(|t| format!("sha256:{}", token_fingerprint(t))),
            )
            .field("locale", &self.locale)
            .finish()
    }
}
