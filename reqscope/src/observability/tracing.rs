//! Tracing integration for request contexts.
//!
//! Tokens are never recorded verbatim; spans carry a short sha256
//! fingerprint instead so log lines from one session can still be correlated.

use crate::config::LoggingConfig;
use crate::context::ContextSnapshot;
use crate::errors::ContextError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

const FINGERPRINT_LEN: usize = 12;

/// Returns a short, non-reversible fingerprint of a token.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}

/// Span attributes describing a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSpanAttributes {
    /// Caller identity id.
    pub identity_id: Option<String>,
    /// Caller organization id.
    pub organization_id: Option<String>,
    /// Locale tag.
    pub locale: String,
    /// Token fingerprint.
    pub token_fingerprint: Option<String>,
    /// Property keys (values are omitted).
    pub property_keys: Vec<String>,
}

impl ContextSpanAttributes {
    /// Extracts attributes from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &ContextSnapshot) -> Self {
        let identity = snapshot.identity();
        Self {
            identity_id: identity.map(|i| i.id.clone()),
            organization_id: identity.and_then(|i| i.organization_id.clone()),
            locale: snapshot.locale().tag(),
            token_fingerprint: snapshot.token().map(token_fingerprint),
            property_keys: snapshot.properties().keys().cloned().collect(),
        }
    }

    /// Converts to OpenTelemetry-style attributes.
    #[must_use]
    pub fn to_otel_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();

        attrs.insert("context.locale".to_string(), self.locale.clone());
        if let Some(ref v) = self.identity_id {
            attrs.insert("enduser.id".to_string(), v.clone());
        }
        if let Some(ref v) = self.organization_id {
            attrs.insert("enduser.organization".to_string(), v.clone());
        }
        if let Some(ref v) = self.token_fingerprint {
            attrs.insert("context.token_fingerprint".to_string(), v.clone());
        }
        if !self.property_keys.is_empty() {
            attrs.insert(
                "context.property_keys".to_string(),
                self.property_keys.join(","),
            );
        }

        attrs
    }
}

/// Creates an info span describing `snapshot`.
#[must_use]
pub fn context_span(snapshot: &ContextSnapshot) -> tracing::Span {
    let attrs = ContextSpanAttributes::from_snapshot(snapshot);
    tracing::info_span!(
        "request_context",
        identity = attrs.identity_id.as_deref().unwrap_or("-"),
        organization = attrs.organization_id.as_deref().unwrap_or("-"),
        locale = %attrs.locale,
        token = attrs.token_fingerprint.as_deref().unwrap_or("-"),
    )
}

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.filter`.
///
/// # Errors
///
/// Returns [`ContextError::Config`] for an invalid filter or when a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ContextError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| ContextError::Config(format!("invalid log filter: {e}")))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ContextError::Config(format!("logging init failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Identity, Locale};

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = token_fingerprint("secret-token");
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert_eq!(a, token_fingerprint("secret-token"));
        assert_ne!(a, token_fingerprint("other-token"));
        assert!(!a.contains("secret"));
    }

    #[test]
    fn test_attributes_from_snapshot() {
        let snapshot = ContextSnapshot::empty()
            .with_identity(Identity::new("u-1").with_organization_id("acme"))
            .with_token("secret")
            .with_locale(Locale::parse("fr-FR"))
            .with_property("b", "2")
            .with_property("a", "1");

        let attrs = ContextSpanAttributes::from_snapshot(&snapshot);
        assert_eq!(attrs.identity_id.as_deref(), Some("u-1"));
        assert_eq!(attrs.organization_id.as_deref(), Some("acme"));
        assert_eq!(attrs.locale, "fr-FR");
        assert_eq!(attrs.token_fingerprint, Some(token_fingerprint("secret")));
        assert_eq!(attrs.property_keys, vec!["a".to_string(), "b".to_string()]);

        let otel = attrs.to_otel_attributes();
        assert_eq!(otel.get("enduser.id").map(String::as_str), Some("u-1"));
        assert_eq!(otel.get("context.property_keys").map(String::as_str), Some("a,b"));
        assert!(otel.values().all(|v| v != "secret"));
    }

    #[test]
    fn test_empty_snapshot_attributes() {
        let attrs = ContextSpanAttributes::from_snapshot(&ContextSnapshot::empty());
        assert_eq!(attrs.locale, "und");
        let otel = attrs.to_otel_attributes();
        assert_eq!(otel.len(), 1);
    }

    #[test]
    fn test_context_span_constructs() {
        let span = context_span(&ContextSnapshot::empty().with_token("t"));
        let _entered = span.enter();
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(matches!(init_logging(&config), Err(ContextError::Config(_))));
    }
}
