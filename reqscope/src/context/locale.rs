//! Language/region tags.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

const ROOT_TAG: &str = "und";

fn tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([A-Za-z]{2,8})(?:[-_]([A-Za-z]{2}|[0-9]{3}))?$").ok())
        .as_ref()
}

/// A language tag with an optional region.
///
/// The root locale has neither and stands for "no preference". Locales never
/// fail to construct: unrecognizable tags collapse to root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale {
    language: Option<String>,
    region: Option<String>,
}

impl Locale {
    /// The invariant root locale.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            language: None,
            region: None,
        }
    }

    /// Creates a locale from a tag; same as [`parse`](Self::parse), so a region
    /// in `language` is kept.
    #[must_use]
    pub fn new(language: &str) -> Self {
        Self::parse(language)
    }

    /// Creates a locale for a language and region.
    #[must_use]
    pub fn with_region(language: &str, region: &str) -> Self {
        Self::parse(&format!("{language}-{region}"))
    }

    /// Parses `fr`, `fr-FR` or `fr_FR`.
    ///
    /// Empty input, `root`, any tag whose language is `und` and anything that
    /// is not a language tag yield the root locale.
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() || tag.eq_ignore_ascii_case(ROOT_TAG) || tag.eq_ignore_ascii_case("root")
        {
            return Self::root();
        }

        let Some(captures) = tag_pattern().and_then(|re| re.captures(tag)) else {
            tracing::debug!(tag, "Unrecognized locale tag, using root");
            return Self::root();
        };

        let language = captures.get(1).map(|m| m.as_str().to_ascii_lowercase());
        if language.as_deref() == Some(ROOT_TAG) {
            return Self::root();
        }
        Self {
            language,
            region: captures.get(2).map(|m| m.as_str().to_ascii_uppercase()),
        }
    }

    /// Returns true for the root locale.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.language.is_none()
    }

    /// Returns the language subtag.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Returns the region subtag.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Returns the locale without its region.
    #[must_use]
    pub fn language_only(&self) -> Self {
        Self {
            language: self.language.clone(),
            region: None,
        }
    }

    /// Renders the BCP-47 tag; root renders as `und`.
    #[must_use]
    pub fn tag(&self) -> String {
        match (&self.language, &self.region) {
            (None, _) => ROOT_TAG.to_string(),
            (Some(lang), None) => lang.clone(),
            (Some(lang), Some(region)) => format!("{lang}-{region}"),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl From<&str> for Locale {
    fn from(tag: &str) -> Self {
        Self::parse(tag)
    }
}

impl Serialize for Locale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag())
    }
}

impl<'de> Deserialize<'de> for Locale {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::parse(&tag))
    }
}
