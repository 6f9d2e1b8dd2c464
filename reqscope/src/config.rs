//! Configuration for worker categories and logging.

use crate::errors::ContextError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Elastic worker pool settings.
    #[serde(default)]
    pub elastic: ElasticConfig,
    /// Blocking worker pool settings.
    #[serde(default)]
    pub blocking: BlockingConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Whether runtime threads clear their holder slot whenever they park.
    #[serde(default = "default_clear_on_park")]
    pub clear_on_park: bool,
}

fn default_clear_on_park() -> bool {
    true
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            elastic: ElasticConfig::default(),
            blocking: BlockingConfig::default(),
            logging: LoggingConfig::default(),
            clear_on_park: default_clear_on_park(),
        }
    }
}

impl ContextConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Config`] for malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ContextError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ContextError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ContextError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Sets the elastic pool settings.
    #[must_use]
    pub fn with_elastic(mut self, elastic: ElasticConfig) -> Self {
        self.elastic = elastic;
        self
    }

    /// Sets the blocking pool settings.
    #[must_use]
    pub fn with_blocking(mut self, blocking: BlockingConfig) -> Self {
        self.blocking = blocking;
        self
    }

    /// Sets the logging settings.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

/// Settings for the elastic worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticConfig {
    /// Number of worker threads.
    #[serde(default = "default_elastic_threads")]
    pub worker_threads: usize,
    /// Thread name prefix.
    #[serde(default = "default_elastic_thread_name")]
    pub thread_name: String,
}

fn default_elastic_threads() -> usize {
    4
}

fn default_elastic_thread_name() -> String {
    "reqscope-elastic".to_string()
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_elastic_threads(),
            thread_name: default_elastic_thread_name(),
        }
    }
}

impl ElasticConfig {
    /// Sets the worker thread count; zero is raised to one.
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }
}

/// Settings for the blocking worker pool of runtimes built by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingConfig {
    /// Upper bound on blocking threads.
    #[serde(default = "default_max_blocking_threads")]
    pub max_threads: usize,
}

fn default_max_blocking_threads() -> usize {
    512
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            max_threads: default_max_blocking_threads(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ContextConfig::new();
        assert_eq!(config.elastic.worker_threads, 4);
        assert_eq!(config.elastic.thread_name, "reqscope-elastic");
        assert_eq!(config.blocking.max_threads, 512);
        assert_eq!(config.logging.filter, "info");
        assert!(!config.logging.json);
        assert!(config.clear_on_park);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = ContextConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ContextConfig::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = ContextConfig::from_json_str(
            r#"{"elastic": {"worker_threads": 2}, "logging": {"json": true}, "clear_on_park": false}"#,
        )
        .unwrap();

        assert_eq!(config.elastic.worker_threads, 2);
        assert_eq!(config.elastic.thread_name, "reqscope-elastic");
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "info");
        assert!(!config.clear_on_park);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = ContextConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ContextError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"blocking": {{"max_threads": 8}}}}"#).unwrap();

        let config = ContextConfig::from_file(file.path()).unwrap();
        assert_eq!(config.blocking.max_threads, 8);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContextConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ContextError::Config(msg) if msg.contains("absent.json")));
    }

    #[test]
    fn test_elastic_threads_floor() {
        assert_eq!(
            ElasticConfig::default().with_worker_threads(0).worker_threads,
            1
        );
    }
}
