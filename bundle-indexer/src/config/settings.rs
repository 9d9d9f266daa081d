//! Indexer settings read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use bundle_indexer_pipeline::{OrchestratorConfig, WriterConfig};
use bundle_indexer_repository::opensearch::DEFAULT_INDEX_PREFIX;
use bundle_indexer_repository::IndexConfig;

use crate::IndexingError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = IndexingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(IndexingError::config(format!("unknown LOG_FORMAT {other:?}"))),
        }
    }
}

/// Settings of one indexer process.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub opensearch_url: String,
    pub index: IndexConfig,
    pub writer: WriterConfig,
    pub orchestrator: OrchestratorConfig,
    pub log_format: LogFormat,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            opensearch_url: DEFAULT_OPENSEARCH_URL.to_string(),
            index: IndexConfig::default(),
            writer: WriterConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl IndexerConfig {
    /// Read the settings from environment variables, after loading a `.env`
    /// file if there is one.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `INDEX_PREFIX`: Prefix of the per-entity-type index names (default: bundle_indexer)
    /// - `WRITE_CONCURRENCY`: Documents written concurrently per bundle (default: 8)
    /// - `WRITE_CONNECTION_RETRIES`: Retries after a connection failure (default: 3)
    /// - `WRITE_BACKOFF_MS`: Backoff unit between connection retries (default: 1000)
    /// - `LOG_FORMAT`: `text` or `json` (default: text)
    ///
    /// # Returns
    ///
    /// * `Ok(IndexerConfig)` - The settings
    /// * `Err(IndexingError)` - If a variable is set to an invalid value
    pub fn from_env() -> Result<Self, IndexingError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the settings through `lookup`, falling back to the defaults for
    /// absent keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, IndexingError> {
        let defaults = Self::default();
        let mut config = defaults.clone();

        if let Some(url) = lookup("OPENSEARCH_URL") {
            config.opensearch_url = url;
        }
        config.index = IndexConfig::new(
            lookup("INDEX_PREFIX").unwrap_or_else(|| DEFAULT_INDEX_PREFIX.to_string()),
        );
        config.orchestrator.write_concurrency = parse(
            &lookup,
            "WRITE_CONCURRENCY",
            defaults.orchestrator.write_concurrency,
        )?;
        if config.orchestrator.write_concurrency == 0 {
            return Err(IndexingError::config("WRITE_CONCURRENCY must be positive"));
        }
        config.writer.max_connection_retries = parse(
            &lookup,
            "WRITE_CONNECTION_RETRIES",
            defaults.writer.max_connection_retries,
        )?;
        config.writer.backoff_unit = Duration::from_millis(parse(
            &lookup,
            "WRITE_BACKOFF_MS",
            defaults.writer.backoff_unit.as_millis() as u64,
        )?);
        if let Some(format) = lookup("LOG_FORMAT") {
            config.log_format = format.parse()?;
        }
        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, IndexingError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| IndexingError::config(format!("invalid {key} {raw:?}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundle_indexer_shared::EntityType;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IndexerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.opensearch_url, "http://localhost:9200");
        assert_eq!(config.index.index_name(EntityType::Files), "bundle_indexer_files");
        assert_eq!(config.orchestrator.write_concurrency, 8);
        assert_eq!(config.writer.max_connection_retries, 3);
        assert_eq!(config.writer.backoff_unit, Duration::from_secs(1));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let config = IndexerConfig::from_lookup(lookup(&[
            ("OPENSEARCH_URL", "http://search:9200"),
            ("INDEX_PREFIX", "dev"),
            ("WRITE_CONCURRENCY", "2"),
            ("WRITE_CONNECTION_RETRIES", "5"),
            ("WRITE_BACKOFF_MS", "250"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.opensearch_url, "http://search:9200");
        assert_eq!(config.index.index_name(EntityType::Projects), "dev_projects");
        assert_eq!(config.orchestrator.write_concurrency, 2);
        assert_eq!(config.writer.max_connection_retries, 5);
        assert_eq!(config.writer.backoff_unit, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            [("WRITE_CONCURRENCY", "many")],
            [("WRITE_CONCURRENCY", "0")],
            [("WRITE_BACKOFF_MS", "-1")],
            [("LOG_FORMAT", "xml")],
        ] {
            assert!(matches!(
                IndexerConfig::from_lookup(lookup(&vars)),
                Err(IndexingError::ConfigError(_))
            ));
        }
    }
}
