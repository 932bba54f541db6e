//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::IndexingError;

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "content-indexer";

/// Default topic carrying job batches.
const DEFAULT_KAFKA_TOPIC: &str = "indexing.jobs";

/// Default path of the sites and spotlights JSON file.
const DEFAULT_SITES_CONFIG_PATH: &str = "sites.json";

const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_COLLABORATOR_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 60;
const DEFAULT_WORKER_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = IndexingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(IndexingError::config(format!("Unknown LOG_FORMAT: {}", other))),
        }
    }
}

/// Runtime settings of the indexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub kafka_broker: String,
    pub kafka_group_id: String,
    pub kafka_topic: String,
    pub sites_config_path: PathBuf,
    /// `None` disables NLP for every site.
    pub nlp_url: Option<String>,
    /// `None` disables the thesaurus for every site.
    pub thesaurus_url: Option<String>,
    pub backend_timeout: Duration,
    pub collaborator_timeout: Duration,
    pub health_check_interval: Duration,
    pub worker_count: usize,
    pub log_format: LogFormat,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `KAFKA_BROKER`: Kafka broker address (default: localhost:9092)
    /// - `KAFKA_GROUP_ID`: Consumer group ID (default: content-indexer)
    /// - `KAFKA_TOPIC`: Job topic (default: indexing.jobs)
    /// - `SITES_CONFIG_PATH`: Sites and spotlights file (default: sites.json)
    /// - `NLP_URL`, `THESAURUS_URL`: Service base URLs (default: disabled)
    /// - `BACKEND_TIMEOUT_SECS`, `COLLABORATOR_TIMEOUT_SECS`: Call bounds (default: 30)
    /// - `HEALTH_CHECK_INTERVAL_SECS`: Health check period (default: 60)
    /// - `WORKER_COUNT`: Concurrent batches (default: 4)
    /// - `LOG_FORMAT`: `text` or `json` (default: text)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, IndexingError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let text = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let worker_count: usize = parse_or(var("WORKER_COUNT"), "WORKER_COUNT", DEFAULT_WORKER_COUNT)?;
        if worker_count == 0 {
            return Err(IndexingError::config("WORKER_COUNT must be at least 1"));
        }

        Ok(Self {
            kafka_broker: text("KAFKA_BROKER", DEFAULT_KAFKA_BROKER),
            kafka_group_id: text("KAFKA_GROUP_ID", DEFAULT_KAFKA_GROUP_ID),
            kafka_topic: text("KAFKA_TOPIC", DEFAULT_KAFKA_TOPIC),
            sites_config_path: PathBuf::from(text("SITES_CONFIG_PATH", DEFAULT_SITES_CONFIG_PATH)),
            nlp_url: var("NLP_URL"),
            thesaurus_url: var("THESAURUS_URL"),
            backend_timeout: seconds(var("BACKEND_TIMEOUT_SECS"), "BACKEND_TIMEOUT_SECS", DEFAULT_BACKEND_TIMEOUT_SECS)?,
            collaborator_timeout: seconds(
                var("COLLABORATOR_TIMEOUT_SECS"),
                "COLLABORATOR_TIMEOUT_SECS",
                DEFAULT_COLLABORATOR_TIMEOUT_SECS,
            )?,
            health_check_interval: seconds(
                var("HEALTH_CHECK_INTERVAL_SECS"),
                "HEALTH_CHECK_INTERVAL_SECS",
                DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            )?,
            worker_count,
            log_format: var("LOG_FORMAT").map(|v| v.parse::<LogFormat>()).transpose()?.unwrap_or_default(),
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, IndexingError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| IndexingError::config(format!("Invalid value for {}: {}", key, raw))),
    }
}

fn seconds(value: Option<String>, key: &str, default: u64) -> Result<Duration, IndexingError> {
    let secs = parse_or(value, key, default)?;
    if secs == 0 {
        return Err(IndexingError::config(format!("{} must be positive", key)));
    }
    Ok(Duration::from_secs(secs))
}
