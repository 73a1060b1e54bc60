use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use lib_radar::connections::StreamOptions;
use lib_radar::ingestors::PollSettings;
use lib_radar::models::relevance::UnknownEventKind;
use lib_radar::EventKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_CONFIG_FILE: &str = "server_ingestor.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GitHub token must be provided. Set the GITHUB_TOKEN environment variable.")]
    MissingToken,

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    UnknownEventKind(#[from] UnknownEventKind),

    #[error("failed to read config file {path}: {source}")]
    File { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Parser, Deserialize, Serialize, Clone, Default)]
#[clap(about = "GitHub events ingestion worker", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "INGESTOR_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "INGESTOR_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "INGESTOR_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "GITHUB_API_URL", help = "Base URL of the GitHub REST API.")]
    pub feed_base_url: Option<String>,

    #[clap(long, env = "GITHUB_EVENTS_PATH", help = "Path of the public events feed, relative to the base URL.")]
    pub feed_path: Option<String>,

    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true, help = "Bearer token for the GitHub API.")]
    pub github_token: Option<String>,

    #[clap(long, env = "REDIS_URL", hide_env_values = true, help = "Redis URL of the stream broker.")]
    pub redis_url: Option<String>,

    #[clap(long, env = "INGESTOR_TOPIC", help = "Topic (stream prefix) relevant events are published to.")]
    pub topic: Option<String>,

    #[clap(long, env = "INGESTOR_PARTITIONS", help = "Number of partition streams per topic.")]
    pub partitions: Option<u32>,

    #[clap(long, env = "INGESTOR_STREAM_MAX_LEN", help = "Approximate maximum entries kept per partition stream.")]
    pub stream_max_len: Option<usize>,

    #[clap(long, env = "INGESTOR_POLL_INTERVAL_MS", help = "Delay in milliseconds between the end of one poll and the next.")]
    pub poll_interval_ms: Option<u64>,

    #[clap(long, env = "INGESTOR_FETCH_TIMEOUT_MS", help = "Timeout in milliseconds for one feed request.")]
    pub fetch_timeout_ms: Option<u64>,

    #[clap(long, env = "INGESTOR_PUBLISH_TIMEOUT_MS", help = "Timeout in milliseconds for one broker acknowledgement.")]
    pub publish_timeout_ms: Option<u64>,

    #[clap(long, env = "INGESTOR_MAX_IN_FLIGHT", help = "Maximum unacknowledged sends before publishes are rejected.")]
    pub max_in_flight: Option<u32>,

    #[clap(long, env = "INGESTOR_HIGH_VALUE_KINDS", value_delimiter = ',', help = "Comma separated event types to publish (e.g. WatchEvent,ForkEvent).")]
    pub high_value_kinds: Option<Vec<String>>,
}

/// Fully resolved settings. Only built through [`Config::resolve`].
#[derive(Clone)]
pub struct Settings {
    pub log_dir: PathBuf,
    pub log_level: String,
    pub feed_base_url: String,
    pub feed_path: String,
    pub github_token: String,
    pub redis_url: String,
    pub stream: StreamOptions,
    pub poll: PollSettings,
    pub high_value_kinds: Vec<EventKind>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("log_dir", &self.log_dir)
            .field("log_level", &self.log_level)
            .field("feed_base_url", &self.feed_base_url)
            .field("feed_path", &self.feed_path)
            .field("github_token", &"<redacted>")
            .field("redis_url", &mask_credentials(&self.redis_url))
            .field("stream", &self.stream)
            .field("poll", &self.poll)
            .field("high_value_kinds", &self.high_value_kinds)
            .finish()
    }
}

impl Config {
    fn defaults() -> Config {
        Config {
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            feed_base_url: Some("https://api.github.com".to_string()),
            feed_path: Some("events".to_string()),
            redis_url: Some("redis://127.0.0.1/".to_string()),
            topic: Some("raw-github-events".to_string()),
            partitions: Some(6),
            stream_max_len: Some(100_000),
            poll_interval_ms: Some(5_000),
            fetch_timeout_ms: Some(10_000),
            publish_timeout_ms: Some(5_000),
            max_in_flight: Some(1_024),
            high_value_kinds: Some(vec!["WatchEvent".to_string(), "ForkEvent".to_string()]),
            ..Default::default()
        }
    }

    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            feed_base_url: other.feed_base_url.or(self.feed_base_url),
            feed_path: other.feed_path.or(self.feed_path),
            github_token: other.github_token.or(self.github_token),
            redis_url: other.redis_url.or(self.redis_url),
            topic: other.topic.or(self.topic),
            partitions: other.partitions.or(self.partitions),
            stream_max_len: other.stream_max_len.or(self.stream_max_len),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            fetch_timeout_ms: other.fetch_timeout_ms.or(self.fetch_timeout_ms),
            publish_timeout_ms: other.publish_timeout_ms.or(self.publish_timeout_ms),
            max_in_flight: other.max_in_flight.or(self.max_in_flight),
            high_value_kinds: other.high_value_kinds.or(self.high_value_kinds),
        }
    }

    /// Validates the merged values. A missing or blank token is fatal.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let defaults = Config::defaults();
        let cfg = defaults.merge(self);

        let github_token = cfg
            .github_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let topic = non_blank("topic", cfg.topic)?;
        let feed_base_url = non_blank("feed_base_url", cfg.feed_base_url)?;
        let feed_path = non_blank("feed_path", cfg.feed_path)?;
        let redis_url = non_blank("redis_url", cfg.redis_url)?;

        let high_value_kinds = cfg
            .high_value_kinds
            .unwrap_or_default()
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| k.parse::<EventKind>())
            .collect::<Result<Vec<_>, _>>()?;
        if high_value_kinds.is_empty() {
            return Err(ConfigError::Invalid {
                field: "high_value_kinds",
                reason: "at least one event kind is required".to_string(),
            });
        }

        Ok(Settings {
            log_dir: cfg.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: cfg.log_level.unwrap_or_else(|| "info".to_string()),
            feed_base_url,
            feed_path,
            github_token,
            redis_url,
            stream: StreamOptions {
                topic: topic.clone(),
                partitions: positive("partitions", cfg.partitions)?,
                max_len: positive("stream_max_len", cfg.stream_max_len)?,
                publish_timeout: Duration::from_millis(positive("publish_timeout_ms", cfg.publish_timeout_ms)?),
                max_in_flight: positive("max_in_flight", cfg.max_in_flight)?,
            },
            poll: PollSettings {
                topic,
                poll_interval: Duration::from_millis(positive("poll_interval_ms", cfg.poll_interval_ms)?),
                fetch_timeout: Duration::from_millis(positive("fetch_timeout_ms", cfg.fetch_timeout_ms)?),
            },
            high_value_kinds,
        })
    }
}

fn non_blank(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Invalid {
            field,
            reason: "must not be blank".to_string(),
        }),
    }
}

fn positive<T>(field: &'static str, value: Option<T>) -> Result<T, ConfigError>
where
    T: Copy + PartialOrd + Default,
{
    match value {
        Some(v) if v > T::default() => Ok(v),
        _ => Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        }),
    }
}

/// Reads a JSON config file. A missing file is not an error.
fn read_config_file(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::File {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = serde_json::from_str::<Config>(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(parsed))
}

/// Defaults < config file < environment and CLI.
pub fn load_config() -> Result<Settings, ConfigError> {
    let cli_args = Config::parse();

    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let file_config = read_config_file(&config_file_path)?.unwrap_or_default();

    file_config.merge(cli_args).resolve()
}

/// GitHub fine-grained tokens are far longer than 50 characters; a short one
/// is almost certainly a placeholder.
pub fn looks_like_placeholder(token: &str) -> bool {
    token.starts_with("github_pat_") && token.len() < 50
}

/// Replaces URL credentials with `***` before the URL is logged. Input that
/// does not parse as a URL is withheld entirely.
pub fn mask_credentials(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return "<unparsable url>".to_string();
    };
    if !url.username().is_empty() || url.password().is_some() {
        let _ = url.set_username("***");
        let _ = url.set_password(None);
    }
    url.to_string()
}
