//! Configuration management for spur
//!
//! Settings live in `~/.spur/config.toml`. Every field is optional in the
//! file; missing ones take their defaults. Command-line flags override the
//! file (see `main.rs`).

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use spur_client::{DEFAULT_PARTITION_KEY, DEFAULT_SHARD_ID};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AWS region the streams live in
    pub region: String,

    /// Custom service endpoint (e.g. a local Kinesis emulator)
    pub endpoint_url: Option<String>,

    /// Where streams are stored
    pub backend: Backend,

    /// Stream used by `put` and `read` when none is given
    pub stream: Option<String>,

    /// Partition key for appended records
    pub partition_key: String,

    /// Shard read by `read`
    pub shard_id: String,

    /// Sleep between empty fetches while tailing or behind
    pub poll_interval_ms: u64,

    /// Wait before the first status check after create/delete
    pub watch_delay_secs: u64,

    /// Wait between status checks after create/delete
    pub watch_interval_secs: u64,

    /// Default output format
    pub output_format: OutputFormat,

    /// Enable colored output
    pub colored: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// AWS Kinesis Data Streams
    Kinesis,
    /// In-process streams, gone when spur exits
    Memory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
    Text,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: "us-west-1".to_string(),
            endpoint_url: None,
            backend: Backend::Kinesis,
            stream: None,
            partition_key: DEFAULT_PARTITION_KEY.to_string(),
            shard_id: DEFAULT_SHARD_ID.to_string(),
            poll_interval_ms: 500,
            watch_delay_secs: 2,
            watch_interval_secs: 5,
            output_format: OutputFormat::Table,
            colored: true,
        }
    }
}

impl Config {
    /// Load config from `path`, or from the default location.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path(),
        };

        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Save config to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn watch_delay(&self) -> Duration {
        Duration::from_secs(self.watch_delay_secs)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }

    /// `~/.spur`
    pub fn spur_dir() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".spur")
    }

    /// Get config file path (~/.spur/config.toml)
    pub fn config_path() -> PathBuf {
        Self::spur_dir().join("config.toml")
    }

    /// Get shell history path (~/.spur/history)
    pub fn history_path() -> PathBuf {
        Self::spur_dir().join("history")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.region, "us-west-1");
        assert_eq!(config.backend, Backend::Kinesis);
        assert_eq!(config.partition_key, "PARTITION");
        assert_eq!(config.shard_id, "shardId-000000000000");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.watch_delay(), Duration::from_secs(2));
        assert_eq!(config.watch_interval(), Duration::from_secs(5));
        assert_eq!(config.output_format, OutputFormat::Table);
        assert!(config.endpoint_url.is_none());
        assert!(config.colored);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let toml_str = r#"
            region = "eu-west-2"
            backend = "memory"
            stream = "app-logs"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.region, "eu-west-2");
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.stream.as_deref(), Some("app-logs"));
        assert_eq!(config.shard_id, DEFAULT_SHARD_ID);
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn test_config_deserialize_all_formats() {
        for (name, format) in [
            ("table", OutputFormat::Table),
            ("json", OutputFormat::Json),
            ("yaml", OutputFormat::Yaml),
            ("text", OutputFormat::Text),
        ] {
            let config: Config = toml::from_str(&format!("output_format = \"{}\"", name)).unwrap();
            assert_eq!(config.output_format, format);
        }
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(toml::from_str::<Config>("backend = \"kafka\"").is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            region: "ap-south-1".to_string(),
            endpoint_url: Some("http://localhost:4566".to_string()),
            output_format: OutputFormat::Yaml,
            colored: false,
            ..Config::default()
        };
        config.save(&config_path).unwrap();

        let loaded = Config::load(Some(&config_path)).unwrap();
        assert_eq!(loaded.region, "ap-south-1");
        assert_eq!(loaded.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert_eq!(loaded.output_format, OutputFormat::Yaml);
        assert!(!loaded.colored);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let loaded = Config::load(Some(&temp_dir.path().join("absent.toml"))).unwrap();
        assert_eq!(loaded.region, Config::default().region);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "region = [").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }
}
