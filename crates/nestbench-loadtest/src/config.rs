//! Benchmark configuration types

use std::path::{Path, PathBuf};

use nestbench_core::parameter::Parameters;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid target url {url}: {reason}")]
    TargetUrl { url: String, reason: String },
}

/// Complete benchmark configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Service under benchmark
    #[serde(default)]
    pub target: TargetConfig,

    /// Fixture locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Timings, page sizes and worker ramp
    #[serde(default)]
    pub parameters: Parameters,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }
}

/// Target service settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_target_url")]
    pub url: String,

    /// Host header sent instead of the url's authority
    #[serde(default)]
    pub host_override: Option<String>,
}

fn default_target_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: default_target_url(),
            host_override: None,
        }
    }
}

impl TargetConfig {
    /// Scheme and authority of the target; path, query and fragment are dropped
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::TargetUrl {
            url: self.url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.url).map_err(|e| invalid(e.to_string()))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("host is empty".to_string()));
        }
        url.set_path("");
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}

/// Fixture and snapshot locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_fixture_dir")]
    pub fixture_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("initial-data")
}

fn default_fixture_dir() -> PathBuf {
    PathBuf::from("../webapp/fixture")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            fixture_dir: default_fixture_dir(),
        }
    }
}

impl PathsConfig {
    pub fn verification_dir(&self) -> PathBuf {
        self.data_dir.join("result").join("verification_data")
    }

    pub fn chair_draft_dir(&self) -> PathBuf {
        self.data_dir.join("result").join("draft_data").join("chair")
    }

    pub fn estate_draft_dir(&self) -> PathBuf {
        self.data_dir.join("result").join("draft_data").join("estate")
    }
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
