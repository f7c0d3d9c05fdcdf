use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use drip_protocol::ProviderInfo;
use thiserror::Error;
use tracing::warn;

/// Allowed range for the render interval, in milliseconds.
pub const RENDER_INTERVAL_RANGE_MS: (u64, u64) = (300, 2000);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub provider: ProviderConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Render partial answers while they stream. When off, only the final
    /// text is shown.
    pub enabled: bool,
    /// Minimum time between interim renders. Clamped to 300..=2000.
    pub render_interval_ms: u64,
    /// Keep the viewer pinned to the bottom while text arrives.
    pub auto_scroll: bool,
    /// How long each wait for worker output lasts before re-checking.
    pub poll_interval_ms: u64,
    /// Cadence of the background reaper for workers that outlive a session.
    pub reaper_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            render_interval_ms: 750,
            auto_scroll: true,
            poll_interval_ms: 125,
            reaper_interval_ms: 5000,
        }
    }
}

impl StreamConfig {
    /// The render interval, clamped into the supported range.
    pub fn render_interval(&self) -> Duration {
        let (lo, hi) = RENDER_INTERVAL_RANGE_MS;
        Duration::from_millis(self.render_interval_ms.clamp(lo, hi))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms.max(1))
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Display name shown in the answer header.
    pub name: String,
    pub model: String,
    /// OpenAI-compatible chat completions URL.
    pub endpoint: String,
    /// Extra request headers, sent verbatim.
    pub headers: BTreeMap<String, String>,
    pub system_prompt: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let info = ProviderInfo::default();
        Self {
            name: info.name,
            model: info.model,
            endpoint: info.endpoint,
            headers: BTreeMap::new(),
            system_prompt: None,
        }
    }
}

impl ProviderConfig {
    pub fn to_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            headers: self.headers.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Program and arguments to run instead of `drip --worker`. The query is
    /// written to its stdin as JSON.
    pub command: Vec<String>,
}

impl Config {
    pub fn load_or_default() -> Self {
        let path = config_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "bad config, using defaults");
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    /// Load an explicitly named file; unlike the default path, a missing or
    /// malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("drip").join("config.toml")
}
