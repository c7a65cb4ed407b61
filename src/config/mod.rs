//! Configuration management for chartfetch using the prefer crate.

mod settings;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use settings::Settings;

/// Errors loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
}

/// Configuration file structure. Every field is optional and overlays
/// [`Settings::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory archives are written to.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "target")]
    pub dest_dir: Option<String>,
    /// Items in flight at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    /// Hard per-item deadline in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_timeout_secs: Option<u64>,
    /// Connect/read timeout for individual requests in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Pause between concurrency groups in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organize_by_source: Option<bool>,
    /// User agent: a literal string, or "impersonate".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Remote DevTools endpoint for share pages that need a real browser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onedrive_api_base: Option<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load the user's config, falling back to defaults.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load("chartfetch").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, ext: &str) -> Result<Self, ConfigError> {
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            }),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            }),
            _ => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            }),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are joined onto `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref dest_dir) = self.dest_dir {
            settings.dest_dir = self.resolve_path(dest_dir, base_dir);
        }
        if let Some(max) = self.max_concurrency {
            settings.max_concurrency = max;
        }
        if let Some(secs) = self.item_timeout_secs {
            settings.item_timeout_secs = secs;
        }
        if let Some(secs) = self.request_timeout_secs {
            settings.request_timeout_secs = secs;
        }
        if let Some(ms) = self.group_delay_ms {
            settings.group_delay_ms = ms;
        }
        if let Some(overwrite) = self.overwrite {
            settings.overwrite = overwrite;
        }
        if let Some(organize) = self.organize_by_source {
            settings.organize_by_source = organize;
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(ref browser_url) = self.browser_url {
            settings.browser_url = Some(browser_url.clone());
        }
        if let Some(ref base) = self.drive_base_url {
            settings.drive_base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(ref base) = self.onedrive_api_base {
            settings.onedrive_api_base = base.trim_end_matches('/').to_string();
        }
    }
}

/// Build settings from defaults, an optional explicit config file (else the
/// discovered one), and environment overrides, in that order.
pub async fn load_settings(config_path: Option<&Path>) -> Result<Settings, ConfigError> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    if let Some(path) = &config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }
    Ok(settings.with_env_overrides())
}
