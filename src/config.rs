//! Persisted settings for the submission pipeline.
//!
//! Settings live in `config.toml` inside the app directory. The service base
//! URL can be overridden per process with `STATLINK_API_URL`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::app_dirs;

/// Default filename used to store settings.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Environment variable that replaces the configured base URL.
pub const API_URL_ENV: &str = "STATLINK_API_URL";
/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_MAX_UPLOAD_MB: u64 = 25;
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Errors that may occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No usable config directory found.
    #[error("No suitable config directory found")]
    NoConfigDir,
    /// Failed to create the config directory.
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to read the settings file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write the settings file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse TOML settings.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to serialize settings to TOML.
    #[error("Failed to serialize config to TOML: {0}")]
    SerializeToml(#[from] toml::ser::Error),
    /// The base URL does not parse.
    #[error("Invalid service URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    /// The base URL is not http(s).
    #[error("Service URL must use http or https, got '{0}'")]
    UnsupportedScheme(String),
}

/// User-editable settings.
///
/// Config keys: `base_url`, `auto_submit`, `max_upload_mb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Root URL of the analysis service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Start the health check and upload as soon as a valid file is selected.
    #[serde(default = "default_true")]
    pub auto_submit: bool,
    /// Upload size limit in megabytes; `0` disables the check.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auto_submit: true,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

impl Settings {
    /// Parse and validate the configured base URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_base_url(&self.base_url)
    }

    pub fn max_upload_bytes(&self) -> Option<u64> {
        (self.max_upload_mb > 0).then(|| self.max_upload_mb.saturating_mul(BYTES_PER_MB))
    }

    /// Apply `STATLINK_API_URL` when it is set to a non-empty value.
    pub fn with_env_overrides(self) -> Self {
        self.with_api_url_override(std::env::var(API_URL_ENV).ok())
    }

    pub(crate) fn with_api_url_override(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
        {
            self.base_url = url;
        }
        self
    }
}

/// Parse a service base URL, accepting only http and https.
pub fn parse_base_url(text: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(text.trim()).map_err(|source| ConfigError::InvalidUrl {
        url: text.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::UnsupportedScheme(text.to_string())),
    }
}

/// Resolve the settings file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings from the app directory with env overrides applied.
///
/// A missing file yields defaults.
pub fn load_or_default() -> Result<Settings, ConfigError> {
    let path = config_path()?;
    Ok(load_from(&path)?.with_env_overrides())
}

/// Load settings from a specific file, returning defaults if it does not exist.
pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings: Settings = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(settings)
}

/// Save settings to a specific path, creating parent directories as needed.
pub fn save_to_path(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = toml::to_string_pretty(settings)?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_upload_mb() -> u64 {
    DEFAULT_MAX_UPLOAD_MB
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_from(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.base_url().unwrap().as_str(), "http://localhost:5000/");
        assert_eq!(settings.max_upload_bytes(), Some(25 * 1024 * 1024));
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "auto_submit = false\n").unwrap();
        let settings = load_from(&path).unwrap();
        assert!(!settings.auto_submit);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let settings = Settings {
            base_url: "https://stats.example".to_string(),
            auto_submit: false,
            max_upload_mb: 0,
        };
        save_to_path(&settings, &path).unwrap();
        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.max_upload_bytes(), None);
    }

    #[test]
    fn invalid_toml_is_reported_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "auto_submit = \"maybe\"").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn api_url_override_replaces_base_url_when_non_empty() {
        let settings = Settings::default().with_api_url_override(Some(" http://10.0.0.2:8000 ".into()));
        assert_eq!(settings.base_url, "http://10.0.0.2:8000");
        let settings = Settings::default().with_api_url_override(Some("   ".into()));
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn base_url_requires_http_scheme() {
        assert!(matches!(parse_base_url("ftp://host"), Err(ConfigError::UnsupportedScheme(_))));
        assert!(matches!(parse_base_url("not a url"), Err(ConfigError::InvalidUrl { .. })));
    }
}
