//! Location of the `.statlink` directory holding config and logs.
//!
//! Defaults to the OS config directory (`%APPDATA%`, `~/.config`, ...).
//! `STATLINK_CONFIG_HOME` replaces that base, which tests and portable
//! installs rely on.

use std::ffi::OsString;
use std::path::PathBuf;

use directories::BaseDirs;
use thiserror::Error;

/// Name of the application directory under the config base.
pub const APP_DIR_NAME: &str = ".statlink";
/// Environment variable that relocates the config base.
pub const CONFIG_HOME_ENV: &str = "STATLINK_CONFIG_HOME";
const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No config base directory could be resolved")]
    NoBaseDir,
    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The `.statlink` directory, created on first use.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = base_from_env(std::env::var_os(CONFIG_HOME_ENV))
        .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
        .ok_or(AppDirError::NoBaseDir)?;
    ensure_dir(base.join(APP_DIR_NAME))
}

/// `<app dir>/logs`, created on first use.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join(LOGS_DIR_NAME))
}

fn base_from_env(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|value| !value.is_empty()).map(PathBuf::from)
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    if !path.is_dir() {
        std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
            path: path.clone(),
            source,
        })?;
    }
    Ok(path)
}
