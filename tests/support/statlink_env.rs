use std::{
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};

use statlink::{app_dirs::CONFIG_HOME_ENV, config::API_URL_ENV};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Holds the process-wide env lock and restores touched variables on drop.
pub struct StatlinkEnvGuard {
    previous: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl StatlinkEnvGuard {
    pub fn set_config_home(path: PathBuf) -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let mut guard = Self {
            previous: Vec::new(),
            _lock: lock,
        };
        guard.set(CONFIG_HOME_ENV, Some(path.to_string_lossy().into_owned()));
        guard.set(API_URL_ENV, None);
        guard
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.set(API_URL_ENV, Some(url.to_string()));
        self
    }

    fn set(&mut self, name: &'static str, value: Option<String>) {
        if !self.previous.iter().any(|(saved, _)| *saved == name) {
            self.previous.push((name, std::env::var(name).ok()));
        }
        apply(name, value);
    }
}

impl Drop for StatlinkEnvGuard {
    fn drop(&mut self) {
        for (name, value) in self.previous.drain(..).rev() {
            apply(name, value);
        }
    }
}

fn apply(name: &str, value: Option<String>) {
    match value {
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        Some(value) => unsafe { std::env::set_var(name, value) },
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        None => unsafe { std::env::remove_var(name) },
    }
}
