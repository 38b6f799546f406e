use std::path::PathBuf;
use std::time::Duration;

use crate::db::{settings_repo, DbHandle};
use crate::models::settings::API_URL_KEY;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SPEECH_LOCALE: &str = "tr-TR";

pub const ENV_API_URL: &str = "LEAFCHAT_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "LEAFCHAT_TIMEOUT_SECS";
pub const ENV_DATA_DIR: &str = "LEAFCHAT_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Backend base URL, without a trailing slash.
    pub api_url: String,
    pub request_timeout: Duration,
    pub speech_locale: String,
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            speech_locale: DEFAULT_SPEECH_LOCALE.into(),
            data_dir: default_data_dir(),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".leafchat")
}

impl AppConfig {
    /// Defaults overridden by `LEAFCHAT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.api_url = normalize_url(&url);
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => log::warn!("Ignoring invalid {}={:?}", ENV_TIMEOUT_SECS, raw),
            }
        }

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        config
    }

    /// Applies the `api_url` row of the settings table when one is stored.
    pub fn apply_settings(&mut self, db: &DbHandle) {
        match settings_repo::get_setting(db, API_URL_KEY) {
            Ok(Some(s)) if !s.value.trim().is_empty() => self.api_url = normalize_url(&s.value),
            Ok(_) => {}
            Err(e) => log::warn!("Failed to read {} setting: {}", API_URL_KEY, e),
        }
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = normalize_url(url);
        self
    }

    pub fn session_url(&self) -> String {
        format!("{}/chatbot/chat_session", self.api_url)
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chatbot/", self.api_url)
    }
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
