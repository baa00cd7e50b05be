//! Client configuration: where the content service lives and which store
//! documents go to when a descriptor does not name one.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_BASE_PATH: &str = "/cms";
pub const DEFAULT_STORE: &str = "aperture";

pub const BASE_URL_VAR: &str = "DOCSTORE_BASE_URL";
pub const BASE_PATH_VAR: &str = "DOCSTORE_BASE_PATH";
pub const DEFAULT_STORE_VAR: &str = "DOCSTORE_DEFAULT_STORE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Scheme and authority of the content service, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Path prefix every document URL starts with
    pub base_path: String,
    /// Store used when a descriptor leaves `store` empty
    pub default_store: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            default_store: DEFAULT_STORE.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn with_default_store(mut self, store: impl Into<String>) -> Self {
        self.default_store = store.into();
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Load a TOML config file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: StoreConfig = toml::from_str(content)?;
        Ok(config.normalized())
    }

    /// Defaults overlaid with `DOCSTORE_*` environment variables.
    /// Call `load_env_file` first to pick up `.env` files.
    pub fn from_env() -> Self {
        Self::default().overlay_env()
    }

    pub fn overlay_env(self) -> Self {
        self.overlay(|key| std::env::var(key).ok())
    }

    fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(BASE_URL_VAR) {
            self.base_url = url;
        }
        if let Some(path) = get(BASE_PATH_VAR) {
            self.base_path = path;
        }
        if let Some(store) = get(DEFAULT_STORE_VAR) {
            self.default_store = store;
        }
        self.normalized()
    }

    /// Trims trailing slashes so paths can be joined with a single `/`.
    pub(crate) fn normalized(mut self) -> Self {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        let path = self.base_path.trim_end_matches('/');
        self.base_path = if path.is_empty() || path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        self
    }
}

/// Load environment variables from .env files.
/// First loads from ~/.env, then from ./.env; values already set win.
pub fn load_env_file() {
    if let Some(home) = dirs::home_dir() {
        dotenv::from_path(home.join(".env")).ok();
    }
    dotenv::dotenv().ok();
}
