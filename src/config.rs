use crate::engine::streak::StreakRule;
use crate::models::{DEFAULT_USER_ID, validate_energy};
use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use url::Url;

const APP_DIR: &str = ".taskpulse";
const CONFIG_FILE: &str = "config.json";
pub const API_KEY_ENV: &str = "TASKPULSE_API_KEY";
pub const DEFAULT_REMOTE_BASE_URL: &str = "http://127.0.0.1:54321/rest/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Remote,
    Sqlite,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackend::Remote => "remote",
            StoreBackend::Sqlite => "sqlite",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "remote" => Ok(StoreBackend::Remote),
            "sqlite" | "local" => Ok(StoreBackend::Sqlite),
            _ => bail!("store must be remote|sqlite, got {raw}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreBackend,
    pub remote_base_url: String,
    pub remote_api_key: Option<String>,
    pub remote_timeout_seconds: u64,
    pub db_path: PathBuf,
    pub api_port: u16,
    pub user_id: String,
    pub default_energy: u8,
    pub streak_rule: StreakRule,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreBackend::Remote,
            remote_base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            remote_api_key: None,
            remote_timeout_seconds: 20,
            db_path: default_root_dir().join("db").join("taskpulse.db"),
            api_port: 7891,
            user_id: DEFAULT_USER_ID.to_string(),
            default_energy: 3,
            streak_rule: StreakRule::default(),
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        set_mode_600(path)?;

        Ok(())
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                self.remote_api_key
                    .clone()
                    .filter(|value| !value.trim().is_empty())
            })
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "store" => {
                self.store = StoreBackend::parse(value)?;
            }
            "remote_base_url" => {
                let trimmed = value.trim().trim_end_matches('/');
                Url::parse(trimmed)
                    .map_err(|error| anyhow!("remote_base_url is not a valid URL: {error}"))?;
                self.remote_base_url = trimmed.to_string();
            }
            "remote_api_key" => {
                self.remote_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "remote_timeout_seconds" => {
                self.remote_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("remote_timeout_seconds must be a number"))?
                    .max(5);
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "user_id" => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    bail!("user_id cannot be empty");
                }
                self.user_id = trimmed.to_string();
            }
            "default_energy" => {
                let level = value
                    .parse::<u8>()
                    .map_err(|_| anyhow!("default_energy must be a number between 1 and 5"))?;
                self.default_energy =
                    validate_energy(level).map_err(|error| anyhow!(error.to_string()))?;
            }
            "streak_rule" => {
                self.streak_rule = StreakRule::parse(value)?;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: store, remote_base_url|remote.base_url, remote_api_key|remote.api_key, remote_timeout_seconds|remote.timeout_seconds, db_path|db.path, api_port|api.port, user_id|user.id, default_energy|energy.default, streak_rule|streak.rule"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "store" => Some(self.store.as_str().to_string()),
            "remote_base_url" => Some(self.remote_base_url.clone()),
            "remote_api_key" => Some(
                self.remote_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "remote_timeout_seconds" => Some(self.remote_timeout_seconds.to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "user_id" => Some(self.user_id.clone()),
            "default_energy" => Some(self.default_energy.to_string()),
            "streak_rule" => Some(self.streak_rule.as_str().to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "store" | "store.backend" => "store",
        "remote_base_url" | "remote.base_url" => "remote_base_url",
        "remote_api_key" | "remote.api_key" => "remote_api_key",
        "remote_timeout_seconds" | "remote.timeout_seconds" => "remote_timeout_seconds",
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "user_id" | "user.id" => "user_id",
        "default_energy" | "energy.default" => "default_energy",
        "streak_rule" | "streak.rule" => "streak_rule",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
