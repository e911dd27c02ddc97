use anyhow::{bail, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER: &str = "http://localhost:8000";
pub const KEYS: &str = "server, token";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub server: Option<String>,
    pub token: Option<String>,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "repairdesk", "repairdesk")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Server base URL without a trailing slash. `flag` wins over the file.
    pub fn server_url(&self, flag: Option<&str>) -> String {
        flag.or(self.remote.server.as_deref())
            .unwrap_or(DEFAULT_SERVER)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        match key {
            "server" => self.remote.server = Some(value),
            "token" => self.remote.token = Some(value),
            _ => bail!("Unknown config key: {}. Valid keys: {}", key, KEYS),
        }
        Ok(())
    }

    /// Value for display. The token is masked.
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "server" => self.remote.server.clone().unwrap_or_default(),
            "token" => self.remote.token.as_ref().map(|_| "****").unwrap_or_default().to_string(),
            _ => bail!("Unknown config key: {}. Valid keys: {}", key, KEYS),
        };
        Ok(value)
    }
}
