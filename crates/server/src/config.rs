use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub secret_key: String,
    #[serde(default = "default_access_minutes")]
    pub access_token_minutes: i64,
    #[serde(default = "default_view_minutes")]
    pub view_token_minutes: i64,
    /// Fixed credential pair exchanged for an admin-scoped token
    #[serde(default = "default_client_id")]
    pub oauth_client_id: String,
    #[serde(default = "default_client_secret")]
    pub oauth_client_secret: String,
}

/// Accounts created at startup when missing. A pair is ignored unless both
/// the username and the password are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub worker_username: Option<String>,
    pub worker_password: Option<String>,
}

const MAX_TOKEN_MINUTES: i64 = 365 * 24 * 60;

fn default_access_minutes() -> i64 {
    60
}

fn default_view_minutes() -> i64 {
    5
}

fn default_client_id() -> String {
    "crm-client".to_string()
}

fn default_client_secret() -> String {
    "crm-secret".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: "dev-secret".to_string(),
            access_token_minutes: default_access_minutes(),
            view_token_minutes: default_view_minutes(),
            oauth_client_id: default_client_id(),
            oauth_client_secret: default_client_secret(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            database: DatabaseConfig {
                url: "sqlite:./data/repairdesk.db".to_string(),
            },
            auth: AuthConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("REPAIRDESK_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        let default_paths = vec![
            PathBuf::from("repairdesk.toml"),
            PathBuf::from("config/repairdesk.toml"),
            PathBuf::from("/etc/repairdesk/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Environment variables win over the file. `lookup` is `std::env::var`
    /// outside of tests.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v.parse().with_context(|| format!("invalid PORT: {v}"))?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = lookup("SECRET_KEY") {
            self.auth.secret_key = v;
        }
        if let Some(v) = lookup("ACCESS_TOKEN_EXPIRE_MINUTES") {
            self.auth.access_token_minutes = v
                .parse()
                .with_context(|| format!("invalid ACCESS_TOKEN_EXPIRE_MINUTES: {v}"))?;
        }
        if let Some(v) = lookup("OAUTH_CLIENT_ID") {
            self.auth.oauth_client_id = v;
        }
        if let Some(v) = lookup("OAUTH_CLIENT_SECRET") {
            self.auth.oauth_client_secret = v;
        }
        for (key, slot) in [
            ("ADMIN_USERNAME", &mut self.seed.admin_username),
            ("ADMIN_PASSWORD", &mut self.seed.admin_password),
            ("WORKER_USERNAME", &mut self.seed.worker_username),
            ("WORKER_PASSWORD", &mut self.seed.worker_password),
        ] {
            if let Some(v) = lookup(key) {
                *slot = Some(v);
            }
        }
        self.validate()
    }

    /// Token lifetimes must be positive and at most a year.
    pub fn validate(&self) -> Result<()> {
        for (name, minutes) in [
            ("access_token_minutes", self.auth.access_token_minutes),
            ("view_token_minutes", self.auth.view_token_minutes),
        ] {
            if !(1..=MAX_TOKEN_MINUTES).contains(&minutes) {
                anyhow::bail!("{name} must be between 1 and {MAX_TOKEN_MINUTES}, got {minutes}");
            }
        }
        Ok(())
    }

    /// Configuration used by unit tests: in-memory store, fixed secret.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let mut config = Self::default();
        config.database.url = "sqlite::memory:".to_string();
        config.auth.secret_key = "test-secret".to_string();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_token_policy() {
        let config = Config::default();
        assert_eq!(config.auth.access_token_minutes, 60);
        assert_eq!(config.auth.view_token_minutes, 5);
        assert_eq!(config.auth.oauth_client_id, "crm-client");
    }

    #[test]
    fn test_partial_file_fills_auth_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            url = "sqlite::memory:"

            [auth]
            secret_key = "abc"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.access_token_minutes, 60);
        assert!(config.seed.admin_username.is_none());
    }

    #[test]
    fn test_env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite:/tmp/x.db"),
            ("SECRET_KEY", "from-env"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "15"),
            ("ADMIN_USERNAME", "root"),
            ("ADMIN_PASSWORD", "hunter2"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.url, "sqlite:/tmp/x.db");
        assert_eq!(config.auth.secret_key, "from-env");
        assert_eq!(config.auth.access_token_minutes, 15);
        assert_eq!(config.seed.admin_username.as_deref(), Some("root"));
        assert_eq!(config.seed.worker_username, None);
    }

    #[test]
    fn test_token_lifetime_out_of_range_is_rejected() {
        for bad in ["9223372036854775807", "0", "-5"] {
            let mut config = Config::default();
            let err = config
                .apply_overrides(|k| (k == "ACCESS_TOKEN_EXPIRE_MINUTES").then(|| bad.to_string()))
                .unwrap_err();
            assert!(err.to_string().contains("access_token_minutes"), "{bad}");
        }

        let mut config = Config::default();
        config.auth.view_token_minutes = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_numeric_override_is_an_error() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
