use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub postgres: PostgresSettings,
    /// Generated credential shape
    #[serde(default)]
    pub credentials: CredentialSettings,
    #[serde(default)]
    pub state: StateSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.postgres.port == 0 {
            return Err(ConfigError::validation("postgres.port must be > 0"));
        }
        if self.postgres.superuser.trim().is_empty() {
            return Err(ConfigError::validation("postgres.superuser must not be empty"));
        }
        if self.postgres.service.trim().is_empty() {
            return Err(ConfigError::validation("postgres.service must not be empty"));
        }
        if self.credentials.secret_length < 8 {
            return Err(ConfigError::validation(
                "credentials.secret_length must be >= 8",
            ));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

/// The managed PostgreSQL server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresSettings {
    /// Address advertised to subscribers in their connection details
    #[serde(default = "default_host")]
    pub host: String,
    /// Initial listen port
    #[serde(default = "default_port")]
    pub port: u16,
    /// OS and database role `psql` runs as
    #[serde(default = "default_superuser")]
    pub superuser: String,
    /// Service unit restarted after reconfiguration
    #[serde(default = "default_service")]
    pub service: String,
    /// Root of the per-version configuration directories
    #[serde(default = "default_conf_base_dir")]
    pub conf_base_dir: PathBuf,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            superuser: default_superuser(),
            service: default_service(),
            conf_base_dir: default_conf_base_dir(),
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    5432
}
fn default_superuser() -> String {
    "postgres".into()
}
fn default_service() -> String {
    "postgresql".into()
}
fn default_conf_base_dir() -> PathBuf {
    PathBuf::from("/etc/postgresql")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSettings {
    #[serde(default = "default_username_prefix")]
    pub username_prefix: String,
    #[serde(default = "default_secret_length")]
    pub secret_length: usize,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            username_prefix: default_username_prefix(),
            secret_length: default_secret_length(),
        }
    }
}

fn default_username_prefix() -> String {
    "juju_".into()
}
fn default_secret_length() -> usize {
    16
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSettings {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("/var/lib/pgcharm/state.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

pub mod loader {
    use super::Settings;
    use crate::{ConfigError, Result};
    use config::{Config, Environment, File};
    use std::path::Path;

    /// Default settings file, looked up in the working directory.
    pub const DEFAULT_PATH: &str = "pgcharm.toml";

    /// Loads settings from `path` (or `pgcharm.toml`) with `PGCHARM__*`
    /// environment overrides, e.g. `PGCHARM__POSTGRES__PORT=5555`.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_PATH));
        let mut builder = Config::builder();
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("PGCHARM")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::parse(format!("config build error: {e}")))?;
        let settings: Settings = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::parse(format!("config deserialize error: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }
}
