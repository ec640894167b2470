//! Configuration for pgcharm.
//!
//! Two unrelated kinds of configuration live here:
//! - [`Settings`]: pgcharm's own settings, loaded from TOML plus environment
//! - [`ManagedSection`]: patching of PostgreSQL's configuration files, where
//!   pgcharm owns one marker-delimited block and leaves the rest alone

pub mod postgres_conf;
pub mod section;
pub mod settings;

use std::path::PathBuf;

pub use postgres_conf::{pg_conf_dir, update_pg_hba_conf, update_postgresql_conf};
pub use section::{END_MARKER, ManagedSection, START_MARKER, SectionScan, write_atomic};
pub use settings::loader::load_settings;
pub use settings::{
    CredentialSettings, LoggingSettings, PostgresSettings, Settings, StateSettings,
};

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns `true` if the underlying file did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::File { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
