//! [`ResourceAdministrator`] backed by the `psql` client and `systemctl`.
//!
//! Every statement runs as `sudo -u <superuser> psql -p <port> -c <sql>`.
//! Identifiers are double-quoted and literals single-quoted with embedded
//! quotes doubled, so database names from relation data cannot break out of
//! the statement.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, LazyLock, OnceLock};

use async_trait::async_trait;
use pgcharm_config::{ManagedSection, Settings, pg_conf_dir, update_pg_hba_conf, update_postgresql_conf};
use pgcharm_core::{RandomSecretGenerator, Resource, SecretSource};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AdminError, Result};
use crate::runner::CommandRunner;
use crate::traits::ResourceAdministrator;

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PostgreSQL (\d+\.\d+) ").expect("Invalid version regex")
});

const REDACTED: &str = "********";

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Extracts `major.minor` from the output of `SELECT version()`.
pub fn parse_version(output: &str) -> Option<String> {
    VERSION_REGEX
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct PsqlAdministrator {
    runner: Arc<dyn CommandRunner>,
    secrets: Arc<dyn SecretSource>,
    host: String,
    superuser: String,
    service: String,
    conf_base_dir: PathBuf,
    username_prefix: String,
    secret_length: usize,
    section: ManagedSection,
    port: AtomicU16,
    version: OnceLock<String>,
}

impl PsqlAdministrator {
    pub fn new(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            secrets: Arc::new(RandomSecretGenerator),
            host: settings.postgres.host.clone(),
            superuser: settings.postgres.superuser.clone(),
            service: settings.postgres.service.clone(),
            conf_base_dir: settings.postgres.conf_base_dir.clone(),
            username_prefix: settings.credentials.username_prefix.clone(),
            secret_length: settings.credentials.secret_length,
            section: ManagedSection::default(),
            port: AtomicU16::new(settings.postgres.port),
            version: OnceLock::new(),
        }
    }

    /// Replaces the source of generated user names and passwords.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretSource>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Sets the port `psql` connects to, e.g. the persisted listen port.
    #[must_use]
    pub fn with_port(self, port: u16) -> Self {
        self.port.store(port, Ordering::SeqCst);
        self
    }

    pub fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    /// Runs one statement. `redacted` is the text reported on failure.
    async fn execute(&self, sql: &str, redacted: &str) -> Result<String> {
        let args = vec![
            "-u".to_string(),
            self.superuser.clone(),
            "psql".to_string(),
            "-p".to_string(),
            self.port().to_string(),
            "-c".to_string(),
            sql.to_string(),
        ];
        debug!(query = redacted, "Executing statement");
        let stdout = self
            .runner
            .run("sudo", &args)
            .await
            .map_err(|e| AdminError::query(redacted, e))?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn rollback(&self, database: &str, user: Option<&str>) {
        if let Some(user) = user {
            if let Err(e) = self.drop_user(user).await {
                warn!(user, error = %e, "Rollback failed to drop user");
            }
        }
        if let Err(e) = self.drop_database(database).await {
            warn!(database, error = %e, "Rollback failed to drop database");
        }
    }
}

#[async_trait]
impl ResourceAdministrator for PsqlAdministrator {
    #[instrument(skip(self))]
    async fn create_database_and_user(&self, database: &str) -> Result<Resource> {
        let username = format!(
            "{}{}",
            self.username_prefix,
            self.secrets.generate(self.secret_length)
        );
        let password = self.secrets.generate(self.secret_length);

        let create_db = format!("CREATE DATABASE {}", quote_ident(database));
        self.execute(&create_db, &create_db).await?;

        let create_user = format!(
            "CREATE USER {} WITH ENCRYPTED PASSWORD ",
            quote_ident(&username)
        );
        let redacted = format!("{create_user}{}", quote_literal(REDACTED));
        let create_user = format!("{create_user}{}", quote_literal(&password));
        if let Err(e) = self.execute(&create_user, &redacted).await {
            self.rollback(database, None).await;
            return Err(e);
        }

        let grant = format!(
            "GRANT ALL PRIVILEGES ON DATABASE {} TO {}",
            quote_ident(database),
            quote_ident(&username)
        );
        if let Err(e) = self.execute(&grant, &grant).await {
            self.rollback(database, Some(&username)).await;
            return Err(e);
        }

        info!(database, user = %username, "Created database and user");
        Ok(Resource {
            name: database.to_string(),
            host: self.host.clone(),
            port: self.port(),
            username,
            password,
        })
    }

    #[instrument(skip(self))]
    async fn drop_database(&self, database: &str) -> Result<()> {
        let sql = format!("DROP DATABASE IF EXISTS {}", quote_ident(database));
        self.execute(&sql, &sql).await?;
        info!(database, "Dropped database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn drop_user(&self, user: &str) -> Result<()> {
        let sql = format!("DROP USER IF EXISTS {}", quote_ident(user));
        self.execute(&sql, &sql).await?;
        info!(user, "Dropped user");
        Ok(())
    }

    async fn get_version(&self) -> Result<String> {
        if let Some(version) = self.version.get() {
            return Ok(version.clone());
        }

        let sql = "SELECT version()";
        let output = self.execute(sql, sql).await?;
        let version = parse_version(&output).ok_or_else(|| {
            AdminError::VersionUnavailable(format!(
                "unrecognised output: {}",
                output.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
            ))
        })?;

        debug!(%version, "Detected PostgreSQL version");
        Ok(self.version.get_or_init(|| version).clone())
    }

    #[instrument(skip(self))]
    async fn reconfigure_listen_port(&self, port: u16) -> Result<()> {
        let version = self.get_version().await?;
        let dir = pg_conf_dir(&self.conf_base_dir, &version);

        update_postgresql_conf(&self.section, &dir.join("postgresql.conf"), port)?;
        update_pg_hba_conf(&self.section, &dir.join("pg_hba.conf"))?;

        self.port.store(port, Ordering::SeqCst);
        info!(port, dir = %dir.display(), "Reconfigured listen port");
        Ok(())
    }

    async fn restart_service(&self) -> Result<()> {
        let args = vec!["restart".to_string(), self.service.clone()];
        self.runner.run("systemctl", &args).await?;
        info!(service = %self.service, "Restarted service");
        Ok(())
    }
}
