//! Interfaces to the privileged collaborators the reconciler drives.

use std::sync::Arc;

use async_trait::async_trait;
use pgcharm_core::Resource;

use crate::error::Result;

/// Creates and drops databases and users on the managed server.
///
/// Calls block the handler until they finish. The caller guarantees that
/// `create_database_and_user` runs at most once per database name.
#[async_trait]
pub trait ResourceAdministrator: Send + Sync {
    /// Creates a database plus a freshly generated user owning all privileges
    /// on it, and returns the resulting resource.
    async fn create_database_and_user(&self, database: &str) -> Result<Resource>;

    /// Drops a database. Dropping an absent database succeeds.
    async fn drop_database(&self, database: &str) -> Result<()>;

    /// Drops a user. Dropping an absent user succeeds.
    async fn drop_user(&self, user: &str) -> Result<()>;

    /// Returns the server's `major.minor` version, cached after the first
    /// successful query.
    async fn get_version(&self) -> Result<String>;

    /// Rewrites the server configuration to listen on `port`.
    async fn reconfigure_listen_port(&self, port: u16) -> Result<()>;

    async fn restart_service(&self) -> Result<()>;
}

/// Opens and closes ports at the network layer.
#[async_trait]
pub trait PortController: Send + Sync {
    async fn open_port(&self, port: u16) -> Result<()>;

    async fn close_port(&self, port: u16) -> Result<()>;
}

/// Shared administrator handle.
pub type DynAdministrator = Arc<dyn ResourceAdministrator>;

/// Shared port controller handle.
pub type DynPortController = Arc<dyn PortController>;
