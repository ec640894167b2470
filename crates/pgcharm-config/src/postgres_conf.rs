//! Managed-section call sites for PostgreSQL's own configuration files.
//!
//! - `postgresql.conf`: any operator `port = N` line is removed and the managed
//!   section sets a wildcard listen address and the requested port.
//! - `pg_hba.conf`: unmanaged rules are kept and the managed section allows
//!   password logins from any IPv4 network.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::Result;
use crate::section::ManagedSection;

/// Access rule appended to `pg_hba.conf`.
pub const HBA_RULE: &str = "host all all 0.0.0.0/0 md5";

/// Configuration directory of a cluster: `<base>/<major>/main`.
///
/// `version` is the `major.minor` string reported by the server.
pub fn pg_conf_dir(base: &Path, version: &str) -> PathBuf {
    let major = version.split('.').next().unwrap_or(version);
    base.join(major).join("main")
}

fn is_port_setting(line: &str) -> bool {
    line.trim_start()
        .strip_prefix("port")
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

/// Points `postgresql.conf` at `port` and opens it on all addresses.
pub fn update_postgresql_conf(section: &ManagedSection, path: &Path, port: u16) -> Result<()> {
    let unmanaged: Vec<String> = section
        .strip(path)?
        .into_iter()
        .filter(|line| !is_port_setting(line))
        .collect();

    let managed = ["listen_addresses = '*'".to_string(), format!("port = {port}")];
    section.write(path, &unmanaged, &managed)?;

    info!(path = %path.display(), port, "Updated postgresql.conf");
    Ok(())
}

/// Appends the managed access rule to `pg_hba.conf`.
pub fn update_pg_hba_conf(section: &ManagedSection, path: &Path) -> Result<()> {
    let unmanaged = section.strip(path)?;
    section.write(path, &unmanaged, &[HBA_RULE])?;

    info!(path = %path.display(), "Updated pg_hba.conf");
    Ok(())
}
