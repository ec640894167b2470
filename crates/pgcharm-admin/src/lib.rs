//! Privileged side effects for pgcharm.
//!
//! [`ResourceAdministrator`] and [`PortController`] are the seams the
//! reconciler drives. The production implementations shell out through a
//! [`CommandRunner`], which tests replace with a recording fake.

pub mod error;
pub mod ports;
pub mod psql;
pub mod runner;
pub mod traits;

pub use error::{AdminError, Result};
pub use ports::HookToolPorts;
pub use psql::{PsqlAdministrator, parse_version};
pub use runner::{CommandRunner, SystemCommandRunner};
pub use traits::{DynAdministrator, DynPortController, PortController, ResourceAdministrator};
