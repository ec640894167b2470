//! # pgcharm-core
//!
//! Value types shared by the pgcharm crates.
//!
//! Nothing in this crate performs I/O. It provides:
//! - [`ConnectionDescriptor`]: libpq `key=value` strings and `postgresql://` URIs
//! - [`Resource`]: a provisioned database with its credential pair
//! - [`UnitData`] / [`PublishedData`]: typed inbound and outward relation data
//! - [`incoming_addresses`] / [`range_of`]: subscriber address ranges
//! - [`should_defer`]: the single-retry deferral rule
//! - [`SecretSource`]: random identifiers and passwords

pub mod address;
pub mod connection;
pub mod deferral;
mod error;
pub mod relation;
pub mod resource;
pub mod secret;

pub use address::{incoming_addresses, join_ranges, range_of};
pub use connection::ConnectionDescriptor;
pub use deferral::{NotificationKind, should_defer};
pub use error::ConnectionStringError;
pub use relation::{PublishedData, Relation, RelationId, UnitData};
pub use resource::Resource;
pub use secret::{RandomSecretGenerator, SecretSource};

/// Default PostgreSQL listen port.
pub const DEFAULT_PORT: u16 = 5432;
