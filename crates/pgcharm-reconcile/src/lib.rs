//! Reconciliation core for pgcharm.
//!
//! [`RelationReconciler`] turns host notifications into database
//! provisioning, credential publishing and teardown. [`Dispatcher`] feeds it
//! and owns the deferred-notice queue; [`ReconciliationStore`] is the durable
//! state it keeps between invocations.

mod error;

pub mod dispatch;
pub mod host;
pub mod observability;
pub mod reconciler;
pub mod store;

pub use dispatch::{Delivery, Dispatcher, Envelope, Notification};
pub use error::{ReconcileError, Result};
pub use host::{InMemoryHost, UnitHost, UnitStatus};
pub use reconciler::{HandlerOutcome, RelationReconciler};
pub use store::{ReconciliationStore, load_json, save_json};
