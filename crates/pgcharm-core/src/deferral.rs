//! Single-retry deferral.
//!
//! Handlers that run before their prerequisites are met ask for the current
//! notification to be redelivered later. The count of equivalent notices
//! already queued is owned by the dispatch layer and passed in as a plain
//! integer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kinds of host notification, used to group equivalent notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Install,
    ConfigChanged,
    Start,
    LeaderChanged,
    SubscriptionChanged,
    SubscriptionRemoved,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::ConfigChanged => write!(f, "config-changed"),
            Self::Start => write!(f, "start"),
            Self::LeaderChanged => write!(f, "leader-changed"),
            Self::SubscriptionChanged => write!(f, "subscription-changed"),
            Self::SubscriptionRemoved => write!(f, "subscription-removed"),
        }
    }
}

/// Decides whether a notification should be queued for redelivery.
///
/// Returns `false` once more than one equivalent notice is already pending,
/// so each kind gets at most one extra attempt.
pub fn should_defer(kind: NotificationKind, pending: u32) -> bool {
    if pending > 1 {
        tracing::debug!(%kind, pending, "Not deferring");
        false
    } else {
        tracing::debug!(%kind, pending, "Deferring");
        true
    }
}
