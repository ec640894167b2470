//! Notification delivery and the deferred-notice queue.
//!
//! The dispatcher owns the redelivery counter the deferral gate consumes.
//! For a fresh notification the count is the number of same-kind notices
//! already queued. A redelivered notice still occupies its own slot and also
//! counts each earlier deferral of itself, so it is never deferred twice.

use std::collections::VecDeque;

use pgcharm_core::{NotificationKind, RelationId, UnitData};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::host::UnitHost;
use crate::reconciler::{HandlerOutcome, RelationReconciler};

/// A lifecycle or relation notification from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum Notification {
    Install,
    ConfigChanged {
        port: u16,
    },
    Start,
    LeaderChanged {
        leader: bool,
    },
    SubscriptionChanged {
        relation_id: RelationId,
        unit: String,
        #[serde(default)]
        data: UnitData,
    },
    SubscriptionRemoved {
        relation_id: RelationId,
        unit: String,
        #[serde(default)]
        data: UnitData,
    },
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Install => NotificationKind::Install,
            Self::ConfigChanged { .. } => NotificationKind::ConfigChanged,
            Self::Start => NotificationKind::Start,
            Self::LeaderChanged { .. } => NotificationKind::LeaderChanged,
            Self::SubscriptionChanged { .. } => NotificationKind::SubscriptionChanged,
            Self::SubscriptionRemoved { .. } => NotificationKind::SubscriptionRemoved,
        }
    }
}

/// A queued notification and how many times it has been deferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub notification: Notification,
    pub deferrals: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dispatcher {
    queue: VecDeque<Envelope>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Envelope> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn queued(&self, kind: NotificationKind) -> u32 {
        self.queue
            .iter()
            .filter(|e| e.notification.kind() == kind)
            .count() as u32
    }

    /// Delivers a fresh notification, queueing it if the handler defers.
    pub async fn dispatch(
        &mut self,
        reconciler: &mut RelationReconciler,
        host: &mut dyn UnitHost,
        notification: Notification,
    ) -> Result<HandlerOutcome> {
        let pending = self.queued(notification.kind());
        let outcome = deliver(reconciler, host, &notification, pending).await?;
        if outcome == HandlerOutcome::Deferred {
            info!(kind = %notification.kind(), "Notification deferred");
            self.queue.push_back(Envelope {
                notification,
                deferrals: 1,
            });
        }
        Ok(outcome)
    }

    /// Delivers `notification` if given, then replays the notices that were
    /// queued before it arrived.
    ///
    /// The fresh notification goes first so that a notice deferred on an
    /// unmet precondition is retried after the notification that may satisfy
    /// it. A notice deferred during this call waits for the next one.
    pub async fn handle(
        &mut self,
        reconciler: &mut RelationReconciler,
        host: &mut dyn UnitHost,
        notification: Option<Notification>,
    ) -> Result<Delivery> {
        let earlier = self.queue.len();
        let outcome = match notification {
            Some(notification) => Some(self.dispatch(reconciler, host, notification).await?),
            None => None,
        };
        let redelivered = self.redeliver_front(reconciler, host, earlier).await?;
        Ok(Delivery {
            outcome,
            redelivered,
        })
    }

    /// Replays queued notices in order.
    ///
    /// On a handler error the failing notice and everything after it stay
    /// queued, behind the notices already re-deferred in this pass.
    pub async fn redeliver(
        &mut self,
        reconciler: &mut RelationReconciler,
        host: &mut dyn UnitHost,
    ) -> Result<Vec<HandlerOutcome>> {
        let count = self.queue.len();
        self.redeliver_front(reconciler, host, count).await
    }

    async fn redeliver_front(
        &mut self,
        reconciler: &mut RelationReconciler,
        host: &mut dyn UnitHost,
        count: usize,
    ) -> Result<Vec<HandlerOutcome>> {
        let later = self.queue.split_off(count.min(self.queue.len()));
        let queued: Vec<Envelope> = std::mem::take(&mut self.queue).into();
        let mut outcomes = Vec::with_capacity(queued.len());
        let mut rest = queued.into_iter();

        while let Some(envelope) = rest.next() {
            let kind = envelope.notification.kind();
            let behind = rest
                .as_slice()
                .iter()
                .chain(later.iter())
                .filter(|e| e.notification.kind() == kind)
                .count() as u32;
            let pending = behind + self.queued(kind) + 1 + envelope.deferrals;
            debug!(%kind, pending, "Redelivering notification");

            match deliver(reconciler, host, &envelope.notification, pending).await {
                Ok(HandlerOutcome::Deferred) => {
                    self.queue.push_back(Envelope {
                        deferrals: envelope.deferrals + 1,
                        ..envelope
                    });
                    outcomes.push(HandlerOutcome::Deferred);
                }
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    self.queue.push_back(envelope);
                    self.queue.extend(rest);
                    self.queue.extend(later);
                    return Err(e);
                }
            }
        }
        self.queue.extend(later);
        Ok(outcomes)
    }
}

/// Result of [`Dispatcher::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Outcome for the fresh notification, if one was given.
    pub outcome: Option<HandlerOutcome>,
    /// Outcomes for replayed notices, in queue order.
    pub redelivered: Vec<HandlerOutcome>,
}

async fn deliver(
    reconciler: &mut RelationReconciler,
    host: &mut dyn UnitHost,
    notification: &Notification,
    pending: u32,
) -> Result<HandlerOutcome> {
    match notification {
        Notification::Install => Ok(reconciler.on_install_complete(host)),
        Notification::ConfigChanged { port } => {
            reconciler.on_config_changed(host, *port, pending).await
        }
        Notification::Start => reconciler.on_start(host, pending).await,
        Notification::LeaderChanged { leader } => {
            reconciler.set_leader(*leader);
            Ok(HandlerOutcome::Completed)
        }
        Notification::SubscriptionChanged {
            relation_id,
            unit,
            data,
        } => {
            reconciler
                .on_subscription_changed(host, *relation_id, unit, data)
                .await
        }
        Notification::SubscriptionRemoved {
            relation_id,
            unit,
            data,
        } => {
            reconciler
                .on_subscription_removed(host, *relation_id, unit, data)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_json() {
        let json = r#"{
            "kind": "subscription-changed",
            "relation-id": 4,
            "unit": "web/0",
            "data": {"database": "app", "ingress-address": "10.0.0.1"}
        }"#;
        let notification: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(notification.kind(), NotificationKind::SubscriptionChanged);
        match notification {
            Notification::SubscriptionChanged {
                relation_id,
                unit,
                data,
            } => {
                assert_eq!(relation_id, RelationId(4));
                assert_eq!(unit, "web/0");
                assert_eq!(data.requested_database(), Some("app"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let notification: Notification =
            serde_json::from_str(r#"{"kind": "config-changed", "port": 5433}"#).unwrap();
        assert_eq!(notification, Notification::ConfigChanged { port: 5433 });

        let notification: Notification = serde_json::from_str(r#"{"kind": "install"}"#).unwrap();
        assert_eq!(notification.kind(), NotificationKind::Install);
    }
}
