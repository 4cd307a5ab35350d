//! Fire-and-forget event reporting.
//!
//! Exactly one network call per event, no retry, no backoff. Failures are
//! logged and dropped: an event is worth one attempt and nothing more. If
//! the instance is not registered yet, reporting is a silent no-op.

use log::{debug, warn};

use crate::agent::AgentInner;
use crate::types::{LifecycleEvent, NotificationEvent};

pub(crate) async fn report_notification(
    inner: &AgentInner,
    msg_id: String,
    event: NotificationEvent,
) {
    let Some(instance_id) = inner.instance_id() else {
        debug!(
            "[PushAgent] Dropping notification event '{}', instance not registered",
            event
        );
        return;
    };

    if let Err(e) = inner
        .transport
        .report_notification_event(&inner.config.app_id, &instance_id, &msg_id, event)
        .await
    {
        warn!(
            "[PushAgent] Failed to send notification event '{}' for msg {}: {}",
            event, msg_id, e
        );
    }
}

pub(crate) async fn report_lifecycle(inner: &AgentInner, event: LifecycleEvent) {
    let Some(instance_id) = inner.instance_id() else {
        debug!(
            "[PushAgent] Dropping lifecycle event '{}', instance not registered",
            event
        );
        return;
    };

    if let Err(e) = inner
        .transport
        .report_lifecycle_event(&inner.config.app_id, &instance_id, event)
        .await
    {
        warn!("[PushAgent] Failed to send lifecycle event '{}': {}", event, e);
    }
}
