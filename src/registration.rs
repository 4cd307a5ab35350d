//! One-shot instance registration.
//!
//! Entered only when no instance identity is persisted at initialize time.
//! The create call is retried forever with backoff; once an identity has
//! been persisted this path is never re-entered for the process lifetime.

use std::sync::Arc;

use log::{info, warn};
use uuid::Uuid;

use crate::agent::AgentInner;
use crate::backoff::retry_until;
use crate::store::INSTANCE_ID_KEY;

/// Registers this install with the backend, returning the canonical instance
/// id, or `None` if the agent was shut down first.
///
/// A fresh random local token is generated per attempt; the server treats
/// each call as a new creation attempt, so reuse is not required.
pub(crate) async fn run_registration(inner: &Arc<AgentInner>) -> Option<String> {
    let app_id = inner.config.app_id.clone();
    let transport = inner.transport.clone();

    let instance_id = retry_until("instance creation", &inner.cancel, || {
        let ic_token = Uuid::new_v4().to_string();
        let app_id = app_id.clone();
        let transport = transport.clone();
        async move { transport.create_instance(&app_id, &ic_token).await }
    })
    .await?;

    // Persist before publishing so a relaunch never re-registers. A write
    // failure degrades to re-registration on next launch, which the backend
    // tolerates (at-least-once contract).
    if let Err(e) = inner.store.set(INSTANCE_ID_KEY, &instance_id) {
        warn!(
            "[PushAgent] Failed to persist instance id, next launch will re-register: {}",
            e
        );
    }
    inner.set_instance_id(&instance_id);
    info!("[PushAgent] Instance registered: {}", instance_id);
    Some(instance_id)
}
