//! Perpetual instance update loop.
//!
//! A single state-owned timer drives both the periodic cadence and failure
//! backoff: each cycle retries the update until it succeeds, then waits the
//! server-provided interval before the next cycle. Exactly one update call
//! is ever in flight, and exactly one timer is armed at a time.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::agent::AgentInner;
use crate::backoff::retry_until;
use crate::error::Result;
use crate::platform::DeviceInfo;
use crate::store::TRANSPORT_TOKEN_KEY;
use crate::types::{InstanceInfo, MIN_UPDATE_INTERVAL_SECS};

/// Runs update cycles until the agent is shut down.
///
/// Backoff state is reset at the start of every cycle: a fresh randomized
/// first delay per top-level operation, never carried across cycles.
pub(crate) async fn run_sync_loop(inner: Arc<AgentInner>) {
    let cancel = inner.cancel.clone();
    loop {
        let interval = match retry_until("instance update", &cancel, || {
            let inner = inner.clone();
            async move { update_instance(&inner).await }
        })
        .await
        {
            Some(interval) => interval,
            None => return,
        };

        // Floor the server's answer so a misbehaving backend cannot drive
        // this loop into a tight spin.
        let interval = interval.max(Duration::from_secs(MIN_UPDATE_INTERVAL_SECS));
        let previous = inner.set_update_interval(interval);
        if previous != interval {
            info!(
                "[PushAgent] Update interval changed: {}s -> {}s",
                previous.as_secs(),
                interval.as_secs()
            );
        }

        debug!(
            "[PushAgent] Next instance update in {}s",
            interval.as_secs()
        );
        tokio::select! {
            _ = inner.cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Gathers current device metadata and performs one update call.
async fn update_instance(inner: &Arc<AgentInner>) -> Result<Duration> {
    // The registration handoff publishes the id before this loop starts.
    let Some(instance_id) = inner.instance_id() else {
        debug!("[PushAgent] Skipping instance update, no instance id yet");
        return Ok(inner.update_interval());
    };

    let device = DeviceInfo::collect();
    let transport_token = match inner.store.get(TRANSPORT_TOKEN_KEY) {
        Ok(token) => token.unwrap_or_default(),
        Err(e) => {
            // Fail open: an unreadable token store is reported as "no token",
            // same as a fresh install.
            warn!("[PushAgent] Failed to read transport token: {}", e);
            String::new()
        }
    };

    let info = InstanceInfo {
        transport_type: inner.config.transport_type,
        transport_token,
        platform_type: device.platform.to_string(),
        platform_name: device.platform.to_string(),
        ext_id: inner.config.external_id.clone().unwrap_or_default(),
        lang: device.language,
        county: device.country,
        tz_sec: device.tz_offset_secs,
    };

    inner
        .transport
        .update_instance(&inner.config.app_id, &instance_id, &info)
        .await
}
