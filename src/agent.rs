//! Agent facade wiring the store, client, and background loops together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::client::{ApiClient, InstanceTransport};
use crate::error::Result;
use crate::events;
use crate::registration::run_registration;
use crate::store::{InstanceStore, INSTANCE_ID_KEY, TRANSPORT_TOKEN_KEY};
use crate::sync::run_sync_loop;
use crate::types::{
    LifecycleEvent, NotificationEvent, PushPayload, TransportType, DEFAULT_API_BASE_URL,
    DEFAULT_UPDATE_INTERVAL_SECS,
};

/// Agent configuration, fixed for the life of a [`PushAgent`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Backend application id.
    pub app_id: String,
    /// Push-delivery mechanism for this install.
    pub transport_type: TransportType,
    /// Host-assigned external user id, if any.
    pub external_id: Option<String>,
    /// Backend API base URL.
    pub api_base_url: String,
    /// Per-request timeout for backend calls.
    pub request_timeout: Duration,
}

impl AgentConfig {
    pub fn new(app_id: impl Into<String>, transport_type: TransportType) -> Self {
        Self {
            app_id: app_id.into(),
            transport_type,
            external_id: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(20),
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_api_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// State shared between the facade and its background loops.
pub(crate) struct AgentInner {
    pub(crate) config: AgentConfig,
    pub(crate) store: Arc<dyn InstanceStore>,
    pub(crate) transport: Arc<dyn InstanceTransport>,
    pub(crate) cancel: CancellationToken,
    instance_id: Mutex<Option<String>>,
    update_interval: Mutex<Duration>,
    started: AtomicBool,
}

impl AgentInner {
    pub(crate) fn instance_id(&self) -> Option<String> {
        self.instance_id.lock().clone()
    }

    pub(crate) fn set_instance_id(&self, id: &str) {
        *self.instance_id.lock() = Some(id.to_string());
    }

    pub(crate) fn update_interval(&self) -> Duration {
        *self.update_interval.lock()
    }

    /// Stores the new interval and returns the previous one.
    pub(crate) fn set_update_interval(&self, interval: Duration) -> Duration {
        let mut slot = self.update_interval.lock();
        std::mem::replace(&mut *slot, interval)
    }
}

/// Device-side push instance agent.
///
/// Explicitly constructed with an injected store (keychain, preferences,
/// file - whatever the platform provides); there is no global singleton.
/// Cheap to clone; clones share the same state and background loops.
///
/// All public operations return immediately. Network work runs on spawned
/// Tokio tasks, so the agent must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct PushAgent {
    inner: Arc<AgentInner>,
}

impl PushAgent {
    /// Create an agent that talks to the real backend over HTTP.
    pub fn new(config: AgentConfig, store: Arc<dyn InstanceStore>) -> Self {
        let transport = Arc::new(ApiClient::new(&config.api_base_url, config.request_timeout));
        Self::with_transport(config, store, transport)
    }

    /// Create an agent with a custom transport (mocks, instrumentation).
    pub fn with_transport(
        config: AgentConfig,
        store: Arc<dyn InstanceStore>,
        transport: Arc<dyn InstanceTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(AgentInner {
                config,
                store,
                transport,
                cancel: CancellationToken::new(),
                instance_id: Mutex::new(None),
                update_interval: Mutex::new(Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS)),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Starts the background lifecycle: registration (fresh install) or the
    /// periodic sync loop (identity already persisted). Returns immediately;
    /// a second call is rejected so instance creation can never run twice.
    ///
    /// An unreadable store is treated as a fresh install: the backend
    /// tolerates re-registration, losing the instance does not.
    pub fn initialize(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(crate::error::AgentError::AlreadyInitialized);
        }

        let persisted = match self.inner.store.get(INSTANCE_ID_KEY) {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    "[PushAgent] Failed to read instance id, treating as fresh install: {}",
                    e
                );
                None
            }
        };

        let inner = self.inner.clone();
        match persisted {
            Some(instance_id) => {
                info!("[PushAgent] Using persisted instance: {}", instance_id);
                inner.set_instance_id(&instance_id);
                tokio::spawn(async move { run_sync_loop(inner).await });
            }
            None => {
                info!("[PushAgent] No persisted instance, registering");
                tokio::spawn(async move {
                    // Creation must succeed before the first update call and
                    // before the periodic timer is armed.
                    if run_registration(&inner).await.is_some() {
                        run_sync_loop(inner).await;
                    }
                });
            }
        }
        Ok(())
    }

    /// Persist the opaque push-transport token; it is picked up by the next
    /// instance update.
    pub fn set_notification_token(&self, token: &str) -> Result<()> {
        self.inner.store.set(TRANSPORT_TOKEN_KEY, token)?;
        Ok(())
    }

    /// Report a notification event. Fire-and-forget: one attempt, failures
    /// are logged and dropped, and nothing blocks the caller. A no-op until
    /// the instance is registered.
    pub fn send_notification_event(&self, msg_id: &str, event: NotificationEvent) {
        let inner = self.inner.clone();
        let msg_id = msg_id.to_string();
        tokio::spawn(async move {
            events::report_notification(&inner, msg_id, event).await;
        });
    }

    /// Report an app lifecycle event. Same fire-and-forget contract as
    /// [`Self::send_notification_event`].
    pub fn send_lifecycle_event(&self, event: LifecycleEvent) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            events::report_lifecycle(&inner, event).await;
        });
    }

    /// Report a decoded push as delivered.
    pub fn notification_delivered(&self, payload: &PushPayload) {
        self.send_notification_event(&payload.msg_id, NotificationEvent::Delivered);
    }

    /// Report a decoded push as tapped by the user.
    pub fn notification_clicked(&self, payload: &PushPayload) {
        self.send_notification_event(&payload.msg_id, NotificationEvent::Clicked);
    }

    /// The backend-assigned instance id, once registration has completed.
    pub fn instance_id(&self) -> Option<String> {
        self.inner.instance_id()
    }

    /// The current cadence between instance updates.
    pub fn update_interval(&self) -> Duration {
        self.inner.update_interval()
    }

    /// Stops all background loops. In-flight requests finish; no further
    /// retries or periodic updates are scheduled.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}
