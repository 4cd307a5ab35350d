//! State-machine and timing tests for the registration and sync loops,
//! driven by a mock transport under Tokio's paused clock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use push_agent::{
    AgentConfig, AgentError, InstanceInfo, InstanceStore, InstanceTransport, LifecycleEvent,
    MemoryStore, NotificationEvent, PushAgent, PushPayload, TransportType, INSTANCE_ID_KEY,
};

/// Scriptable backend double that records every call.
struct MockTransport {
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    event_calls: AtomicUsize,
    /// Remaining create attempts to fail before succeeding.
    create_failures: AtomicUsize,
    /// Remaining update attempts to fail before succeeding.
    update_failures: AtomicUsize,
    /// Interval the mock server hands back on successful updates.
    update_interval_sec: AtomicU64,
    /// When true, every event post fails.
    fail_events: std::sync::atomic::AtomicBool,
    last_update_instance_id: Mutex<Option<String>>,
    last_update_info: Mutex<Option<InstanceInfo>>,
}

impl MockTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            event_calls: AtomicUsize::new(0),
            create_failures: AtomicUsize::new(0),
            update_failures: AtomicUsize::new(0),
            update_interval_sec: AtomicU64::new(120),
            fail_events: std::sync::atomic::AtomicBool::new(false),
            last_update_instance_id: Mutex::new(None),
            last_update_info: Mutex::new(None),
        })
    }

    fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    fn updates(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn events(&self) -> usize {
        self.event_calls.load(Ordering::SeqCst)
    }

    fn take_remaining(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl InstanceTransport for MockTransport {
    async fn create_instance(&self, _app_id: &str, _ic_token: &str) -> Result<String, AgentError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_remaining(&self.create_failures) {
            return Err(AgentError::Network("create failed".to_string()));
        }
        Ok("abc".to_string())
    }

    async fn update_instance(
        &self,
        _app_id: &str,
        instance_id: &str,
        info: &InstanceInfo,
    ) -> Result<Duration, AgentError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_update_instance_id.lock().unwrap() = Some(instance_id.to_string());
        *self.last_update_info.lock().unwrap() = Some(info.clone());
        if Self::take_remaining(&self.update_failures) {
            return Err(AgentError::Network("update failed".to_string()));
        }
        Ok(Duration::from_secs(
            self.update_interval_sec.load(Ordering::SeqCst),
        ))
    }

    async fn report_notification_event(
        &self,
        _app_id: &str,
        _instance_id: &str,
        _msg_id: &str,
        _event: NotificationEvent,
    ) -> Result<(), AgentError> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(AgentError::Network("event failed".to_string()));
        }
        Ok(())
    }

    async fn report_lifecycle_event(
        &self,
        _app_id: &str,
        _instance_id: &str,
        _event: LifecycleEvent,
    ) -> Result<(), AgentError> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(AgentError::Network("event failed".to_string()));
        }
        Ok(())
    }
}

fn test_agent(transport: Arc<MockTransport>) -> (PushAgent, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = AgentConfig::new("app-1", TransportType::Fcm).with_external_id("user-1");
    let agent = PushAgent::with_transport(config, store.clone(), transport);
    (agent, store)
}

/// Polls `cond` under the paused clock. The waits let the runtime go idle,
/// which auto-advances virtual time past any pending agent timer.
async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..100_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

#[tokio::test(start_paused = true)]
async fn fresh_install_registers_then_updates() {
    let transport = MockTransport::new();
    let (agent, store) = test_agent(transport.clone());

    agent.initialize().unwrap();
    wait_until("first update", || transport.updates() >= 1).await;

    assert_eq!(transport.creates(), 1);
    assert_eq!(agent.instance_id().as_deref(), Some("abc"));
    assert_eq!(
        store.get(INSTANCE_ID_KEY).unwrap(),
        Some("abc".to_string())
    );
    assert_eq!(
        transport
            .last_update_instance_id
            .lock()
            .unwrap()
            .as_deref(),
        Some("abc")
    );

    let info = transport.last_update_info.lock().unwrap().clone().unwrap();
    assert_eq!(info.transport_type, TransportType::Fcm);
    assert_eq!(info.ext_id, "user-1");

    agent.shutdown();
}

#[tokio::test(start_paused = true)]
async fn create_failures_are_retried_until_success() {
    let transport = MockTransport::new();
    transport.create_failures.store(2, Ordering::SeqCst);
    let (agent, store) = test_agent(transport.clone());

    agent.initialize().unwrap();
    wait_until("registration", || agent.instance_id().is_some()).await;

    // Two failures plus the success: exactly three create calls.
    assert_eq!(transport.creates(), 3);
    assert_eq!(
        store.get(INSTANCE_ID_KEY).unwrap(),
        Some("abc".to_string())
    );

    // Once an identity is held, create is never issued again.
    wait_until("a few sync cycles", || transport.updates() >= 3).await;
    assert_eq!(transport.creates(), 3);

    agent.shutdown();
}

#[tokio::test(start_paused = true)]
async fn persisted_identity_skips_registration() {
    let transport = MockTransport::new();
    let store = Arc::new(MemoryStore::new());
    store.set(INSTANCE_ID_KEY, "persisted-id").unwrap();
    let config = AgentConfig::new("app-1", TransportType::Apns);
    let agent = PushAgent::with_transport(config, store, transport.clone());

    agent.initialize().unwrap();
    wait_until("first update", || transport.updates() >= 1).await;

    assert_eq!(transport.creates(), 0);
    assert_eq!(
        transport
            .last_update_instance_id
            .lock()
            .unwrap()
            .as_deref(),
        Some("persisted-id")
    );

    agent.shutdown();
}

#[tokio::test(start_paused = true)]
async fn server_interval_drives_next_update() {
    let transport = MockTransport::new();
    transport.update_interval_sec.store(45, Ordering::SeqCst);
    let store = Arc::new(MemoryStore::new());
    store.set(INSTANCE_ID_KEY, "abc").unwrap();
    let agent = PushAgent::with_transport(
        AgentConfig::new("app-1", TransportType::Fcm),
        store,
        transport.clone(),
    );

    agent.initialize().unwrap();
    wait_until("first update", || transport.updates() >= 1).await;
    assert_eq!(agent.update_interval(), Duration::from_secs(45));

    let armed_at = tokio::time::Instant::now();
    wait_until("second update", || transport.updates() >= 2).await;
    let waited = armed_at.elapsed();

    // Scheduled ~45s out, not the 120s default.
    assert!(waited >= Duration::from_secs(44), "waited only {waited:?}");
    assert!(waited < Duration::from_secs(120), "waited {waited:?}");

    agent.shutdown();
}

#[tokio::test(start_paused = true)]
async fn tiny_server_interval_is_floored() {
    let transport = MockTransport::new();
    transport.update_interval_sec.store(1, Ordering::SeqCst);
    let store = Arc::new(MemoryStore::new());
    store.set(INSTANCE_ID_KEY, "abc").unwrap();
    let agent = PushAgent::with_transport(
        AgentConfig::new("app-1", TransportType::Fcm),
        store,
        transport.clone(),
    );

    agent.initialize().unwrap();
    wait_until("first update", || transport.updates() >= 1).await;

    assert_eq!(agent.update_interval(), Duration::from_secs(30));

    agent.shutdown();
}

#[tokio::test(start_paused = true)]
async fn update_failures_back_off_then_recover() {
    let transport = MockTransport::new();
    transport.update_failures.store(3, Ordering::SeqCst);
    let store = Arc::new(MemoryStore::new());
    store.set(INSTANCE_ID_KEY, "abc").unwrap();
    let agent = PushAgent::with_transport(
        AgentConfig::new("app-1", TransportType::Fcm),
        store,
        transport.clone(),
    );

    let started = tokio::time::Instant::now();
    agent.initialize().unwrap();
    wait_until("recovered update", || transport.updates() >= 4).await;

    // Three backoff waits: first in [1s, 5s), then doubling with upward
    // jitter. Minimum possible total is 1+2+4 = 7s.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(7), "recovered in {elapsed:?}");
    // Maximum possible total: 5 + 15 + 30 (plus polling grain).
    assert!(elapsed < Duration::from_secs(60), "took {elapsed:?}");

    agent.shutdown();
}

#[tokio::test(start_paused = true)]
async fn events_are_never_retried_and_touch_nothing() {
    let transport = MockTransport::new();
    transport.fail_events.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryStore::new());
    store.set(INSTANCE_ID_KEY, "abc").unwrap();
    let agent = PushAgent::with_transport(
        AgentConfig::new("app-1", TransportType::Fcm),
        store.clone(),
        transport.clone(),
    );

    agent.initialize().unwrap();
    wait_until("first update", || transport.updates() >= 1).await;
    let interval_before = agent.update_interval();

    agent.send_notification_event("m-1", NotificationEvent::Delivered);
    wait_until("event attempt", || transport.events() >= 1).await;

    // Give any (incorrect) retry plenty of virtual time to show up.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(transport.events(), 1);
    assert_eq!(
        store.get(INSTANCE_ID_KEY).unwrap(),
        Some("abc".to_string())
    );
    assert_eq!(agent.update_interval(), interval_before);

    agent.shutdown();
}

#[tokio::test(start_paused = true)]
async fn events_before_registration_are_dropped() {
    let transport = MockTransport::new();
    let (agent, _store) = test_agent(transport.clone());

    // Not initialized: no identity, so reports are silent no-ops.
    agent.send_notification_event("m-1", NotificationEvent::Clicked);
    agent.send_lifecycle_event(LifecycleEvent::Background);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(transport.events(), 0);
}

#[tokio::test(start_paused = true)]
async fn payload_helpers_report_with_the_payload_message_id() {
    let transport = MockTransport::new();
    let store = Arc::new(MemoryStore::new());
    store.set(INSTANCE_ID_KEY, "abc").unwrap();
    let agent = PushAgent::with_transport(
        AgentConfig::new("app-1", TransportType::Fcm),
        store,
        transport.clone(),
    );
    agent.initialize().unwrap();

    let payload: PushPayload = serde_json::from_value(serde_json::json!({
        "px.msg_id": "m-42",
        "px.title": "Hi",
    }))
    .unwrap();
    agent.notification_delivered(&payload);
    agent.notification_clicked(&payload);
    wait_until("both reports", || transport.events() >= 2).await;

    agent.shutdown();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_periodic_loop() {
    let transport = MockTransport::new();
    let store = Arc::new(MemoryStore::new());
    store.set(INSTANCE_ID_KEY, "abc").unwrap();
    let agent = PushAgent::with_transport(
        AgentConfig::new("app-1", TransportType::Fcm),
        store,
        transport.clone(),
    );

    agent.initialize().unwrap();
    wait_until("first update", || transport.updates() >= 1).await;
    agent.shutdown();

    let updates_at_shutdown = transport.updates();
    tokio::time::sleep(Duration::from_secs(1200)).await;
    assert_eq!(transport.updates(), updates_at_shutdown);
}

#[tokio::test(start_paused = true)]
async fn initialize_twice_is_rejected() {
    let transport = MockTransport::new();
    let (agent, _store) = test_agent(transport.clone());

    agent.initialize().unwrap();
    assert!(matches!(
        agent.initialize(),
        Err(AgentError::AlreadyInitialized)
    ));

    agent.shutdown();
}
