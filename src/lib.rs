//! Push Agent - device-side push-notification instance lifecycle.
//!
//! This crate keeps a backend informed of a per-install push "instance": it
//! creates the instance record once, persists its identity, refreshes device
//! metadata on a server-controlled cadence, and reports delivered/clicked
//! notification events. All network failures are handled locally (infinite
//! exponential backoff for registration and sync, silent drop for events);
//! the host application is never blocked and never sees backend errors.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use push_agent::{AgentConfig, FileStore, NotificationEvent, PushAgent, TransportType};
//!
//! let store = Arc::new(FileStore::open("push_agent.json")?);
//! let agent = PushAgent::new(
//!     AgentConfig::new("12345-example-app", TransportType::Fcm),
//!     store,
//! );
//!
//! // Non-blocking: spawns registration (first launch) or the periodic
//! // sync loop (identity already persisted).
//! agent.initialize()?;
//!
//! // Whenever the push transport hands out a fresh token:
//! agent.set_notification_token("fcm-token");
//!
//! // From the notification delivery / tap callbacks:
//! agent.send_notification_event("msg-1", NotificationEvent::Delivered);
//! agent.send_notification_event("msg-1", NotificationEvent::Clicked);
//! ```

mod agent;
mod backoff;
mod client;
mod error;
mod events;
mod platform;
mod registration;
mod store;
mod sync;
mod types;

pub use agent::{AgentConfig, PushAgent};
pub use backoff::RetryPolicy;
pub use client::{ApiClient, InstanceTransport};
pub use error::{AgentError, Result, StoreError};
pub use platform::{DeviceInfo, DevicePlatform};
pub use store::{FileStore, InstanceStore, MemoryStore, INSTANCE_ID_KEY, TRANSPORT_TOKEN_KEY};
pub use types::{
    InstanceInfo, LifecycleEvent, NotificationEvent, PushPayload, TransportType,
    DEFAULT_API_BASE_URL, DEFAULT_UPDATE_INTERVAL_SECS, MIN_UPDATE_INTERVAL_SECS,
};
