//! Wire types and domain enums shared across the agent.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default backend API base.
pub const DEFAULT_API_BASE_URL: &str = "https://core.push.express/api/r/v2";

/// Interval used between instance updates until the server says otherwise.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 120;

/// Floor applied to server-provided intervals so a misbehaving backend
/// cannot drive the sync loop into a tight spin.
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 30;

/// Push-delivery mechanism in use for this install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Fcm,
    Onesignal,
    Apns,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Fcm => "fcm",
            TransportType::Onesignal => "onesignal",
            TransportType::Apns => "apns",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete notification event, always paired with the message id from the
/// triggering push payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationEvent {
    Delivered,
    Clicked,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::Delivered => "delivered",
            NotificationEvent::Clicked => "clicked",
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// App-state transition reported to the lifecycle event endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEvent {
    Onscreen,
    Background,
    Closed,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Onscreen => "onscreen",
            LifecycleEvent::Background => "background",
            LifecycleEvent::Closed => "closed",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device metadata sent with every instance update.
///
/// Field names match the backend wire format; `county` is the field name the
/// backend expects for the region code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub transport_type: TransportType,
    pub transport_token: String,
    pub platform_type: String,
    pub platform_name: String,
    pub ext_id: String,
    pub lang: String,
    pub county: String,
    pub tz_sec: i32,
}

/// `POST /apps/{app_id}/instances` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    pub ic_token: String,
}

/// `POST /apps/{app_id}/instances` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstanceResponse {
    pub id: String,
}

/// `PUT /apps/{app_id}/instances/{id}/info` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInstanceResponse {
    pub update_interval_sec: u64,
}

/// `POST .../events/notification` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEventRequest {
    pub msg_id: String,
    pub event: NotificationEvent,
}

/// `POST .../events/lifecycle` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEventRequest {
    pub event: LifecycleEvent,
}

/// Decoded push payload as delivered by the transport.
///
/// Only `msg_id` is required; title/body/image are whatever the sender
/// attached. The agent itself only consumes `msg_id` (for event reporting);
/// the rest is exposed for the host's notification rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "px.msg_id")]
    pub msg_id: String,
    #[serde(rename = "px.title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "px.body", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(rename = "px.image", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TransportType::Fcm).unwrap(),
            "\"fcm\""
        );
        assert_eq!(
            serde_json::to_string(&TransportType::Onesignal).unwrap(),
            "\"onesignal\""
        );
    }

    #[test]
    fn notification_event_request_shape() {
        let body = NotificationEventRequest {
            msg_id: "m-1".to_string(),
            event: NotificationEvent::Delivered,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"msg_id": "m-1", "event": "delivered"}));
    }

    #[test]
    fn push_payload_uses_prefixed_keys() {
        let payload: PushPayload = serde_json::from_value(serde_json::json!({
            "px.msg_id": "abc",
            "px.title": "Hello",
            "px.body": "World",
        }))
        .unwrap();
        assert_eq!(payload.msg_id, "abc");
        assert_eq!(payload.title.as_deref(), Some("Hello"));
        assert_eq!(payload.image, None);
    }

}
