//! HTTP client for the instance backend.
//!
//! [`ApiClient`] is a stateless request/response wrapper: one network call
//! per operation, no retry logic of its own. Retry and backoff live with the
//! callers. Every transport failure, non-success status, and unparseable
//! body collapses into [`AgentError::Network`].

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::error::{AgentError, Result};
use crate::types::{
    CreateInstanceRequest, CreateInstanceResponse, InstanceInfo, LifecycleEvent,
    LifecycleEventRequest, NotificationEvent, NotificationEventRequest, UpdateInstanceResponse,
};

/// Backend operations needed by the agent's controllers.
///
/// Implemented by [`ApiClient`] for the real backend; tests supply mocks.
#[async_trait]
pub trait InstanceTransport: Send + Sync {
    /// Create a fresh instance record; returns the canonical instance id.
    async fn create_instance(&self, app_id: &str, ic_token: &str) -> Result<String>;

    /// Idempotent upsert of device metadata; returns the next update
    /// interval recommended by the server.
    async fn update_instance(
        &self,
        app_id: &str,
        instance_id: &str,
        info: &InstanceInfo,
    ) -> Result<Duration>;

    /// One-way notification event post; the response body is ignored.
    async fn report_notification_event(
        &self,
        app_id: &str,
        instance_id: &str,
        msg_id: &str,
        event: NotificationEvent,
    ) -> Result<()>;

    /// One-way lifecycle event post; the response body is ignored.
    async fn report_lifecycle_event(
        &self,
        app_id: &str,
        instance_id: &str,
        event: LifecycleEvent,
    ) -> Result<()>;
}

/// Reqwest-backed client for the backend's HTTP-JSON interface.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client against `base_url` with the given per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B: serde::Serialize>(&self, url: &str, body: &B) -> Result<reqwest::Response> {
        let resp = self.client.post(url).json(body).send().await?;
        Self::check_status(resp)
    }

    fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            return Err(AgentError::Network(format!(
                "{} returned status {}",
                resp.url(),
                status
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl InstanceTransport for ApiClient {
    async fn create_instance(&self, app_id: &str, ic_token: &str) -> Result<String> {
        let url = self.url(&format!("/apps/{app_id}/instances"));
        debug!("[ApiClient] POST {}", url);
        let resp = self
            .post_json(
                &url,
                &CreateInstanceRequest {
                    ic_token: ic_token.to_string(),
                },
            )
            .await?;
        let parsed: CreateInstanceResponse = resp
            .json()
            .await
            .map_err(|e| AgentError::Network(format!("malformed create response: {e}")))?;
        Ok(parsed.id)
    }

    async fn update_instance(
        &self,
        app_id: &str,
        instance_id: &str,
        info: &InstanceInfo,
    ) -> Result<Duration> {
        let url = self.url(&format!("/apps/{app_id}/instances/{instance_id}/info"));
        debug!("[ApiClient] PUT {}", url);
        let resp = self.client.put(&url).json(info).send().await?;
        let resp = Self::check_status(resp)?;
        let parsed: UpdateInstanceResponse = resp
            .json()
            .await
            .map_err(|e| AgentError::Network(format!("malformed update response: {e}")))?;
        Ok(Duration::from_secs(parsed.update_interval_sec))
    }

    async fn report_notification_event(
        &self,
        app_id: &str,
        instance_id: &str,
        msg_id: &str,
        event: NotificationEvent,
    ) -> Result<()> {
        let url = self.url(&format!(
            "/apps/{app_id}/instances/{instance_id}/events/notification"
        ));
        debug!("[ApiClient] POST {} ({})", url, event);
        self.post_json(
            &url,
            &NotificationEventRequest {
                msg_id: msg_id.to_string(),
                event,
            },
        )
        .await?;
        Ok(())
    }

    async fn report_lifecycle_event(
        &self,
        app_id: &str,
        instance_id: &str,
        event: LifecycleEvent,
    ) -> Result<()> {
        let url = self.url(&format!(
            "/apps/{app_id}/instances/{instance_id}/events/lifecycle"
        ));
        debug!("[ApiClient] POST {} ({})", url, event);
        self.post_json(&url, &LifecycleEventRequest { event }).await?;
        Ok(())
    }
}
