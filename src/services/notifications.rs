//! Outbound notifications. Delivery goes through an HTTP relay; the
//! API itself never talks SMTP. All callers treat notification failures
//! as best-effort and log instead of failing the request.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::auth::Role;
use crate::config::NotifierConfig;
use crate::errors::ServiceError;

/// Who a notification is addressed to. The relay resolves the actual
/// addresses; this service only knows roles and user ids.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recipient {
    Role { role: Role },
    User { user_id: Uuid },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    /// Base64-encoded file content.
    pub content: String,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            content: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), ServiceError>;
}

/// Relays notifications to the configured HTTP endpoint.
#[derive(Clone, Debug)]
pub struct HttpNotifier {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&notification)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("notifier: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "notifier returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Drops notifications on the floor. Used in tests and when the relay
/// is not configured.
#[derive(Clone, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), ServiceError> {
        debug!(subject = %notification.subject, "notification suppressed (no relay configured)");
        Ok(())
    }
}
