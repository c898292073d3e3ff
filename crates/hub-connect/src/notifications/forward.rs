use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::domain::{EventKind, Notification, NotificationId, TenantId};

/// Payload forwarded to the workflow engine after an event is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub tenant_id: TenantId,
    pub notification_id: NotificationId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub value: Option<f64>,
    pub nf_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for EventSummary {
    fn from(notification: &Notification) -> Self {
        Self {
            tenant_id: notification.tenant_id.clone(),
            notification_id: notification.id.clone(),
            kind: notification.kind.clone(),
            client_name: notification.client_name.clone(),
            client_phone: notification.client_phone.clone(),
            value: notification.value,
            nf_number: notification.nf_number.clone(),
            created_at: notification.created_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("workflow engine did not answer in time")]
    Timeout,
    #[error("workflow engine unreachable: {0}")]
    Transport(String),
    #[error("workflow engine answered with status {status}")]
    Rejected { status: u16 },
}

/// Outbound hook to the external automation system.
#[async_trait]
pub trait WorkflowForwarder: Send + Sync {
    async fn forward(&self, summary: &EventSummary) -> Result<(), ForwardError>;

    fn enabled(&self) -> bool {
        true
    }
}

/// Posts summaries to a configured webhook URL; disabled without one.
#[derive(Debug, Clone)]
pub struct HttpWorkflowForwarder {
    client: reqwest::Client,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl HttpWorkflowForwarder {
    pub fn new(client: reqwest::Client, webhook_url: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            webhook_url,
            timeout,
        }
    }
}

#[async_trait]
impl WorkflowForwarder for HttpWorkflowForwarder {
    async fn forward(&self, summary: &EventSummary) -> Result<(), ForwardError> {
        let Some(url) = self.webhook_url.as_deref() else {
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(summary)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ForwardError::Timeout
                } else {
                    ForwardError::Transport(err.to_string())
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ForwardError::Rejected {
                status: response.status().as_u16(),
            })
        }
    }

    fn enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

/// Fire-and-forget forward on the current runtime. The outcome is only logged;
/// nothing is persisted, so a crash before the task runs loses the forward.
pub fn spawn_forward<W>(
    forwarder: Arc<W>,
    summary: EventSummary,
    timeout: Duration,
) -> Option<JoinHandle<()>>
where
    W: WorkflowForwarder + ?Sized + 'static,
{
    if !forwarder.enabled() {
        return None;
    }

    let Ok(runtime) = Handle::try_current() else {
        warn!(
            notification_id = %summary.notification_id.0,
            "no async runtime available, workflow forward skipped"
        );
        return None;
    };

    Some(runtime.spawn(async move {
        let outcome = tokio::time::timeout(timeout, forwarder.forward(&summary)).await;
        match outcome {
            Ok(Ok(())) => debug!(
                tenant_id = %summary.tenant_id.0,
                notification_id = %summary.notification_id.0,
                "event forwarded to workflow engine"
            ),
            Ok(Err(error)) => warn!(
                tenant_id = %summary.tenant_id.0,
                notification_id = %summary.notification_id.0,
                %error,
                "workflow forward failed"
            ),
            Err(_) => warn!(
                tenant_id = %summary.tenant_id.0,
                notification_id = %summary.notification_id.0,
                error = %ForwardError::Timeout,
                "workflow forward failed"
            ),
        }
    }))
}
