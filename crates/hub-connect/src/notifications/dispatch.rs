use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{Notification, NotificationStatus, Tenant};
use super::error::NotifyError;
use super::gateway::{GatewayError, GatewayReceipt, MessagingGateway};
use super::render::{normalize_destination, render_message};
use super::repository::{NotificationStore, TemplateRepository, Transition};
use crate::config::DeliveryConfig;

/// Recorded on notifications that could not be sent because the tenant has no
/// connected channel instance.
pub const CHANNEL_NOT_CONNECTED: &str =
    "configuration error: messaging channel is not connected for this tenant";

/// Renders notifications and hands them to the messaging gateway.
///
/// Gateway failures are recorded on the notification (`failed` plus an error
/// description) and never surface as errors; `retry_count` is left alone.
pub struct DispatchEngine<S, G: ?Sized> {
    store: Arc<S>,
    gateway: Arc<G>,
    config: DeliveryConfig,
}

impl<S, G> DispatchEngine<S, G>
where
    S: NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, config: DeliveryConfig) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Attempt delivery of a `pending` notification owned by `tenant`.
    pub async fn dispatch(
        &self,
        tenant: &Tenant,
        notification: Notification,
    ) -> Result<Notification, NotifyError> {
        if notification.tenant_id != tenant.id {
            return Err(NotifyError::NotFound("notification"));
        }
        if notification.status != NotificationStatus::Pending {
            return Err(NotifyError::InvalidState {
                expected: NotificationStatus::Pending,
                actual: notification.status,
            });
        }

        let Some(instance) = tenant.connected_instance() else {
            self.record_failure(&notification, CHANNEL_NOT_CONNECTED.to_string())?;
            return Err(NotifyError::PreconditionFailed(
                CHANNEL_NOT_CONNECTED.to_string(),
            ));
        };

        let template = self
            .store
            .active_template(&tenant.id, &notification.kind)?;
        let text = render_message(&notification, template.as_ref());
        let destination = normalize_destination(
            notification.client_phone.as_deref().unwrap_or_default(),
            &self.config.address_suffix,
        );

        match self.send(instance, &destination, &text).await {
            Ok(receipt) => {
                let sent = self.store.transition(
                    &notification.tenant_id,
                    &notification.id,
                    NotificationStatus::Pending,
                    Transition::Delivered {
                        gateway_message_id: receipt.message_id,
                        sent_at: Utc::now(),
                    },
                )?;
                info!(
                    tenant_id = %sent.tenant_id.0,
                    notification_id = %sent.id.0,
                    status = sent.status.label(),
                    "notification delivered"
                );
                Ok(sent)
            }
            Err(error) => self.record_failure(&notification, error.to_string()),
        }
    }

    async fn send(
        &self,
        instance: &str,
        destination: &str,
        text: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        let attempt = self.gateway.send_text(instance, destination, text);
        match tokio::time::timeout(self.config.gateway_timeout, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => Err(GatewayError::Timeout),
        }
    }

    fn record_failure(
        &self,
        notification: &Notification,
        error: String,
    ) -> Result<Notification, NotifyError> {
        warn!(
            tenant_id = %notification.tenant_id.0,
            notification_id = %notification.id.0,
            error = %error,
            "notification delivery failed"
        );
        let failed = self.store.transition(
            &notification.tenant_id,
            &notification.id,
            NotificationStatus::Pending,
            Transition::Failed { error },
        )?;
        Ok(failed)
    }
}
