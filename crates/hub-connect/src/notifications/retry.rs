use std::sync::Arc;

use tracing::{info, warn};

use super::dispatch::DispatchEngine;
use super::domain::{Notification, NotificationId, NotificationStatus, Tenant};
use super::error::NotifyError;
use super::gateway::MessagingGateway;
use super::repository::{NotificationStore, TemplateRepository, Transition};

/// Re-admits `failed` notifications into dispatch, bounded by the configured
/// attempt cap.
pub struct RetryController<S, G: ?Sized> {
    store: Arc<S>,
    engine: Arc<DispatchEngine<S, G>>,
    max_retries: u32,
}

impl<S, G> RetryController<S, G>
where
    S: NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, engine: Arc<DispatchEngine<S, G>>) -> Self {
        let max_retries = engine.config().max_retries;
        Self {
            store,
            engine,
            max_retries,
        }
    }

    /// The attempt is counted before the gateway is called. A repeated gateway
    /// failure is returned as `Ok` with the notification back in `failed`.
    pub async fn retry(
        &self,
        tenant: &Tenant,
        notification_id: &NotificationId,
    ) -> Result<Notification, NotifyError> {
        let current = self
            .store
            .fetch_notification(&tenant.id, notification_id)?
            .ok_or(NotifyError::NotFound("notification"))?;

        if current.status != NotificationStatus::Failed {
            return Err(NotifyError::InvalidState {
                expected: NotificationStatus::Failed,
                actual: current.status,
            });
        }
        if current.retry_count >= self.max_retries {
            warn!(
                tenant_id = %tenant.id.0,
                notification_id = %notification_id.0,
                retry_count = current.retry_count,
                "retry refused, attempt limit reached"
            );
            return Err(NotifyError::RetryLimitExceeded {
                limit: self.max_retries,
            });
        }

        // Concurrent retries race here. The store re-checks status and the
        // attempt cap under its lock, so a stale snapshot cannot overshoot.
        let readmitted = self
            .store
            .transition(
                &tenant.id,
                notification_id,
                NotificationStatus::Failed,
                Transition::Readmitted {
                    max_retries: self.max_retries,
                },
            )?;
        info!(
            tenant_id = %tenant.id.0,
            notification_id = %notification_id.0,
            retry_count = readmitted.retry_count,
            "notification readmitted for delivery"
        );

        self.engine.dispatch(tenant, readmitted).await
    }
}
