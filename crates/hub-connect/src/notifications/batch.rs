use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::dispatch::DispatchEngine;
use super::domain::{NotificationStatus, Tenant};
use super::error::NotifyError;
use super::gateway::MessagingGateway;
use super::repository::{NotificationStore, TemplateRepository};

/// Outcome of a pending sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub sent: usize,
    pub total: usize,
}

pub struct BatchDispatcher<S, G: ?Sized> {
    store: Arc<S>,
    engine: Arc<DispatchEngine<S, G>>,
}

impl<S, G> BatchDispatcher<S, G>
where
    S: NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, engine: Arc<DispatchEngine<S, G>>) -> Self {
        Self { store, engine }
    }

    /// Dispatch every notification that is `pending` when the sweep starts.
    /// A failing item is recorded on that item and the sweep moves on.
    pub async fn dispatch_all_pending(&self, tenant: &Tenant) -> Result<BatchReport, NotifyError> {
        let pending = self.store.pending_for(&tenant.id)?;
        let mut report = BatchReport {
            sent: 0,
            total: pending.len(),
        };

        for notification in pending {
            let notification_id = notification.id.clone();
            match self.engine.dispatch(tenant, notification).await {
                Ok(outcome) if outcome.status == NotificationStatus::Sent => report.sent += 1,
                Ok(_) => {}
                Err(error) => warn!(
                    tenant_id = %tenant.id.0,
                    notification_id = %notification_id.0,
                    %error,
                    "notification skipped during pending sweep"
                ),
            }
        }

        info!(
            tenant_id = %tenant.id.0,
            sent = report.sent,
            total = report.total,
            "pending sweep finished"
        );
        Ok(report)
    }
}
