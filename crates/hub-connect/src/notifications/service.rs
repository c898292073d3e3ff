use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::auth::AuthGuard;
use super::batch::{BatchDispatcher, BatchReport};
use super::dispatch::DispatchEngine;
use super::domain::{
    EventKind, Notification, NotificationId, Template, Tenant, TenantId, TenantView,
};
use super::error::NotifyError;
use super::forward::WorkflowForwarder;
use super::gateway::MessagingGateway;
use super::ingest::{EventPayload, IngestionService};
use super::registry::TenantRegistry;
use super::repository::{NotificationStore, TemplateRepository, TenantRepository};
use super::retry::RetryController;
use crate::config::DeliveryConfig;

/// Number of notifications listed on the dashboard.
pub const DASHBOARD_RECENT_LIMIT: usize = 20;

/// Tenant overview with per-status totals.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub tenant: TenantView,
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
    pub recent: Vec<Notification>,
}

/// Fields a tenant supplies when registering a message template.
#[derive(Debug, Clone)]
pub struct TemplateInput {
    pub name: String,
    pub kind: String,
    pub content: String,
    pub is_active: bool,
}

/// Entry point for every tenant-scoped operation.
///
/// Each call authenticates the presented secret against the stored tenant
/// before touching notifications.
pub struct NotificationService<D, G: ?Sized, W: ?Sized> {
    store: Arc<D>,
    registry: TenantRegistry<D>,
    guard: AuthGuard<D>,
    ingestion: IngestionService<D, W>,
    engine: Arc<DispatchEngine<D, G>>,
    retries: RetryController<D, G>,
    batch: BatchDispatcher<D, G>,
}

impl<D, G, W> NotificationService<D, G, W>
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    pub fn new(
        store: Arc<D>,
        gateway: Arc<G>,
        forwarder: Arc<W>,
        delivery: DeliveryConfig,
        forward_timeout: Duration,
    ) -> Self {
        let engine = Arc::new(DispatchEngine::new(store.clone(), gateway, delivery));
        Self {
            registry: TenantRegistry::new(store.clone()),
            guard: AuthGuard::new(store.clone()),
            ingestion: IngestionService::new(store.clone(), forwarder, forward_timeout),
            retries: RetryController::new(store.clone(), engine.clone()),
            batch: BatchDispatcher::new(store.clone(), engine.clone()),
            engine,
            store,
        }
    }

    pub fn registry(&self) -> &TenantRegistry<D> {
        &self.registry
    }

    pub fn register(&self, name: &str, channel_address: &str) -> Result<Tenant, NotifyError> {
        self.registry.create(name, channel_address)
    }

    pub fn authenticate(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
    ) -> Result<Tenant, NotifyError> {
        self.guard.authenticate(tenant_id, secret)
    }

    pub fn change_plan(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
        plan: &str,
    ) -> Result<Tenant, NotifyError> {
        let tenant = self.authenticate(tenant_id, secret)?;
        self.registry.set_plan(&tenant.id, plan)
    }

    pub fn connect_channel(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
        instance: &str,
    ) -> Result<Tenant, NotifyError> {
        let tenant = self.authenticate(tenant_id, secret)?;
        self.registry.connect_channel(&tenant.id, instance)
    }

    pub fn disconnect_channel(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
    ) -> Result<Tenant, NotifyError> {
        let tenant = self.authenticate(tenant_id, secret)?;
        self.registry.disconnect_channel(&tenant.id)
    }

    pub fn save_template(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
        input: TemplateInput,
    ) -> Result<Template, NotifyError> {
        let tenant = self.authenticate(tenant_id, secret)?;
        let name = input.name.trim();
        let kind = input.kind.trim();
        if name.is_empty() || kind.is_empty() || input.content.trim().is_empty() {
            return Err(NotifyError::InvalidArgument(
                "name, type and content are required".to_string(),
            ));
        }

        let mut template = Template::new(
            tenant.id,
            name,
            EventKind::from(kind.to_string()),
            input.content,
        );
        template.is_active = input.is_active;
        Ok(self.store.upsert_template(template)?)
    }

    pub fn ingest(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
        payload: EventPayload,
    ) -> Result<Notification, NotifyError> {
        let tenant = self.authenticate(tenant_id, secret)?;
        self.ingestion.ingest(tenant_id, &tenant, payload)
    }

    pub fn notification(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
        notification_id: &NotificationId,
    ) -> Result<Notification, NotifyError> {
        let tenant = self.authenticate(tenant_id, secret)?;
        self.store
            .fetch_notification(&tenant.id, notification_id)?
            .ok_or(NotifyError::NotFound("notification"))
    }

    pub async fn send(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
        notification_id: &NotificationId,
    ) -> Result<Notification, NotifyError> {
        let tenant = self.authenticate(tenant_id, secret)?;
        let notification = self
            .store
            .fetch_notification(&tenant.id, notification_id)?
            .ok_or(NotifyError::NotFound("notification"))?;
        self.engine.dispatch(&tenant, notification).await
    }

    pub async fn retry(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
        notification_id: &NotificationId,
    ) -> Result<Notification, NotifyError> {
        let tenant = self.authenticate(tenant_id, secret)?;
        self.retries.retry(&tenant, notification_id).await
    }

    pub async fn send_all_pending(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
    ) -> Result<BatchReport, NotifyError> {
        let tenant = self.authenticate(tenant_id, secret)?;
        self.batch.dispatch_all_pending(&tenant).await
    }

    pub fn dashboard(
        &self,
        tenant_id: &TenantId,
        secret: Option<&str>,
    ) -> Result<Dashboard, NotifyError> {
        let tenant = self.authenticate(tenant_id, secret)?;
        let counts = self.store.counts_for(&tenant.id)?;
        let recent = self.store.recent_for(&tenant.id, DASHBOARD_RECENT_LIMIT)?;
        Ok(Dashboard {
            tenant: tenant.view(),
            total: counts.total,
            pending: counts.pending,
            sent: counts.sent,
            failed: counts.failed,
            recent,
        })
    }
}
