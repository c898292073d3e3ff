use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    EventKind, Notification, NotificationId, NotificationStatus, Template, TemplateId, Tenant,
    TenantId,
};
use super::repository::{
    NotificationStore, RepositoryError, StatusCounts, TemplateRepository, TenantRepository,
    Transition,
};

#[derive(Default)]
struct Tables {
    tenants: HashMap<TenantId, Tenant>,
    notifications: HashMap<NotificationId, Notification>,
    templates: HashMap<TemplateId, Template>,
}

/// Process-local backend holding tenants, notifications and templates.
///
/// All three tables sit behind one lock, so a cascade delete or a status
/// compare-and-set is observed atomically by concurrent callers.
#[derive(Default, Clone)]
pub struct InMemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("database mutex poisoned".to_string()))
    }
}

fn ensure_unique(tables: &Tables, tenant: &Tenant) -> Result<(), RepositoryError> {
    for other in tables.tenants.values().filter(|other| other.id != tenant.id) {
        if other.api_key == tenant.api_key {
            return Err(RepositoryError::Conflict("api_key".to_string()));
        }
        if other.channel_address == tenant.channel_address {
            return Err(RepositoryError::Conflict("wa_number".to_string()));
        }
    }
    Ok(())
}

impl TenantRepository for InMemoryDatabase {
    fn insert_tenant(&self, tenant: Tenant) -> Result<Tenant, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.tenants.contains_key(&tenant.id) {
            return Err(RepositoryError::Conflict("id".to_string()));
        }
        ensure_unique(&tables, &tenant)?;
        tables.tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    fn update_tenant(&self, tenant: Tenant) -> Result<Tenant, RepositoryError> {
        let mut tables = self.lock()?;
        let stored = tables
            .tenants
            .get(&tenant.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.api_key != tenant.api_key {
            return Err(RepositoryError::Conflict("api_key is immutable".to_string()));
        }
        ensure_unique(&tables, &tenant)?;
        tables.tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    fn fetch_tenant(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        Ok(self.lock()?.tenants.get(id).cloned())
    }

    fn delete_tenant(&self, id: &TenantId) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if tables.tenants.remove(id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        tables
            .notifications
            .retain(|_, notification| &notification.tenant_id != id);
        tables.templates.retain(|_, template| &template.tenant_id != id);
        Ok(())
    }
}

impl NotificationStore for InMemoryDatabase {
    fn insert_notification(
        &self,
        notification: Notification,
    ) -> Result<Notification, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.tenants.contains_key(&notification.tenant_id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.notifications.contains_key(&notification.id) {
            return Err(RepositoryError::Conflict("id".to_string()));
        }
        tables
            .notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    fn fetch_notification(
        &self,
        tenant_id: &TenantId,
        id: &NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .notifications
            .get(id)
            .filter(|notification| &notification.tenant_id == tenant_id)
            .cloned())
    }

    fn transition(
        &self,
        tenant_id: &TenantId,
        id: &NotificationId,
        expected: NotificationStatus,
        transition: Transition,
    ) -> Result<Notification, RepositoryError> {
        let mut tables = self.lock()?;
        let notification = tables
            .notifications
            .get_mut(id)
            .filter(|notification| &notification.tenant_id == tenant_id)
            .ok_or(RepositoryError::NotFound)?;
        transition.apply_to(notification, expected)?;
        Ok(notification.clone())
    }

    fn pending_for(&self, tenant_id: &TenantId) -> Result<Vec<Notification>, RepositoryError> {
        let tables = self.lock()?;
        let mut pending: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|notification| {
                &notification.tenant_id == tenant_id
                    && notification.status == NotificationStatus::Pending
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    fn recent_for(
        &self,
        tenant_id: &TenantId,
        limit: usize,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let tables = self.lock()?;
        let mut recent: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|notification| &notification.tenant_id == tenant_id)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }

    fn counts_for(&self, tenant_id: &TenantId) -> Result<StatusCounts, RepositoryError> {
        let tables = self.lock()?;
        let mut counts = StatusCounts::default();
        tables
            .notifications
            .values()
            .filter(|notification| &notification.tenant_id == tenant_id)
            .for_each(|notification| counts.record(notification.status));
        Ok(counts)
    }
}

impl TemplateRepository for InMemoryDatabase {
    fn upsert_template(&self, template: Template) -> Result<Template, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.tenants.contains_key(&template.tenant_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.templates.insert(template.id.clone(), template.clone());
        Ok(template)
    }

    fn active_template(
        &self,
        tenant_id: &TenantId,
        kind: &EventKind,
    ) -> Result<Option<Template>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .templates
            .values()
            .filter(|template| {
                &template.tenant_id == tenant_id && &template.kind == kind && template.is_active
            })
            .max_by_key(|template| template.updated_at)
            .cloned())
    }
}
