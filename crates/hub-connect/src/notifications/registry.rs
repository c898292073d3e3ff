use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use super::domain::{ChannelStatus, Plan, Tenant, TenantId, TenantStatus};
use super::error::NotifyError;
use super::repository::{RepositoryError, TenantRepository};

const API_KEY_BYTES: usize = 16;

/// Issues tenant identities and secrets and applies plan, status and
/// channel changes.
pub struct TenantRegistry<R> {
    repository: Arc<R>,
}

/// Random hex secret from the operating system CSPRNG.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl<R> TenantRegistry<R>
where
    R: TenantRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Register a tenant on the trial plan with a freshly issued secret.
    pub fn create(&self, name: &str, channel_address: &str) -> Result<Tenant, NotifyError> {
        let name = name.trim();
        let channel_address = channel_address.trim();
        if name.is_empty() {
            return Err(NotifyError::InvalidArgument("name is required".to_string()));
        }
        if channel_address.is_empty() {
            return Err(NotifyError::InvalidArgument(
                "wa_number is required".to_string(),
            ));
        }

        let now = Utc::now();
        let tenant = Tenant {
            id: TenantId::generate(),
            name: name.to_string(),
            channel_address: channel_address.to_string(),
            plan: Plan::Trial,
            status: TenantStatus::Active,
            trial_ends_at: Some(Tenant::trial_expiry_from(now)),
            api_key: generate_api_key(),
            channel_instance: None,
            channel_status: ChannelStatus::Disconnected,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert_tenant(tenant)?;
        info!(tenant_id = %stored.id.0, "tenant registered on trial plan");
        Ok(stored)
    }

    pub fn get(&self, tenant_id: &TenantId) -> Result<Tenant, NotifyError> {
        self.repository
            .fetch_tenant(tenant_id)?
            .ok_or(NotifyError::NotFound("tenant"))
    }

    pub fn set_plan(&self, tenant_id: &TenantId, plan: &str) -> Result<Tenant, NotifyError> {
        let plan = Plan::parse(plan).ok_or_else(|| {
            NotifyError::InvalidArgument(format!(
                "plan must be one of trial, basic, pro, enterprise (got '{plan}')"
            ))
        })?;

        self.modify(tenant_id, |tenant, now| {
            if plan == Plan::Trial {
                if tenant.plan != Plan::Trial || tenant.trial_ends_at.is_none() {
                    tenant.trial_ends_at = Some(Tenant::trial_expiry_from(now));
                }
            } else {
                tenant.trial_ends_at = None;
            }
            tenant.plan = plan;
        })
    }

    /// Bind a messaging-channel instance and mark it connected.
    pub fn connect_channel(
        &self,
        tenant_id: &TenantId,
        instance: &str,
    ) -> Result<Tenant, NotifyError> {
        let instance = instance.trim();
        if instance.is_empty() {
            return Err(NotifyError::InvalidArgument(
                "instance name is required".to_string(),
            ));
        }
        self.modify(tenant_id, |tenant, _| {
            tenant.channel_instance = Some(instance.to_string());
            tenant.channel_status = ChannelStatus::Connected;
        })
    }

    pub fn disconnect_channel(&self, tenant_id: &TenantId) -> Result<Tenant, NotifyError> {
        self.modify(tenant_id, |tenant, _| {
            tenant.channel_status = ChannelStatus::Disconnected;
        })
    }

    pub fn suspend(&self, tenant_id: &TenantId) -> Result<Tenant, NotifyError> {
        self.modify(tenant_id, |tenant, _| tenant.status = TenantStatus::Suspended)
    }

    pub fn activate(&self, tenant_id: &TenantId) -> Result<Tenant, NotifyError> {
        self.modify(tenant_id, |tenant, _| tenant.status = TenantStatus::Active)
    }

    /// Remove the tenant together with its notifications and templates.
    pub fn purge(&self, tenant_id: &TenantId) -> Result<(), NotifyError> {
        self.repository.delete_tenant(tenant_id).map_err(|err| match err {
            RepositoryError::NotFound => NotifyError::NotFound("tenant"),
            other => other.into(),
        })?;
        info!(tenant_id = %tenant_id.0, "tenant purged");
        Ok(())
    }

    fn modify<F>(&self, tenant_id: &TenantId, change: F) -> Result<Tenant, NotifyError>
    where
        F: FnOnce(&mut Tenant, DateTime<Utc>),
    {
        let mut tenant = self.get(tenant_id)?;
        let now = Utc::now();
        change(&mut tenant, now);
        tenant.updated_at = now;
        let stored = self.repository.update_tenant(tenant)?;
        info!(
            tenant_id = %stored.id.0,
            plan = stored.plan.label(),
            active = stored.is_active(),
            "tenant updated"
        );
        Ok(stored)
    }
}
