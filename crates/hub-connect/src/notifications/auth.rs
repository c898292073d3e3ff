use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::warn;

use super::domain::{Tenant, TenantId};
use super::error::NotifyError;
use super::repository::TenantRepository;

/// Header carrying the tenant secret on every tenant-scoped request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Verifies a claimed tenant against its stored secret and status.
///
/// The tenant row is read on every call so suspensions take effect on the
/// next request.
pub struct AuthGuard<R> {
    repository: Arc<R>,
}

impl<R> AuthGuard<R>
where
    R: TenantRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn authenticate(
        &self,
        tenant_id: &TenantId,
        presented_secret: Option<&str>,
    ) -> Result<Tenant, NotifyError> {
        let presented = match presented_secret.map(str::trim) {
            Some(secret) if !secret.is_empty() => secret,
            _ => return Err(NotifyError::Unauthorized),
        };

        let tenant = self
            .repository
            .fetch_tenant(tenant_id)?
            .ok_or(NotifyError::NotFound("tenant"))?;

        if !secrets_match(presented, &tenant.api_key) {
            warn!(tenant_id = %tenant_id.0, "rejected request with invalid api key");
            return Err(NotifyError::Forbidden);
        }

        if !tenant.is_active() {
            warn!(tenant_id = %tenant_id.0, "rejected request for suspended tenant");
            return Err(NotifyError::Forbidden);
        }

        Ok(tenant)
    }
}

fn secrets_match(presented: &str, stored: &str) -> bool {
    presented.as_bytes().ct_eq(stored.as_bytes()).into()
}
