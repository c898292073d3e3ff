use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    EventKind, Notification, NotificationId, NotificationStatus, Template, Tenant, TenantId,
};

/// Tenant rows. Deleting a tenant removes its notifications and templates.
pub trait TenantRepository: Send + Sync {
    fn insert_tenant(&self, tenant: Tenant) -> Result<Tenant, RepositoryError>;
    fn update_tenant(&self, tenant: Tenant) -> Result<Tenant, RepositoryError>;
    fn fetch_tenant(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError>;
    fn delete_tenant(&self, id: &TenantId) -> Result<(), RepositoryError>;
}

/// Durable record of every notification and its delivery bookkeeping.
///
/// Status changes only go through [`NotificationStore::transition`], which
/// applies the change when the stored status still equals `expected`.
pub trait NotificationStore: Send + Sync {
    fn insert_notification(
        &self,
        notification: Notification,
    ) -> Result<Notification, RepositoryError>;

    fn fetch_notification(
        &self,
        tenant_id: &TenantId,
        id: &NotificationId,
    ) -> Result<Option<Notification>, RepositoryError>;

    fn transition(
        &self,
        tenant_id: &TenantId,
        id: &NotificationId,
        expected: NotificationStatus,
        transition: Transition,
    ) -> Result<Notification, RepositoryError>;

    fn pending_for(&self, tenant_id: &TenantId) -> Result<Vec<Notification>, RepositoryError>;

    /// Newest first.
    fn recent_for(
        &self,
        tenant_id: &TenantId,
        limit: usize,
    ) -> Result<Vec<Notification>, RepositoryError>;

    fn counts_for(&self, tenant_id: &TenantId) -> Result<StatusCounts, RepositoryError>;
}

/// Rendering inputs owned by tenant-facing template management.
pub trait TemplateRepository: Send + Sync {
    fn upsert_template(&self, template: Template) -> Result<Template, RepositoryError>;
    fn active_template(
        &self,
        tenant_id: &TenantId,
        kind: &EventKind,
    ) -> Result<Option<Template>, RepositoryError>;
}

/// A requested status change together with the bookkeeping it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Delivered {
        gateway_message_id: String,
        sent_at: DateTime<Utc>,
    },
    Failed {
        error: String,
    },
    /// Failed back to pending; counts one more attempt while the stored
    /// count is below `max_retries`.
    Readmitted { max_retries: u32 },
}

impl Transition {
    pub fn target(&self) -> NotificationStatus {
        match self {
            Transition::Delivered { .. } => NotificationStatus::Sent,
            Transition::Failed { .. } => NotificationStatus::Failed,
            Transition::Readmitted { .. } => NotificationStatus::Pending,
        }
    }

    /// Compare-and-set against `expected`, then apply. Storage backends call
    /// this while holding whatever guards the row.
    pub fn apply_to(
        self,
        notification: &mut Notification,
        expected: NotificationStatus,
    ) -> Result<(), RepositoryError> {
        if notification.status != expected {
            return Err(RepositoryError::StatusMismatch {
                expected,
                actual: notification.status,
            });
        }
        let target = self.target();
        if !expected.allows(target) {
            return Err(RepositoryError::InvalidTransition {
                from: expected,
                to: target,
            });
        }

        if let Transition::Readmitted { max_retries } = &self {
            if notification.retry_count >= *max_retries {
                return Err(RepositoryError::RetryLimitReached {
                    limit: *max_retries,
                });
            }
        }

        match self {
            Transition::Delivered {
                gateway_message_id,
                sent_at,
            } => {
                notification.gateway_message_id = Some(gateway_message_id);
                notification.sent_at = Some(sent_at);
                notification.error_message = None;
            }
            Transition::Failed { error } => {
                notification.error_message = Some(error);
            }
            Transition::Readmitted { .. } => {
                notification.retry_count = notification.retry_count.saturating_add(1);
                notification.error_message = None;
            }
        }
        notification.status = target;
        Ok(())
    }
}

/// Per-status totals for a tenant's notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: NotificationStatus) {
        self.total += 1;
        match status {
            NotificationStatus::Pending => self.pending += 1,
            NotificationStatus::Sent => self.sent += 1,
            NotificationStatus::Failed => self.failed += 1,
        }
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record conflicts with an existing one: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("expected status {}, found {}", .expected.label(), .actual.label())]
    StatusMismatch {
        expected: NotificationStatus,
        actual: NotificationStatus,
    },
    #[error("transition from {} to {} is not permitted", .from.label(), .to.label())]
    InvalidTransition {
        from: NotificationStatus,
        to: NotificationStatus,
    },
    #[error("retry limit of {limit} attempts reached")]
    RetryLimitReached { limit: u32 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
