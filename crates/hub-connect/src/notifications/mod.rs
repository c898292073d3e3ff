//! Tenant-scoped notification intake and delivery.
//!
//! Events enter through [`IngestionService`] as `pending` notifications.
//! [`DispatchEngine`] moves them to `sent` or `failed`, [`RetryController`]
//! re-admits failures up to the configured cap, and [`BatchDispatcher`]
//! sweeps everything still pending. Every status change is a compare-and-set
//! through [`NotificationStore::transition`].

pub mod auth;
pub mod batch;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod forward;
pub mod gateway;
pub mod ingest;
pub mod memory;
pub mod registry;
pub mod render;
pub mod repository;
pub mod retry;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use auth::{AuthGuard, API_KEY_HEADER};
pub use batch::{BatchDispatcher, BatchReport};
pub use dispatch::{DispatchEngine, CHANNEL_NOT_CONNECTED};
pub use domain::{
    ChannelStatus, EventKind, Notification, NotificationDraft, NotificationId,
    NotificationStatus, Plan, Template, TemplateId, Tenant, TenantId, TenantStatus, TenantView,
};
pub use error::NotifyError;
pub use forward::{
    spawn_forward, EventSummary, ForwardError, HttpWorkflowForwarder, WorkflowForwarder,
};
pub use gateway::{GatewayError, GatewayReceipt, HttpMessagingGateway, MessagingGateway};
pub use ingest::{normalize, EventPayload, IngestReceipt, IngestionService, NormalizedEvent};
pub use memory::InMemoryDatabase;
pub use registry::{generate_api_key, TenantRegistry};
pub use render::{format_brl, normalize_destination, render_message};
pub use repository::{
    NotificationStore, RepositoryError, StatusCounts, TemplateRepository, TenantRepository,
    Transition,
};
pub use retry::RetryController;
pub use router::notification_router;
pub use service::{Dashboard, NotificationService, TemplateInput, DASHBOARD_RECENT_LIMIT};
