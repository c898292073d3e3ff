use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::auth::API_KEY_HEADER;
use super::domain::{NotificationId, TenantId, TenantView};
use super::forward::WorkflowForwarder;
use super::gateway::MessagingGateway;
use super::ingest::{EventPayload, IngestReceipt};
use super::repository::{NotificationStore, TemplateRepository, TenantRepository};
use super::service::{NotificationService, TemplateInput};

type SharedService<D, G, W> = Arc<NotificationService<D, G, W>>;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub wa_number: String,
}

/// Registration response; the only place the secret is ever returned.
#[derive(Debug, Serialize)]
pub struct RegisteredTenant {
    #[serde(flatten)]
    pub tenant: TenantView,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub plan: String,
}

#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    #[serde(default)]
    pub instance: String,
}

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

/// Router builder exposing tenant registration, event intake and delivery.
pub fn notification_router<D, G, W>(service: SharedService<D, G, W>) -> Router
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/28hub/register", post(register_handler::<D, G, W>))
        .route("/api/v1/28hub/:tenant_id/plan", put(plan_handler::<D, G, W>))
        .route(
            "/api/v1/28hub/:tenant_id/channel",
            post(connect_handler::<D, G, W>).delete(disconnect_handler::<D, G, W>),
        )
        .route(
            "/api/v1/28hub/:tenant_id/templates",
            post(template_handler::<D, G, W>),
        )
        .route(
            "/api/v1/28hub/:tenant_id/webhook/erp",
            post(ingest_handler::<D, G, W>),
        )
        .route(
            "/api/v1/28hub/:tenant_id/dashboard",
            get(dashboard_handler::<D, G, W>),
        )
        .route(
            "/api/v1/28hub/:tenant_id/send-all",
            post(send_all_handler::<D, G, W>),
        )
        .route(
            "/api/v1/28hub/:tenant_id/notifications/:notification_id",
            get(notification_handler::<D, G, W>),
        )
        .route(
            "/api/v1/28hub/:tenant_id/notifications/:notification_id/send",
            post(send_handler::<D, G, W>),
        )
        .route(
            "/api/v1/28hub/:tenant_id/notifications/:notification_id/retry",
            post(retry_handler::<D, G, W>),
        )
        .with_state(service)
}

fn presented_secret(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
}

pub(crate) async fn register_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Json(request): Json<RegisterRequest>,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    match service.register(&request.name, &request.wa_number) {
        Ok(tenant) => {
            let body = RegisteredTenant {
                tenant: tenant.view(),
                api_key: tenant.api_key,
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn plan_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<PlanRequest>,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    let tenant_id = TenantId(tenant_id);
    match service.change_plan(&tenant_id, presented_secret(&headers), &request.plan) {
        Ok(tenant) => (StatusCode::OK, Json(tenant.view())).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn connect_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ChannelRequest>,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    let tenant_id = TenantId(tenant_id);
    match service.connect_channel(&tenant_id, presented_secret(&headers), &request.instance) {
        Ok(tenant) => (StatusCode::OK, Json(tenant.view())).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn disconnect_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    let tenant_id = TenantId(tenant_id);
    match service.disconnect_channel(&tenant_id, presented_secret(&headers)) {
        Ok(tenant) => (StatusCode::OK, Json(tenant.view())).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn template_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<TemplateRequest>,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    let tenant_id = TenantId(tenant_id);
    let input = TemplateInput {
        name: request.name,
        kind: request.kind,
        content: request.content,
        is_active: request.is_active,
    };
    match service.save_template(&tenant_id, presented_secret(&headers), input) {
        Ok(template) => (StatusCode::CREATED, Json(template)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn ingest_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<EventPayload>,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    let tenant_id = TenantId(tenant_id);
    match service.ingest(&tenant_id, presented_secret(&headers), payload) {
        Ok(notification) => {
            let receipt = IngestReceipt::from(&notification);
            (StatusCode::CREATED, Json(receipt)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn dashboard_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    let tenant_id = TenantId(tenant_id);
    match service.dashboard(&tenant_id, presented_secret(&headers)) {
        Ok(dashboard) => (StatusCode::OK, Json(dashboard)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn send_all_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    let tenant_id = TenantId(tenant_id);
    match service
        .send_all_pending(&tenant_id, presented_secret(&headers))
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn notification_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Path((tenant_id, notification_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    let tenant_id = TenantId(tenant_id);
    let notification_id = NotificationId(notification_id);
    match service.notification(&tenant_id, presented_secret(&headers), &notification_id) {
        Ok(notification) => (StatusCode::OK, Json(notification)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn send_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Path((tenant_id, notification_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    let tenant_id = TenantId(tenant_id);
    let notification_id = NotificationId(notification_id);
    match service
        .send(&tenant_id, presented_secret(&headers), &notification_id)
        .await
    {
        Ok(notification) => (StatusCode::OK, Json(notification)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn retry_handler<D, G, W>(
    State(service): State<SharedService<D, G, W>>,
    Path((tenant_id, notification_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    D: TenantRepository + NotificationStore + TemplateRepository + 'static,
    G: MessagingGateway + ?Sized + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    let tenant_id = TenantId(tenant_id);
    let notification_id = NotificationId(notification_id);
    match service
        .retry(&tenant_id, presented_secret(&headers), &notification_id)
        .await
    {
        Ok(notification) => (StatusCode::OK, Json(notification)).into_response(),
        Err(error) => error.into_response(),
    }
}
