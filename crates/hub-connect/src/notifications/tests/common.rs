use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::config::DeliveryConfig;
use crate::notifications::auth::API_KEY_HEADER;
use crate::notifications::domain::{
    EventKind, Notification, NotificationId, NotificationStatus, Template, Tenant, TenantId,
};
use crate::notifications::forward::{EventSummary, ForwardError, WorkflowForwarder};
use crate::notifications::gateway::{GatewayError, GatewayReceipt, MessagingGateway};
use crate::notifications::ingest::EventPayload;
use crate::notifications::memory::InMemoryDatabase;
use crate::notifications::repository::{
    NotificationStore, RepositoryError, StatusCounts, TemplateRepository, TenantRepository,
    Transition,
};
use crate::notifications::service::NotificationService;

pub(super) const INSTANCE: &str = "loja-main";

/// What the scripted gateway does on its next call.
#[derive(Debug, Clone, Copy)]
pub(super) enum Script {
    Accept,
    Timeout,
    Reject(u16),
    /// Never answers; the engine's own timeout has to fire.
    Hang,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct SentMessage {
    pub instance: String,
    pub destination: String,
    pub text: String,
}

/// Gateway fake that plays back a script and records every call. Once the
/// script runs out it accepts everything.
#[derive(Default)]
pub(super) struct ScriptedGateway {
    script: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<SentMessage>>,
}

impl ScriptedGateway {
    pub(super) fn with_script(script: impl IntoIterator<Item = Script>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::default(),
        }
    }

    pub(super) fn calls(&self) -> Vec<SentMessage> {
        self.calls.lock().expect("gateway mutex poisoned").clone()
    }
}

#[async_trait]
impl MessagingGateway for ScriptedGateway {
    async fn send_text(
        &self,
        instance: &str,
        destination: &str,
        text: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        let (step, call_number) = {
            let mut calls = self.calls.lock().expect("gateway mutex poisoned");
            calls.push(SentMessage {
                instance: instance.to_string(),
                destination: destination.to_string(),
                text: text.to_string(),
            });
            let step = self
                .script
                .lock()
                .expect("script mutex poisoned")
                .pop_front()
                .unwrap_or(Script::Accept);
            (step, calls.len())
        };

        match step {
            Script::Accept => Ok(GatewayReceipt {
                message_id: format!("wamid-{call_number}"),
            }),
            Script::Timeout => Err(GatewayError::Timeout),
            Script::Reject(status) => Err(GatewayError::Rejected {
                status,
                body: "instance offline".to_string(),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(GatewayError::Timeout)
            }
        }
    }
}

/// Forwarder that hands every summary to a channel.
pub(super) struct RecordingForwarder {
    sender: mpsc::UnboundedSender<EventSummary>,
}

impl RecordingForwarder {
    pub(super) fn new() -> (Self, mpsc::UnboundedReceiver<EventSummary>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl WorkflowForwarder for RecordingForwarder {
    async fn forward(&self, summary: &EventSummary) -> Result<(), ForwardError> {
        self.sender
            .send(summary.clone())
            .map_err(|_| ForwardError::Transport("receiver dropped".to_string()))
    }
}

#[derive(Default)]
pub(super) struct FailingForwarder {
    pub(super) attempts: AtomicUsize,
}

#[async_trait]
impl WorkflowForwarder for FailingForwarder {
    async fn forward(&self, _summary: &EventSummary) -> Result<(), ForwardError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ForwardError::Rejected { status: 503 })
    }
}

pub(super) struct SlowForwarder;

#[async_trait]
impl WorkflowForwarder for SlowForwarder {
    async fn forward(&self, _summary: &EventSummary) -> Result<(), ForwardError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

/// Storage that is down for every call.
pub(super) struct UnavailableDatabase;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl TenantRepository for UnavailableDatabase {
    fn insert_tenant(&self, _tenant: Tenant) -> Result<Tenant, RepositoryError> {
        Err(offline())
    }

    fn update_tenant(&self, _tenant: Tenant) -> Result<Tenant, RepositoryError> {
        Err(offline())
    }

    fn fetch_tenant(&self, _id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        Err(offline())
    }

    fn delete_tenant(&self, _id: &TenantId) -> Result<(), RepositoryError> {
        Err(offline())
    }
}

impl NotificationStore for UnavailableDatabase {
    fn insert_notification(
        &self,
        _notification: Notification,
    ) -> Result<Notification, RepositoryError> {
        Err(offline())
    }

    fn fetch_notification(
        &self,
        _tenant_id: &TenantId,
        _id: &NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        Err(offline())
    }

    fn transition(
        &self,
        _tenant_id: &TenantId,
        _id: &NotificationId,
        _expected: NotificationStatus,
        _transition: Transition,
    ) -> Result<Notification, RepositoryError> {
        Err(offline())
    }

    fn pending_for(&self, _tenant_id: &TenantId) -> Result<Vec<Notification>, RepositoryError> {
        Err(offline())
    }

    fn recent_for(
        &self,
        _tenant_id: &TenantId,
        _limit: usize,
    ) -> Result<Vec<Notification>, RepositoryError> {
        Err(offline())
    }

    fn counts_for(&self, _tenant_id: &TenantId) -> Result<StatusCounts, RepositoryError> {
        Err(offline())
    }
}

impl TemplateRepository for UnavailableDatabase {
    fn upsert_template(&self, _template: Template) -> Result<Template, RepositoryError> {
        Err(offline())
    }

    fn active_template(
        &self,
        _tenant_id: &TenantId,
        _kind: &EventKind,
    ) -> Result<Option<Template>, RepositoryError> {
        Err(offline())
    }
}

/// Store whose reads return a snapshot taken earlier, standing in for a
/// retry that read the row before a concurrent retry changed it.
pub(super) struct StaleReadStore {
    pub(super) inner: Arc<InMemoryDatabase>,
    pub(super) snapshot: Notification,
}

impl NotificationStore for StaleReadStore {
    fn insert_notification(
        &self,
        notification: Notification,
    ) -> Result<Notification, RepositoryError> {
        self.inner.insert_notification(notification)
    }

    fn fetch_notification(
        &self,
        _tenant_id: &TenantId,
        _id: &NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        Ok(Some(self.snapshot.clone()))
    }

    fn transition(
        &self,
        tenant_id: &TenantId,
        id: &NotificationId,
        expected: NotificationStatus,
        transition: Transition,
    ) -> Result<Notification, RepositoryError> {
        self.inner.transition(tenant_id, id, expected, transition)
    }

    fn pending_for(&self, tenant_id: &TenantId) -> Result<Vec<Notification>, RepositoryError> {
        self.inner.pending_for(tenant_id)
    }

    fn recent_for(
        &self,
        tenant_id: &TenantId,
        limit: usize,
    ) -> Result<Vec<Notification>, RepositoryError> {
        self.inner.recent_for(tenant_id, limit)
    }

    fn counts_for(&self, tenant_id: &TenantId) -> Result<StatusCounts, RepositoryError> {
        self.inner.counts_for(tenant_id)
    }
}

impl TemplateRepository for StaleReadStore {
    fn upsert_template(&self, template: Template) -> Result<Template, RepositoryError> {
        self.inner.upsert_template(template)
    }

    fn active_template(
        &self,
        tenant_id: &TenantId,
        kind: &EventKind,
    ) -> Result<Option<Template>, RepositoryError> {
        self.inner.active_template(tenant_id, kind)
    }
}

pub(super) type TestService =
    NotificationService<InMemoryDatabase, ScriptedGateway, RecordingForwarder>;

pub(super) struct Harness {
    pub service: Arc<TestService>,
    pub db: Arc<InMemoryDatabase>,
    pub gateway: Arc<ScriptedGateway>,
    pub forwarded: mpsc::UnboundedReceiver<EventSummary>,
}

pub(super) fn delivery_config() -> DeliveryConfig {
    DeliveryConfig {
        max_retries: 3,
        address_suffix: DeliveryConfig::DEFAULT_ADDRESS_SUFFIX.to_string(),
        gateway_timeout: Duration::from_millis(50),
    }
}

pub(super) fn harness(script: impl IntoIterator<Item = Script>) -> Harness {
    let db = Arc::new(InMemoryDatabase::new());
    let gateway = Arc::new(ScriptedGateway::with_script(script));
    let (forwarder, forwarded) = RecordingForwarder::new();
    let service = Arc::new(NotificationService::new(
        db.clone(),
        gateway.clone(),
        Arc::new(forwarder),
        delivery_config(),
        Duration::from_millis(200),
    ));
    Harness {
        service,
        db,
        gateway,
        forwarded,
    }
}

/// Harness whose gateway accepts every message.
pub(super) fn accepting() -> Harness {
    harness(Vec::new())
}

/// Registered tenant with a connected channel instance.
pub(super) fn connected_tenant(harness: &Harness, name: &str, number: &str) -> Tenant {
    let tenant = harness
        .service
        .register(name, number)
        .expect("tenant registered");
    harness
        .service
        .registry()
        .connect_channel(&tenant.id, INSTANCE)
        .expect("channel connected")
}

pub(super) fn sale_payload() -> EventPayload {
    payload(json!({
        "type": "sale",
        "client_name": "Acme",
        "client_phone": "+55 (11) 91234-5678",
        "valor": 150.00,
        "nf_number": "NF-1"
    }))
}

pub(super) fn payload(value: Value) -> EventPayload {
    serde_json::from_value(value).expect("payload deserializes")
}

pub(super) fn ingest_sale(harness: &Harness, tenant: &Tenant) -> Notification {
    harness
        .service
        .ingest(&tenant.id, Some(&tenant.api_key), sale_payload())
        .expect("event ingested")
}

pub(super) fn stored(harness: &Harness, notification: &Notification) -> Notification {
    harness
        .db
        .fetch_notification(&notification.tenant_id, &notification.id)
        .expect("store reachable")
        .expect("notification stored")
}

pub(super) fn request(
    method: Method,
    uri: &str,
    secret: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(secret) = secret {
        builder = builder.header(API_KEY_HEADER, secret);
    }
    match body {
        Some(body) => builder
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("json body")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
