use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::domain::{
    EventKind, Notification, NotificationDraft, NotificationId, NotificationStatus, Tenant,
    TenantId,
};
use super::error::NotifyError;
use super::forward::{spawn_forward, EventSummary, WorkflowForwarder};
use super::repository::NotificationStore;

/// Event body as posted by upstream ERP integrations.
///
/// Field presence and types vary between integrations. Contact address and
/// amount each arrive under a current name (`client_phone`, `value`) or a
/// legacy one (`telefone`, `valor`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(rename = "type", alias = "event_type", default)]
    pub kind: Option<Value>,
    #[serde(default)]
    pub client_name: Option<Value>,
    #[serde(default)]
    pub client_phone: Option<Value>,
    #[serde(default)]
    pub telefone: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub valor: Option<Value>,
    #[serde(default)]
    pub nf_number: Option<Value>,
    #[serde(default)]
    pub products: Option<Value>,
}

/// Strict form of an [`EventPayload`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub kind: EventKind,
    pub draft: NotificationDraft,
}

/// Response body returned to the ERP once the event is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReceipt {
    pub status: NotificationStatus,
    pub notification_id: NotificationId,
    pub tenant_id: TenantId,
}

impl From<&Notification> for IngestReceipt {
    fn from(notification: &Notification) -> Self {
        Self {
            status: notification.status,
            notification_id: notification.id.clone(),
            tenant_id: notification.tenant_id.clone(),
        }
    }
}

/// The current name wins whenever it carries a value.
pub fn resolve_alias<T>(current: Option<T>, legacy: Option<T>) -> Option<T> {
    current.or(legacy)
}

fn text_field(field: &str, value: Option<Value>) -> Result<Option<String>, NotifyError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(_) => Err(NotifyError::InvalidArgument(format!(
            "{field} must be a string"
        ))),
    }
}

fn amount_field(field: &str, value: Option<Value>) -> Result<Option<f64>, NotifyError> {
    let invalid = || NotifyError::InvalidArgument(format!("{field} must be a number"));
    let amount = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_f64().ok_or_else(invalid)?,
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            decimal_literal(trimmed)
                .parse::<f64>()
                .map_err(|_| invalid())?
        }
        Some(_) => return Err(invalid()),
    };

    if amount.is_finite() {
        Ok(Some(amount))
    } else {
        Err(invalid())
    }
}

/// Rewrite `1.234,50`, `1,234.50` and `150,75` into a plain decimal literal.
/// With both separators present the last one marks the decimals.
fn decimal_literal(raw: &str) -> String {
    match (raw.rfind(','), raw.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (Some(_), None) => raw.replace(',', "."),
        _ => raw.to_string(),
    }
}

/// Turn a loosely typed payload into a [`NormalizedEvent`].
pub fn normalize(payload: EventPayload) -> Result<NormalizedEvent, NotifyError> {
    let kind = match payload.kind {
        Some(Value::String(kind)) if !kind.trim().is_empty() => {
            EventKind::from(kind.trim().to_string())
        }
        None | Some(Value::Null) | Some(Value::String(_)) => {
            return Err(NotifyError::InvalidArgument("type is required".to_string()))
        }
        Some(_) => {
            return Err(NotifyError::InvalidArgument(
                "type must be a string".to_string(),
            ))
        }
    };

    let client_phone = resolve_alias(
        text_field("client_phone", payload.client_phone)?,
        text_field("telefone", payload.telefone)?,
    );
    let value = resolve_alias(
        amount_field("value", payload.value)?,
        amount_field("valor", payload.valor)?,
    );

    let products = match payload.products {
        Some(Value::Null) | None => None,
        Some(products @ (Value::Array(_) | Value::Object(_))) => Some(products),
        Some(_) => {
            return Err(NotifyError::InvalidArgument(
                "products must be a list or an object".to_string(),
            ))
        }
    };

    Ok(NormalizedEvent {
        kind,
        draft: NotificationDraft {
            client_name: text_field("client_name", payload.client_name)?,
            client_phone,
            value,
            nf_number: text_field("nf_number", payload.nf_number)?,
            products,
        },
    })
}

/// Stores inbound events as pending notifications and forwards a summary to
/// the workflow engine without waiting for it.
pub struct IngestionService<S, W: ?Sized> {
    store: Arc<S>,
    forwarder: Arc<W>,
    forward_timeout: Duration,
}

impl<S, W> IngestionService<S, W>
where
    S: NotificationStore + 'static,
    W: WorkflowForwarder + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, forwarder: Arc<W>, forward_timeout: Duration) -> Self {
        Self {
            store,
            forwarder,
            forward_timeout,
        }
    }

    /// `tenant` must be the result of authenticating `tenant_id`.
    pub fn ingest(
        &self,
        tenant_id: &TenantId,
        tenant: &Tenant,
        payload: EventPayload,
    ) -> Result<Notification, NotifyError> {
        if &tenant.id != tenant_id {
            return Err(NotifyError::Forbidden);
        }

        let NormalizedEvent { kind, draft } = normalize(payload)?;
        let notification = Notification::pending(tenant.id.clone(), kind, draft);
        let stored = self.store.insert_notification(notification)?;

        info!(
            tenant_id = %stored.tenant_id.0,
            notification_id = %stored.id.0,
            kind = stored.kind.label(),
            "event stored as pending notification"
        );

        spawn_forward(
            self.forwarder.clone(),
            EventSummary::from(&stored),
            self.forward_timeout,
        );

        Ok(stored)
    }
}
