use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Days granted to a tenant whenever it enters the trial plan.
pub const TRIAL_PERIOD_DAYS: i64 = 7;

/// Identifier wrapper for registered tenants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Identifier wrapper for stored notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Identifier wrapper for tenant message templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

impl TemplateId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Subscription plan recognized by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Trial,
    Basic,
    Pro,
    Enterprise,
}

impl Plan {
    pub const fn label(self) -> &'static str {
        match self {
            Plan::Trial => "trial",
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trial" => Some(Plan::Trial),
            "basic" => Some(Plan::Basic),
            "pro" => Some(Plan::Pro),
            "enterprise" => Some(Plan::Enterprise),
            _ => None,
        }
    }
}

/// Operational status; only `Active` tenants pass authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
}

/// Connection state of the tenant's messaging-channel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Connected,
    Disconnected,
    QrPending,
}

/// Registered customer account and unit of data partitioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub channel_address: String,
    pub plan: Plan,
    pub status: TenantStatus,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub api_key: String,
    pub channel_instance: Option<String>,
    pub channel_status: ChannelStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    /// Instance name usable for delivery, present only while connected.
    pub fn connected_instance(&self) -> Option<&str> {
        match (&self.channel_instance, self.channel_status) {
            (Some(instance), ChannelStatus::Connected) if !instance.trim().is_empty() => {
                Some(instance.as_str())
            }
            _ => None,
        }
    }

    pub fn trial_expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(TRIAL_PERIOD_DAYS)
    }

    pub fn view(&self) -> TenantView {
        TenantView {
            id: self.id.clone(),
            name: self.name.clone(),
            wa_number: self.channel_address.clone(),
            plan: self.plan,
            status: self.status,
            trial_ends_at: self.trial_ends_at,
            channel_instance: self.channel_instance.clone(),
            channel_status: self.channel_status,
            created_at: self.created_at,
        }
    }
}

/// Tenant representation safe to return from read endpoints (no secret).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantView {
    pub id: TenantId,
    pub name: String,
    pub wa_number: String,
    pub plan: Plan,
    pub status: TenantStatus,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub channel_instance: Option<String>,
    pub channel_status: ChannelStatus,
    pub created_at: DateTime<Utc>,
}

/// Business event kind; unknown upstream kinds are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Sale,
    Quote,
    Payment,
    Other(String),
}

impl EventKind {
    pub fn label(&self) -> &str {
        match self {
            EventKind::Sale => "sale",
            EventKind::Quote => "quote",
            EventKind::Payment => "payment",
            EventKind::Other(kind) => kind.as_str(),
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sale" => EventKind::Sale,
            "quote" => EventKind::Quote,
            "payment" => EventKind::Payment,
            _ => EventKind::Other(value.trim().to_string()),
        }
    }
}

impl From<EventKind> for String {
    fn from(value: EventKind) -> Self {
        value.label().to_string()
    }
}

/// Delivery lifecycle of a notification.
///
/// `Sent` is terminal. `Failed` may only go back to `Pending` through an
/// explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    pub const fn allows(self, next: NotificationStatus) -> bool {
        matches!(
            (self, next),
            (NotificationStatus::Pending, NotificationStatus::Sent)
                | (NotificationStatus::Pending, NotificationStatus::Failed)
                | (NotificationStatus::Failed, NotificationStatus::Pending)
        )
    }
}

/// Normalized event fields used to create a notification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationDraft {
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub value: Option<f64>,
    pub nf_number: Option<String>,
    pub products: Option<Value>,
}

/// One business event destined for delivery to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub tenant_id: TenantId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub value: Option<f64>,
    pub nf_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Value>,
    pub status: NotificationStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub gateway_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn pending(tenant_id: TenantId, kind: EventKind, draft: NotificationDraft) -> Self {
        Self {
            id: NotificationId::generate(),
            tenant_id,
            kind,
            client_name: draft.client_name,
            client_phone: draft.client_phone,
            value: draft.value,
            nf_number: draft.nf_number,
            products: draft.products,
            status: NotificationStatus::Pending,
            retry_count: 0,
            error_message: None,
            gateway_message_id: None,
            created_at: Utc::now(),
            sent_at: None,
        }
    }
}

/// Tenant-owned message body used instead of the built-in format when active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        kind: EventKind,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TemplateId::generate(),
            tenant_id,
            name: name.into(),
            kind,
            content: content.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_is_terminal() {
        for next in [
            NotificationStatus::Pending,
            NotificationStatus::Sent,
            NotificationStatus::Failed,
        ] {
            assert!(!NotificationStatus::Sent.allows(next));
        }
        assert!(NotificationStatus::Failed.allows(NotificationStatus::Pending));
        assert!(!NotificationStatus::Failed.allows(NotificationStatus::Sent));
        assert!(!NotificationStatus::Pending.allows(NotificationStatus::Pending));
    }

    #[test]
    fn event_kind_keeps_unknown_labels() {
        assert_eq!(EventKind::from("SALE".to_string()), EventKind::Sale);
        let kind = EventKind::from("refund".to_string());
        assert_eq!(kind, EventKind::Other("refund".to_string()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), "refund");
    }

    #[test]
    fn connected_instance_requires_connected_status() {
        let now = Utc::now();
        let mut tenant = Tenant {
            id: TenantId("t-1".to_string()),
            name: "Loja".to_string(),
            channel_address: "5511999990000".to_string(),
            plan: Plan::Trial,
            status: TenantStatus::Active,
            trial_ends_at: Some(Tenant::trial_expiry_from(now)),
            api_key: "secret".to_string(),
            channel_instance: Some("loja-main".to_string()),
            channel_status: ChannelStatus::QrPending,
            created_at: now,
            updated_at: now,
        };
        assert!(tenant.connected_instance().is_none());
        tenant.channel_status = ChannelStatus::Connected;
        assert_eq!(tenant.connected_instance(), Some("loja-main"));
    }
}
