use super::common::*;

use crate::notifications::dispatch::CHANNEL_NOT_CONNECTED;
use crate::notifications::domain::{NotificationStatus, TenantId};
use crate::notifications::error::NotifyError;
use crate::notifications::service::TemplateInput;

#[tokio::test]
async fn successful_delivery_records_receipt() {
    let h = harness([Script::Accept]);
    let tenant = connected_tenant(&h, "Loja Azul", "5511988887777");
    let notification = ingest_sale(&h, &tenant);

    let sent = h
        .service
        .send(&tenant.id, Some(&tenant.api_key), &notification.id)
        .await
        .expect("dispatch runs");

    assert_eq!(sent.status, NotificationStatus::Sent);
    assert_eq!(sent.gateway_message_id.as_deref(), Some("wamid-1"));
    assert!(sent.sent_at.is_some());
    assert!(sent.error_message.is_none());
    assert_eq!(sent.retry_count, 0);
    assert_eq!(stored(&h, &notification), sent);

    let calls = h.gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].instance, INSTANCE);
    assert_eq!(calls[0].destination, "5511912345678@s.whatsapp.net");
    assert!(calls[0].text.contains("Acme"));
    assert!(calls[0].text.contains("R$ 150,00"));
}

#[tokio::test]
async fn rejected_delivery_fails_without_counting_an_attempt() {
    let h = harness([Script::Reject(500)]);
    let tenant = connected_tenant(&h, "Loja Azul", "5511988887777");
    let notification = ingest_sale(&h, &tenant);

    let failed = h
        .service
        .send(&tenant.id, Some(&tenant.api_key), &notification.id)
        .await
        .expect("gateway failures are recorded, not returned");

    assert_eq!(failed.status, NotificationStatus::Failed);
    assert_eq!(failed.retry_count, 0);
    assert!(failed.sent_at.is_none());
    assert!(failed
        .error_message
        .as_deref()
        .is_some_and(|error| error.contains("500")));
}

#[tokio::test]
async fn unresponsive_gateway_is_cut_off_by_timeout() {
    let h = harness([Script::Hang]);
    let tenant = connected_tenant(&h, "Loja Azul", "5511988887777");
    let notification = ingest_sale(&h, &tenant);

    let failed = h
        .service
        .send(&tenant.id, Some(&tenant.api_key), &notification.id)
        .await
        .expect("timeout is recorded on the notification");

    assert_eq!(failed.status, NotificationStatus::Failed);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("gateway did not answer in time")
    );
    assert_eq!(failed.retry_count, 0);
}

#[tokio::test]
async fn disconnected_channel_fails_before_any_network_call() {
    let h = accepting();
    let tenant = h
        .service
        .register("Loja Azul", "5511988887777")
        .expect("tenant registered");
    let notification = ingest_sale(&h, &tenant);

    let outcome = h
        .service
        .send(&tenant.id, Some(&tenant.api_key), &notification.id)
        .await;

    assert!(matches!(outcome, Err(NotifyError::PreconditionFailed(_))));
    assert!(h.gateway.calls().is_empty());
    let recorded = stored(&h, &notification);
    assert_eq!(recorded.status, NotificationStatus::Failed);
    assert_eq!(recorded.error_message.as_deref(), Some(CHANNEL_NOT_CONNECTED));
    assert_eq!(recorded.retry_count, 0);
}

#[tokio::test]
async fn sent_notification_is_never_dispatched_again() {
    let h = accepting();
    let tenant = connected_tenant(&h, "Loja Azul", "5511988887777");
    let notification = ingest_sale(&h, &tenant);
    h.service
        .send(&tenant.id, Some(&tenant.api_key), &notification.id)
        .await
        .expect("first dispatch");

    let again = h
        .service
        .send(&tenant.id, Some(&tenant.api_key), &notification.id)
        .await;

    assert!(matches!(
        again,
        Err(NotifyError::InvalidState {
            expected: NotificationStatus::Pending,
            actual: NotificationStatus::Sent,
        })
    ));
    assert_eq!(h.gateway.calls().len(), 1);
}

#[tokio::test]
async fn active_template_replaces_default_text() {
    let h = accepting();
    let tenant = connected_tenant(&h, "Loja Azul", "5511988887777");
    h.service
        .save_template(
            &tenant.id,
            Some(&tenant.api_key),
            TemplateInput {
                name: "venda".to_string(),
                kind: "sale".to_string(),
                content: "Oi {client_name}, nota {nf_number} emitida. {cupom}".to_string(),
                is_active: true,
            },
        )
        .expect("template saved");
    let notification = ingest_sale(&h, &tenant);

    h.service
        .send(&tenant.id, Some(&tenant.api_key), &notification.id)
        .await
        .expect("dispatch runs");

    assert_eq!(
        h.gateway.calls()[0].text,
        "Oi Acme, nota NF-1 emitida. {cupom}"
    );
}

#[tokio::test]
async fn missing_contact_address_is_left_to_the_gateway() {
    let h = harness([Script::Reject(400)]);
    let tenant = connected_tenant(&h, "Loja Azul", "5511988887777");
    let notification = h
        .service
        .ingest(
            &tenant.id,
            Some(&tenant.api_key),
            payload(serde_json::json!({ "type": "payment", "client_name": "Acme" })),
        )
        .expect("event ingested");

    let failed = h
        .service
        .send(&tenant.id, Some(&tenant.api_key), &notification.id)
        .await
        .expect("dispatch runs");

    assert_eq!(h.gateway.calls()[0].destination, "");
    assert_eq!(failed.status, NotificationStatus::Failed);
}

#[tokio::test]
async fn notifications_are_invisible_to_other_tenants() {
    let h = accepting();
    let owner = connected_tenant(&h, "Loja Azul", "5511988887777");
    let other = connected_tenant(&h, "Loja Verde", "5511966665555");
    let notification = ingest_sale(&h, &owner);

    let outcome = h
        .service
        .send(&other.id, Some(&other.api_key), &notification.id)
        .await;
    assert!(matches!(outcome, Err(NotifyError::NotFound("notification"))));

    let borrowed_secret = h
        .service
        .send(&owner.id, Some(&other.api_key), &notification.id)
        .await;
    assert!(matches!(borrowed_secret, Err(NotifyError::Forbidden)));

    let unknown = h
        .service
        .send(
            &TenantId("missing".to_string()),
            Some(&owner.api_key),
            &notification.id,
        )
        .await;
    assert!(matches!(unknown, Err(NotifyError::NotFound("tenant"))));
    assert!(h.gateway.calls().is_empty());
}
