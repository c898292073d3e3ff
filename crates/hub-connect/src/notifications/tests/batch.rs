use super::common::*;

use crate::notifications::batch::BatchReport;
use crate::notifications::domain::NotificationStatus;

#[tokio::test]
async fn sweep_reports_sent_out_of_total() {
    let h = harness([Script::Accept, Script::Reject(502), Script::Accept]);
    let tenant = connected_tenant(&h, "Loja Azul", "5511988887777");
    let notifications: Vec<_> = (0..3).map(|_| ingest_sale(&h, &tenant)).collect();

    let report = h
        .service
        .send_all_pending(&tenant.id, Some(&tenant.api_key))
        .await
        .expect("sweep runs");

    assert_eq!(report, BatchReport { sent: 2, total: 3 });
    let statuses: Vec<_> = notifications
        .iter()
        .map(|notification| stored(&h, notification).status)
        .collect();
    assert_eq!(
        statuses
            .iter()
            .filter(|status| **status == NotificationStatus::Sent)
            .count(),
        2
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|status| **status == NotificationStatus::Failed)
            .count(),
        1
    );
    for notification in &notifications {
        assert_eq!(stored(&h, notification).retry_count, 0);
    }
}

#[tokio::test]
async fn sweep_only_touches_pending_notifications() {
    let h = harness([Script::Reject(502)]);
    let tenant = connected_tenant(&h, "Loja Azul", "5511988887777");
    ingest_sale(&h, &tenant);

    let first = h
        .service
        .send_all_pending(&tenant.id, Some(&tenant.api_key))
        .await
        .expect("sweep runs");
    assert_eq!(first, BatchReport { sent: 0, total: 1 });

    let second = h
        .service
        .send_all_pending(&tenant.id, Some(&tenant.api_key))
        .await
        .expect("sweep runs");
    assert_eq!(second, BatchReport { sent: 0, total: 0 });
    assert_eq!(h.gateway.calls().len(), 1);
}

#[tokio::test]
async fn sweep_without_channel_fails_each_item_and_continues() {
    let h = accepting();
    let tenant = h
        .service
        .register("Loja Azul", "5511988887777")
        .expect("tenant registered");
    let notifications: Vec<_> = (0..2).map(|_| ingest_sale(&h, &tenant)).collect();

    let report = h
        .service
        .send_all_pending(&tenant.id, Some(&tenant.api_key))
        .await
        .expect("sweep runs");

    assert_eq!(report, BatchReport { sent: 0, total: 2 });
    for notification in &notifications {
        assert_eq!(stored(&h, notification).status, NotificationStatus::Failed);
    }
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn sweep_is_scoped_to_the_calling_tenant() {
    let h = accepting();
    let first = connected_tenant(&h, "Loja Azul", "5511988887777");
    let second = connected_tenant(&h, "Loja Verde", "5511966665555");
    ingest_sale(&h, &first);
    let untouched = ingest_sale(&h, &second);

    let report = h
        .service
        .send_all_pending(&first.id, Some(&first.api_key))
        .await
        .expect("sweep runs");

    assert_eq!(report, BatchReport { sent: 1, total: 1 });
    assert_eq!(stored(&h, &untouched).status, NotificationStatus::Pending);
}
