use crate::infra::FlakyGateway;
use clap::Args;
use hub_connect::config::DeliveryConfig;
use hub_connect::error::AppError;
use hub_connect::notifications::{
    EventPayload, HttpWorkflowForwarder, InMemoryDatabase, Notification, NotificationService,
    NotificationStatus, NotifyError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of gateway calls that time out before deliveries succeed
    #[arg(long, default_value_t = 1)]
    pub(crate) gateway_failures: u32,
    /// Channel instance connected for the demo tenant
    #[arg(long, default_value = "demo-instance")]
    pub(crate) instance: String,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        gateway_failures,
        instance,
    } = args;

    let gateway = Arc::new(FlakyGateway::new(gateway_failures));
    let service = NotificationService::new(
        Arc::new(InMemoryDatabase::new()),
        gateway.clone(),
        Arc::new(HttpWorkflowForwarder::new(
            reqwest::Client::new(),
            None,
            Duration::from_secs(1),
        )),
        DeliveryConfig::default(),
        Duration::from_secs(1),
    );

    println!("Notification delivery demo");
    let tenant = service.register("Loja Demo", "+55 11 98888-7777")?;
    let secret = Some(tenant.api_key.as_str());
    service.connect_channel(&tenant.id, secret, &instance)?;
    println!(
        "- tenant {} ({}) on plan {} connected to instance {instance}",
        tenant.name,
        tenant.id.0,
        tenant.plan.label()
    );

    let payload = EventPayload {
        kind: Some(json!("sale")),
        client_name: Some(json!("Acme")),
        telefone: Some(json!("+55 (11) 91234-5678")),
        valor: Some(json!(150.0)),
        nf_number: Some(json!("NF-1")),
        ..EventPayload::default()
    };
    let notification = service.ingest(&tenant.id, secret, payload)?;
    print_state("ingested", &notification);

    let mut current = service.send(&tenant.id, secret, &notification.id).await?;
    print_state("send", &current);

    while current.status == NotificationStatus::Failed {
        match service.retry(&tenant.id, secret, &current.id).await {
            Ok(next) => {
                current = next;
                print_state("retry", &current);
            }
            Err(NotifyError::RetryLimitExceeded { limit }) => {
                println!("- retry refused: limit of {limit} reached");
                break;
            }
            Err(other) => return Err(other.into()),
        }
    }

    let dashboard = service.dashboard(&tenant.id, secret)?;
    println!(
        "\nDashboard: {} total | {} pending | {} sent | {} failed | {} gateway calls",
        dashboard.total,
        dashboard.pending,
        dashboard.sent,
        dashboard.failed,
        gateway.calls()
    );
    Ok(())
}

fn print_state(step: &str, notification: &Notification) {
    let detail = match notification.status {
        NotificationStatus::Sent => notification
            .gateway_message_id
            .as_deref()
            .map(|id| format!("message id {id}"))
            .unwrap_or_default(),
        NotificationStatus::Failed => notification.error_message.clone().unwrap_or_default(),
        NotificationStatus::Pending => String::new(),
    };
    println!(
        "- {step:<8} {} | retries {} {detail}",
        notification.status.label(),
        notification.retry_count
    );
}
