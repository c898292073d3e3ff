use async_trait::async_trait;
use hub_connect::config::AppConfig;
use hub_connect::error::AppError;
use hub_connect::notifications::{
    GatewayError, GatewayReceipt, HttpMessagingGateway, HttpWorkflowForwarder, InMemoryDatabase,
    MessagingGateway, NotificationService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type LiveService =
    NotificationService<InMemoryDatabase, HttpMessagingGateway, HttpWorkflowForwarder>;

/// Wire the in-memory store to the configured gateway and workflow engine.
pub(crate) fn build_live_service(config: &AppConfig) -> Result<Arc<LiveService>, AppError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("hub-connect/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let gateway = HttpMessagingGateway::new(
        client.clone(),
        config.gateway.base_url.clone(),
        config.gateway.api_key.clone(),
        config.gateway.timeout,
    );
    let forwarder = HttpWorkflowForwarder::new(
        client,
        config.workflow.webhook_url.clone(),
        config.workflow.timeout,
    );

    Ok(Arc::new(NotificationService::new(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(gateway),
        Arc::new(forwarder),
        config.delivery.clone(),
        config.workflow.timeout,
    )))
}

/// Offline gateway for the demo: times out a fixed number of times, then
/// accepts every message.
pub(crate) struct FlakyGateway {
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl FlakyGateway {
    pub(crate) fn new(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingGateway for FlakyGateway {
    async fn send_text(
        &self,
        _instance: &str,
        _destination: &str,
        _text: &str,
    ) -> Result<GatewayReceipt, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            Err(GatewayError::Timeout)
        } else {
            Ok(GatewayReceipt {
                message_id: format!("DEMO{call:04}"),
            })
        }
    }
}
